//! Latency instrumentation primitives.
//!
//! Shared by the correlation tracker and cache warmer for recording
//! hot-path and background-path timing distributions.

pub mod histogram;

pub use histogram::*;
