//! Performance instrumentation primitives reused by the caching, correlation,
//! and warming subsystems.

pub mod latency;

pub use latency::LatencyHistogram;
