//! Streaming co-occurrence tracking over a bounded sliding window.

pub mod tracker;
pub mod types;

pub use tracker::{CorrelationTracker, TrackerLimits};
pub use types::{CorrelationPair, CorrelationStats, RecordOutcome};
