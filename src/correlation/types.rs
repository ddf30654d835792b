//! Value objects exchanged across the correlation tracker's public API.

use crate::error::CacheWarmingError;
use crate::pair::PairId;

/// One ranked, validated correlation result.
///
/// Invariants enforced at construction: `pair != self_pair`, `score` is
/// finite and in `[0,1]`, `lastSeenTimestamp` is not after `now`.
/// `coOccurrences` is `u32`, which already rules out negative or
/// non-finite counts by construction rather than by runtime check.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationPair {
    pub pair: PairId,
    pub score: f64,
    pub co_occurrences: u32,
    pub last_seen_timestamp_ns: u64,
}

impl CorrelationPair {
    /// `self_pair` is the pair this result is correlated *with*; it is not
    /// stored on the result, only used to enforce the no-self-correlation
    /// invariant. `now_ns` is the caller's clock reading at construction
    /// time, used to reject a `last_seen_timestamp_ns` that lies in the
    /// future.
    pub fn new(
        self_pair: &PairId,
        pair: PairId,
        score: f64,
        co_occurrences: u32,
        last_seen_timestamp_ns: u64,
        now_ns: u64,
    ) -> Result<Self, CacheWarmingError> {
        if &pair == self_pair {
            return Err(CacheWarmingError::InvalidDomainValue(
                "cannot correlate pair with itself".to_string(),
            ));
        }
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(CacheWarmingError::InvalidDomainValue(format!(
                "score must be finite and in [0,1], got {score}"
            )));
        }
        if last_seen_timestamp_ns > now_ns {
            return Err(CacheWarmingError::InvalidDomainValue(format!(
                "lastSeenTimestamp {last_seen_timestamp_ns} is after now {now_ns}"
            )));
        }
        Ok(Self {
            pair,
            score,
            co_occurrences,
            last_seen_timestamp_ns,
        })
    }
}

/// Snapshot of aggregate tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CorrelationStats {
    pub total_pairs: u64,
    pub total_co_occurrences: u64,
    pub avg_score: f64,
    pub memory_bytes: u64,
    pub oldest_timestamp_ns: Option<u64>,
    pub newest_timestamp_ns: Option<u64>,
    pub window_bytes: u64,
}

/// Result of a single `record` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub success: bool,
    pub correlations_updated: u32,
    pub duration_us: u32,
}
