//! Monotonic clock abstraction.
//!
//! Every timestamp this crate produces or compares is nanoseconds from a
//! monotonic source, never wall-clock time. Injected so tests can drive
//! time deterministically instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonic, high-resolution time source.
pub trait Clock: Send + Sync {
    /// Nanoseconds since an arbitrary, fixed epoch. Only differences
    /// between calls are meaningful.
    fn now_ns(&self) -> u64;
}

/// Default `Clock` backed by `quanta`'s TSC-calibrated counter.
pub struct QuantaClock {
    clock: quanta::Clock,
    epoch: quanta::Instant,
}

impl QuantaClock {
    pub fn new() -> Self {
        let clock = quanta::Clock::new();
        let epoch = clock.now();
        Self { clock, epoch }
    }
}

impl Default for QuantaClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for QuantaClock {
    fn now_ns(&self) -> u64 {
        self.clock.now().duration_since(self.epoch).as_nanos() as u64
    }
}

/// A clock whose value is set explicitly by the test driving it. Never
/// advances on its own.
#[derive(Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    pub fn set(&self, now_ns: u64) {
        self.now_ns.store(now_ns, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ns: u64) {
        self.now_ns.fetch_add(delta_ns, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}
