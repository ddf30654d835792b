//! C7: WarmingCoordinator — the sole hot-path entry point.
//!
//! `pendingWarmings` single-flight bookkeeping mirrors the teacher's
//! `edge::receiver::EdgeReceiver` state-tracking idiom: an `AtomicBool`
//! run flag plus a lock-guarded map, with check-and-insert done under one
//! short-held lock rather than a lock-free CAS loop, since map entries
//! (not bits) are what's being inserted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::config::IntegrationConfig;
use crate::correlation::CorrelationTracker;
use crate::executor::{BoxedTask, Executor};
use crate::metrics_sink::MetricsSink;
use crate::pair::{ChainId, PairId};
use crate::warming::warmer::CacheWarmer;

struct WarmingRequest {
    #[allow(dead_code)]
    trigger_pair: PairId,
    started_at_ns: u64,
    chain: ChainId,
}

/// Entry point for upstream price-update producers.
pub struct WarmingCoordinator {
    tracker: Arc<CorrelationTracker>,
    warmer: Arc<CacheWarmer>,
    executor: Arc<dyn Executor>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    config: IntegrationConfig,
    pending: Arc<Mutex<HashMap<PairId, WarmingRequest>>>,
    running: Arc<AtomicBool>,
}

impl WarmingCoordinator {
    pub fn new(
        tracker: Arc<CorrelationTracker>,
        warmer: Arc<CacheWarmer>,
        executor: Arc<dyn Executor>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
        config: IntegrationConfig,
    ) -> Self {
        Self {
            tracker,
            warmer,
            executor,
            clock,
            metrics,
            config,
            pending: Arc::new(Mutex::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Hot-path entry point. Never raises; `tracker.record` errors are
    /// recorded as counters, not propagated.
    pub fn on_price_update(&self, pair: PairId, timestamp_ns: u64, chain: ChainId) {
        self.tracker.record(pair.clone(), timestamp_ns);

        if !self.running.load(Ordering::Acquire) {
            return;
        }

        {
            let mut pending = self.pending.lock();
            if pending.contains_key(&pair) {
                self.metrics.counter_inc(
                    "warming_debounced_total",
                    &[("chain", chain.to_string())],
                    1,
                );
                return;
            }
            pending.insert(
                pair.clone(),
                WarmingRequest {
                    trigger_pair: pair.clone(),
                    started_at_ns: self.clock.now_ns(),
                    chain: chain.clone(),
                },
            );
        }
        self.metrics.gauge_set(
            "warming_pending_operations",
            &[("chain", chain.to_string())],
            self.pending.lock().len() as f64,
        );

        let warmer = self.warmer.clone();
        let pending = self.pending.clone();
        let metrics = self.metrics.clone();
        let task_pair = pair.clone();
        let task_chain = chain.clone();

        let task: BoxedTask = Box::pin(async move {
            let result = warmer.warm_for(&task_pair, &task_chain).await;
            pending.lock().remove(&task_pair);
            let status = if result.success { "success" } else { "error" };
            metrics.counter_inc(
                "warming_operations_total",
                &[("chain", task_chain.to_string()), ("status", status.to_string())],
                1,
            );
        });
        self.executor.spawn(task);
    }

    /// Removes `pendingWarmings` entries older than `staleAgeMs`, counting
    /// each as a hung warming. Intended to be driven by a periodic caller
    /// (the demo binary runs it on a `tokio::time::interval`).
    pub fn sweep_stale(&self) {
        let now_ns = self.clock.now_ns();
        let stale_ns = self.config.stale_age_ms as u64 * 1_000_000;
        let mut pending = self.pending.lock();
        let stale: Vec<PairId> = pending
            .iter()
            .filter(|(_, req)| now_ns.saturating_sub(req.started_at_ns) > stale_ns)
            .map(|(pair, _)| pair.clone())
            .collect();
        for pair in stale {
            if let Some(req) = pending.remove(&pair) {
                self.metrics
                    .counter_inc("warming_hung_total", &[("chain", req.chain.to_string())], 1);
            }
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.config.sweep_interval_ms as u64)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Stops accepting new updates, waits up to `shutdownGraceMs` for
    /// in-flight warmings to drain, then clears whatever remains.
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        let deadline = Duration::from_millis(self.config.shutdown_grace_ms as u64);
        let start = std::time::Instant::now();
        while !self.pending.lock().is_empty() && start.elapsed() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.pending.lock().clear();
    }
}
