//! C6: CacheWarmer — query the tracker, run the strategy, single-flight
//! promote into L1.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::caching::HierarchicalCache;
use crate::clock::Clock;
use crate::config::{StrategyConfig, WarmerConfig};
use crate::correlation::CorrelationTracker;
use crate::metrics_sink::MetricsSink;
use crate::pair::{ChainId, PairId};
use crate::warming::strategy::{StrategyContext, WarmingStrategy};

/// Outcome of a single `warm_for` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarmResult {
    pub success: bool,
    pub duration_ms: f64,
    pub pairs_considered: u32,
    pub pairs_already_in_l1: u32,
    pub pairs_warmed: u32,
    pub pairs_not_found: u32,
    pub errors: u32,
}

impl WarmResult {
    fn noop() -> Self {
        Self {
            success: true,
            duration_ms: 0.0,
            pairs_considered: 0,
            pairs_already_in_l1: 0,
            pairs_warmed: 0,
            pairs_not_found: 0,
            errors: 0,
        }
    }
}

/// Fraction of L1 capacity a single warming call may attempt to fill.
const MAX_L1_FRACTION_PER_WARM: f64 = 0.5;

pub struct CacheWarmer {
    cache: Arc<HierarchicalCache>,
    tracker: Arc<CorrelationTracker>,
    strategy: Arc<dyn WarmingStrategy>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    strategy_config: StrategyConfig,
    warmer_config: WarmerConfig,
    adaptive_n: AtomicU32,
    recent_hit_rate: std::sync::atomic::AtomicU64,
}

impl CacheWarmer {
    pub fn new(
        cache: Arc<HierarchicalCache>,
        tracker: Arc<CorrelationTracker>,
        strategy: Arc<dyn WarmingStrategy>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
        strategy_config: StrategyConfig,
        warmer_config: WarmerConfig,
    ) -> Self {
        Self {
            cache,
            tracker,
            strategy,
            clock,
            metrics,
            strategy_config,
            warmer_config,
            adaptive_n: AtomicU32::new(strategy_config.top_n),
            recent_hit_rate: std::sync::atomic::AtomicU64::new((1.0f64).to_bits()),
        }
    }

    /// Reports the observed L1 hit rate so the Adaptive strategy's target
    /// tracking has something to react to. Callers with no better source
    /// may derive this from `HierarchicalCache::hits`/`misses`.
    pub fn report_hit_rate(&self, hit_rate: f64) {
        self.recent_hit_rate.store(hit_rate.to_bits(), Ordering::Relaxed);
    }

    fn recent_hit_rate(&self) -> f64 {
        f64::from_bits(self.recent_hit_rate.load(Ordering::Relaxed))
    }

    pub async fn warm_for(&self, trigger: &PairId, chain: &ChainId) -> WarmResult {
        if !self.warmer_config.enabled {
            return WarmResult::noop();
        }

        let start = Instant::now();

        let ranked = self.tracker.rank(
            trigger,
            self.strategy_config.top_n,
            self.strategy_config.min_score,
        );
        if ranked.is_empty() {
            return WarmResult::noop();
        }

        let current_n = self
            .strategy
            .next_n(self.adaptive_n.load(Ordering::Relaxed), self.recent_hit_rate());
        self.adaptive_n.store(current_n, Ordering::Relaxed);

        let ctx = StrategyContext {
            l1_capacity: self.cache.l1_slot_count(),
            current_l1_used: self.cache.l1_used_slots() as u32,
            recent_hit_rate: self.recent_hit_rate(),
            now_ns: self.clock.now_ns(),
            recently_warmed: HashSet::new(),
            current_n,
        };

        let mut candidates = self.strategy.select(&ranked, &ctx);

        let max_candidates = ((ctx.l1_capacity as f64 * MAX_L1_FRACTION_PER_WARM) as usize)
            .min(self.warmer_config.max_pairs_per_warm as usize);
        candidates.truncate(max_candidates);

        let total_deadline = Duration::from_millis(self.warmer_config.timeout_ms as u64);
        let per_pair_deadline = Duration::from_millis(self.warmer_config.per_pair_timeout_ms as u64);

        let mut pairs_considered = 0u32;
        let mut pairs_already_in_l1 = 0u32;
        let mut pairs_warmed = 0u32;
        let mut pairs_not_found = 0u32;
        let mut errors = 0u32;

        for candidate in candidates {
            if start.elapsed() >= total_deadline {
                break;
            }

            let cache = self.cache.clone();
            let pair = candidate.pair.clone();
            let fetch = tokio::task::spawn_blocking(move || cache.get(&pair));

            match tokio::time::timeout(per_pair_deadline, fetch).await {
                Err(_elapsed) => {
                    errors += 1;
                    self.metrics.counter_inc(
                        "warm_error_total",
                        &[("reason", "timeout".to_string())],
                        1,
                    );
                }
                Ok(Err(_join_error)) => {
                    errors += 1;
                    self.metrics.counter_inc(
                        "warm_error_total",
                        &[("reason", "task_panic".to_string())],
                        1,
                    );
                }
                Ok(Ok(Err(_cache_error))) => {
                    errors += 1;
                    self.metrics.counter_inc(
                        "warm_error_total",
                        &[("reason", "cache_read".to_string())],
                        1,
                    );
                }
                Ok(Ok(Ok(lookup))) => {
                    pairs_considered += 1;
                    if lookup.in_l1 {
                        pairs_already_in_l1 += 1;
                    } else if let Some(value) = lookup.value {
                        match self.cache.promote(&candidate.pair, &value) {
                            Ok(()) => pairs_warmed += 1,
                            Err(_) => {
                                errors += 1;
                                self.metrics.counter_inc(
                                    "warm_error_total",
                                    &[("reason", "promote_failed".to_string())],
                                    1,
                                );
                            }
                        }
                    } else {
                        pairs_not_found += 1;
                    }
                }
            }
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1_000.0;
        let chain_label = chain.to_string();
        self.metrics
            .histogram_observe("warming_duration_ms", &[("chain", chain_label.clone())], duration_ms);
        self.metrics.counter_inc(
            "warming_pairs_warmed_total",
            &[("chain", chain_label.clone())],
            pairs_warmed as u64,
        );
        self.metrics.counter_inc(
            "warming_operations_total",
            &[("chain", chain_label), ("status", "success".to_string())],
            1,
        );

        WarmResult {
            success: true,
            duration_ms,
            pairs_considered,
            pairs_already_in_l1,
            pairs_warmed,
            pairs_not_found,
            errors,
        }
    }
}
