//! End-to-end coverage of the six concrete scenarios the component design
//! calls out, run against an in-memory backing store and a manual clock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use warm_cache::caching::{
    BackingStore, EvictionPolicy, HierarchicalCache, InMemoryBackingStore, PriceMatrix, PriceRecord,
};
use warm_cache::clock::{Clock, ManualClock};
use warm_cache::config::{IntegrationConfig, StrategyConfig, WarmerConfig};
use warm_cache::correlation::{CorrelationPair, CorrelationTracker, TrackerLimits};
use warm_cache::executor::{BoxedTask, Executor, SynchronousExecutor};
use warm_cache::metrics_sink::{Label, MetricsSink, NoopMetricsSink};
use warm_cache::pair::{ChainId, PairId};
use warm_cache::warming::{CacheWarmer, TopN, WarmingCoordinator};
use warm_cache::CacheWarmingError;

fn default_limits() -> TrackerLimits {
    TrackerLimits {
        window_ns: 60_000_000_000,
        co_window_ns: 1_000_000_000,
        max_tracked_pairs: 10_000,
        max_partners_per_pair: 256,
    }
}

fn pair(s: &str) -> PairId {
    PairId::new(s).unwrap()
}

fn record_bytes(record: PriceRecord) -> std::sync::Arc<[u8]> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&record.price_fp.to_le_bytes());
    buf.extend_from_slice(&record.timestamp_ns.to_le_bytes());
    buf.extend_from_slice(&record.flags.to_le_bytes());
    std::sync::Arc::from(buf.into_boxed_slice())
}

fn build_cache(clock: Arc<dyn Clock>) -> (Arc<HierarchicalCache>, Arc<InMemoryBackingStore>) {
    let l1 = Arc::new(PriceMatrix::new(1024, 64, EvictionPolicy::Evict));
    let l2 = Arc::new(InMemoryBackingStore::new(clock));
    let cache = Arc::new(HierarchicalCache::new(l1, l2.clone(), Duration::from_secs(30)));
    (cache, l2)
}

/// Holds every task handed to it until `release` is explicitly called, so a
/// test can observe coordinator state *during* an in-flight warming rather
/// than only after it has already drained.
#[derive(Default)]
struct GatedExecutor {
    held: Mutex<Vec<BoxedTask>>,
}

impl GatedExecutor {
    fn new() -> Self {
        Self::default()
    }

    /// Runs every task queued so far, in submission order, to completion.
    async fn release(&self) {
        let tasks: Vec<BoxedTask> = std::mem::take(&mut *self.held.lock().unwrap());
        for task in tasks {
            task.await;
        }
    }
}

impl Executor for GatedExecutor {
    fn spawn(&self, task: BoxedTask) {
        self.held.lock().unwrap().push(task);
    }
}

/// Records the running total of every counter increment, keyed by metric
/// name and its exact label set, so a test can assert on specific
/// `name{labels}` totals the way the component design's metric table names
/// them.
#[derive(Default)]
struct CountingMetricsSink {
    counters: Mutex<HashMap<(&'static str, Vec<Label>), u64>>,
}

impl CountingMetricsSink {
    fn new() -> Self {
        Self::default()
    }

    fn count(&self, name: &'static str, labels: &[Label]) -> u64 {
        self.counters
            .lock()
            .unwrap()
            .get(&(name, labels.to_vec()))
            .copied()
            .unwrap_or(0)
    }
}

impl MetricsSink for CountingMetricsSink {
    fn counter_inc(&self, name: &'static str, labels: &[Label], delta: u64) {
        *self.counters.lock().unwrap().entry((name, labels.to_vec())).or_insert(0) += delta;
    }
    fn gauge_set(&self, _name: &'static str, _labels: &[Label], _value: f64) {}
    fn histogram_observe(&self, _name: &'static str, _labels: &[Label], _value: f64) {}
}

/// Scenario 1: hot-path debounce. A burst of 5 updates for the same pair
/// while its warming is still in flight must debounce the other 4 and fire
/// exactly one successful warming overall.
#[tokio::test]
async fn hot_path_debounce() {
    let manual = ManualClock::new(0);
    let clock: Arc<dyn Clock> = Arc::new(manual.clone());
    let (cache, _l2) = build_cache(clock.clone());
    let tracker = Arc::new(CorrelationTracker::new(default_limits(), clock.clone(), Arc::new(NoopMetricsSink)));

    tracker.record(pair("A"), 100);
    tracker.record(pair("B"), 100);
    tracker.record(pair("C"), 100);
    tracker.record(pair("A"), 200);
    tracker.record(pair("B"), 200);
    tracker.record(pair("C"), 200);
    manual.set(300_000_000);

    let metrics = Arc::new(CountingMetricsSink::new());
    let warmer = Arc::new(CacheWarmer::new(
        cache,
        tracker.clone(),
        Arc::new(TopN { n: 3 }),
        clock.clone(),
        metrics.clone(),
        StrategyConfig {
            top_n: 3,
            min_score: 0.3,
            ..Default::default()
        },
        WarmerConfig::default(),
    ));
    let executor = Arc::new(GatedExecutor::new());
    let coordinator = WarmingCoordinator::new(
        tracker,
        warmer,
        executor.clone(),
        clock,
        metrics.clone(),
        IntegrationConfig::default(),
    );

    let chain: ChainId = ChainId::from("ethereum");
    for _ in 0..5 {
        coordinator.on_price_update(pair("A"), 300_000_000, chain.clone());
    }

    // The first call's task is held by the gate, so the pending map never
    // empties mid-burst: the other 4 calls must see it still occupied and
    // debounce rather than each firing their own warming.
    assert_eq!(coordinator.pending_count(), 1);
    assert_eq!(
        metrics.count("warming_debounced_total", &[("chain", "ethereum".to_string())]),
        4
    );
    assert_eq!(
        metrics.count(
            "warming_operations_total",
            &[("chain", "ethereum".to_string()), ("status", "success".to_string())]
        ),
        0
    );

    executor.release().await;

    assert_eq!(coordinator.pending_count(), 0);
    assert_eq!(
        metrics.count(
            "warming_operations_total",
            &[("chain", "ethereum".to_string()), ("status", "success".to_string())]
        ),
        1
    );
}

/// Scenario 2: single-fetch.
#[tokio::test]
async fn single_fetch_promotes_exactly_once() {
    let manual = ManualClock::new(0);
    let clock: Arc<dyn Clock> = Arc::new(manual.clone());
    let (cache, l2) = build_cache(clock.clone());
    let tracker = Arc::new(CorrelationTracker::new(default_limits(), clock.clone(), Arc::new(NoopMetricsSink)));

    tracker.record(pair("T"), 0);
    tracker.record(pair("X"), 0);
    tracker.record(pair("T"), 100);
    tracker.record(pair("X"), 100);
    manual.set(100);

    let record = PriceRecord::from_f64(42.0, 1, 0);
    l2.put(&pair("X"), record_bytes(record), Duration::from_secs(30)).unwrap();

    let warmer = CacheWarmer::new(
        cache.clone(),
        tracker.clone(),
        Arc::new(TopN { n: 5 }),
        clock,
        Arc::new(NoopMetricsSink),
        StrategyConfig::default(),
        WarmerConfig::default(),
    );

    let result = warmer.warm_for(&pair("T"), &ChainId::from("ethereum")).await;
    assert_eq!(result.pairs_warmed, 1);
    assert_eq!(result.pairs_already_in_l1, 0);
    assert_eq!(result.pairs_not_found, 0);

    let lookup = cache.get(&pair("X")).unwrap();
    assert!(lookup.in_l1);
}

/// Scenario 3: ranking invariant.
#[test]
fn ranking_orders_descending_and_applies_threshold() {
    let manual = ManualClock::new(0);
    let clock: Arc<dyn Clock> = Arc::new(manual.clone());
    let tracker = CorrelationTracker::new(default_limits(), clock, Arc::new(NoopMetricsSink));

    // Build up co-occurrence counts that settle near the target scores by
    // driving distinct update-count denominators per partner.
    for t in (0..9).map(|i| i * 10) {
        tracker.record(pair("TRIGGER"), t);
        tracker.record(pair("A"), t);
    }
    for t in (0..5).map(|i| i * 10) {
        tracker.record(pair("B"), t + 1000);
        tracker.record(pair("TRIGGER"), t + 1000);
    }
    manual.set(1_040);

    let ranked = tracker.rank(&pair("TRIGGER"), 3, 0.3);
    assert!(ranked.len() <= 3);
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    for r in &ranked {
        assert!(r.score >= 0.3);
        assert_ne!(r.pair, pair("TRIGGER"));
    }
}

/// Scenario 4: invalid domain value.
#[test]
fn correlation_pair_rejects_self_correlation() {
    let p1 = pair("p1");
    let now = 1_000u64;
    let err = CorrelationPair::new(&p1, p1.clone(), 0.5, 1, now, now);
    assert_eq!(
        err,
        Err(CacheWarmingError::InvalidDomainValue(
            "cannot correlate pair with itself".to_string()
        ))
    );
}

/// Scenario 4b: invalid domain value, a future timestamp.
#[test]
fn correlation_pair_rejects_timestamp_after_now() {
    let p1 = pair("p1");
    let p2 = pair("p2");
    let err = CorrelationPair::new(&p1, p2, 0.5, 1, 2_000, 1_000);
    assert!(matches!(err, Err(CacheWarmingError::InvalidDomainValue(_))));
}

/// Scenario 5: capacity eviction.
#[test]
fn capacity_eviction_drops_the_oldest_pair() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
    let limits = TrackerLimits {
        max_tracked_pairs: 3,
        ..default_limits()
    };
    let tracker = CorrelationTracker::new(limits, clock, Arc::new(NoopMetricsSink));

    tracker.record(pair("P1"), 1);
    tracker.record(pair("P2"), 2);
    tracker.record(pair("P3"), 3);
    tracker.record(pair("P4"), 4);

    let tracked = tracker.tracked_pairs();
    assert_eq!(tracked.len(), 3);
    assert!(!tracked.contains(&pair("P1")));
}

/// Scenario 6: stale sweep. The orphaned-entry case (a `pendingWarmings`
/// slot left behind by a crashed background task) requires reaching into
/// the coordinator's private map and is covered at the unit-test level in
/// `warming::coordinator::tests::stale_sweep_removes_orphaned_entries`.
/// From outside the crate, this exercises the same sweep against the
/// well-behaved case: an idle map and a coordinator draining on shutdown.
#[tokio::test]
async fn sweep_and_shutdown_are_no_ops_on_an_idle_coordinator() {
    let manual = ManualClock::new(0);
    let clock: Arc<dyn Clock> = Arc::new(manual.clone());
    let (cache, _l2) = build_cache(clock.clone());
    let tracker = Arc::new(CorrelationTracker::new(default_limits(), clock.clone(), Arc::new(NoopMetricsSink)));
    let warmer = Arc::new(CacheWarmer::new(
        cache,
        tracker.clone(),
        Arc::new(TopN { n: 5 }),
        clock.clone(),
        Arc::new(NoopMetricsSink),
        StrategyConfig::default(),
        WarmerConfig::default(),
    ));
    let coordinator = WarmingCoordinator::new(
        tracker,
        warmer,
        Arc::new(SynchronousExecutor),
        clock,
        Arc::new(NoopMetricsSink),
        IntegrationConfig {
            stale_age_ms: 5_000,
            ..Default::default()
        },
    );

    manual.advance(10_000_000_000);
    coordinator.sweep_stale();
    assert_eq!(coordinator.pending_count(), 0);
    coordinator.shutdown().await;
    assert_eq!(coordinator.pending_count(), 0);
}
