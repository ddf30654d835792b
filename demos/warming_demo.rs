//! Small standalone driver wiring the three subsystems together and
//! replaying a synthetic price-update burst, in the spirit of the
//! teacher's `src/bin/*` demonstration binaries.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use warm_cache::caching::{EvictionPolicy, HierarchicalCache, InMemoryBackingStore, PriceMatrix, PriceRecord};
use warm_cache::clock::{Clock, QuantaClock};
use warm_cache::config::WarmingConfig;
use warm_cache::correlation::{CorrelationTracker, TrackerLimits};
use warm_cache::executor::TokioExecutor;
use warm_cache::metrics_sink::NoopMetricsSink;
use warm_cache::pair::{ChainId, PairId};
use warm_cache::warming::{build_strategy, CacheWarmer, WarmingCoordinator};

#[derive(Parser, Debug)]
#[command(about = "Replays a synthetic price-update burst through the warming pipeline")]
struct Args {
    /// Number of correlated pairs to simulate alongside the trigger pair.
    #[arg(long, default_value_t = 4)]
    partners: u32,

    /// Log level passed to `telemetry::init`.
    #[arg(long, env = "WARM_CACHE_LOG", default_value = "warm_cache=info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    warm_cache::telemetry::init(&args.log_level);

    let config = WarmingConfig::from_env();
    let clock: Arc<dyn Clock> = Arc::new(QuantaClock::new());
    let metrics = Arc::new(NoopMetricsSink);

    let l1 = Arc::new(PriceMatrix::new(config.l1.slots, config.l1.size_mb, EvictionPolicy::Evict));
    let l2 = Arc::new(InMemoryBackingStore::new(clock.clone()));
    let cache = Arc::new(HierarchicalCache::new(
        l1,
        l2.clone(),
        Duration::from_millis(config.l2.ttl_ms as u64),
    ));

    let tracker = Arc::new(CorrelationTracker::new(
        TrackerLimits {
            window_ns: config.tracker.window_ms as u64 * 1_000_000,
            co_window_ns: config.tracker.co_window_ms as u64 * 1_000_000,
            max_tracked_pairs: config.tracker.max_tracked_pairs,
            max_partners_per_pair: config.tracker.max_partners_per_pair,
        },
        clock.clone(),
        metrics.clone(),
    ));

    let strategy = build_strategy(&config.strategy, &config.tracker, &config.warmer);
    let warmer = Arc::new(CacheWarmer::new(
        cache.clone(),
        tracker.clone(),
        strategy,
        clock.clone(),
        metrics.clone(),
        config.strategy,
        config.warmer,
    ));

    let coordinator = WarmingCoordinator::new(
        tracker.clone(),
        warmer,
        Arc::new(TokioExecutor),
        clock.clone(),
        metrics,
        config.integration,
    );

    let trigger = PairId::new("ETH/USDC").unwrap();
    let chain: ChainId = ChainId::from("ethereum");

    let mut partner_ids = Vec::new();
    for i in 0..args.partners {
        let id = PairId::new(format!("PARTNER{i}/USDC")).unwrap();
        let record = PriceRecord::from_f64(1.0 + i as f64, 1, 0);
        let bytes = {
            let mut buf = Vec::new();
            buf.extend_from_slice(&record.price_fp.to_le_bytes());
            buf.extend_from_slice(&record.timestamp_ns.to_le_bytes());
            buf.extend_from_slice(&record.flags.to_le_bytes());
            std::sync::Arc::<[u8]>::from(buf.into_boxed_slice())
        };
        l2.put(&id, bytes, Duration::from_millis(config.l2.ttl_ms as u64))?;
        partner_ids.push(id);
    }

    let t0 = clock.now_ns();
    for (i, id) in partner_ids.iter().enumerate() {
        let at = t0 + i as u64 * 1_000_000;
        coordinator.on_price_update(trigger.clone(), at, chain.clone());
        coordinator.on_price_update(id.clone(), at, chain.clone());
    }

    // Give the background warming task a moment to run before we inspect
    // results; a real deployment never waits like this on the hot path.
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("tracked pairs: {}", tracker.tracked_pairs().len());
    let ranked = tracker.rank(&trigger, 10, 0.0);
    for r in &ranked {
        println!("  {} score={:.3} coOccurrences={}", r.pair, r.score, r.co_occurrences);
    }
    println!("stats: {:?}", tracker.stats());
    println!("pending warmings: {}", coordinator.pending_count());

    coordinator.shutdown().await;
    Ok(())
}
