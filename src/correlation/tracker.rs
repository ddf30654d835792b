//! C4: CorrelationTracker — streaming co-occurrence over a sliding window.
//!
//! State is sharded by pair hash into `Vec<CachePadded<Mutex<Shard>>>`,
//! mirroring the teacher's `performance::queues::QueueRegistry` striping
//! idiom generalized from one map to N cache-line-padded shards so
//! hot-path contention stays bounded regardless of how many pairs are
//! tracked, and so two adjacent shards' locks can't false-share a cache
//! line under concurrent `record` calls. A second, smaller structure —
//! `recent_activity` — tracks which pairs have been recorded within the
//! co-occurrence window so `record` doesn't have to scan every tracked
//! pair to find partners.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::utils::CachePadded;
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::correlation::types::{CorrelationPair, CorrelationStats, RecordOutcome};
use crate::error::CacheWarmingError;
use crate::metrics_sink::MetricsSink;
use crate::pair::PairId;
use crate::performance::LatencyHistogram;

const DEFAULT_SHARDS: usize = 32;
/// How far into the future a timestamp may drift before it's logged as
/// clock skew. Soft limit: the record still proceeds.
const CLOCK_SKEW_TOLERANCE_NS: u64 = 2_000_000_000;

#[derive(Clone)]
struct PartnerEdge {
    co_occurrences: u32,
    last_co_occurrence_ns: u64,
}

struct PairState {
    timestamps: VecDeque<u64>,
    total_updates: u64,
    newest_timestamp_ns: u64,
    partners: HashMap<PairId, PartnerEdge>,
}

impl PairState {
    fn new() -> Self {
        Self {
            timestamps: VecDeque::new(),
            total_updates: 0,
            newest_timestamp_ns: 0,
            partners: HashMap::new(),
        }
    }
}

type Shard = HashMap<PairId, PairState>;

/// Tunables the tracker needs at construction.
#[derive(Debug, Clone, Copy)]
pub struct TrackerLimits {
    pub window_ns: u64,
    pub co_window_ns: u64,
    pub max_tracked_pairs: u32,
    pub max_partners_per_pair: u32,
}

pub struct CorrelationTracker {
    /// Each shard's lock is cache-line padded so that hot-path contention on
    /// one pair's shard can't false-share with an adjacent, unrelated shard.
    shards: Vec<CachePadded<Mutex<Shard>>>,
    recent_activity: Mutex<VecDeque<(u64, PairId)>>,
    total_pairs: AtomicU64,
    limits: TrackerLimits,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    record_latency: LatencyHistogram,
}

fn shard_index(pair: &PairId, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    pair.hash(&mut hasher);
    (hasher.finish() as usize) % shard_count
}

impl CorrelationTracker {
    pub fn new(limits: TrackerLimits, clock: Arc<dyn Clock>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self::with_shard_count(limits, clock, metrics, DEFAULT_SHARDS)
    }

    pub fn with_shard_count(
        limits: TrackerLimits,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
        shard_count: usize,
    ) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count)
                .map(|_| CachePadded::new(Mutex::new(HashMap::new())))
                .collect(),
            recent_activity: Mutex::new(VecDeque::new()),
            total_pairs: AtomicU64::new(0),
            limits,
            clock,
            metrics,
            record_latency: LatencyHistogram::new(),
        }
    }

    /// Records an update for `pair` at `timestamp_ns`, updating its window
    /// history and bumping co-occurrence counts with every pair recently
    /// active within the co-occurrence window.
    pub fn record(&self, pair: PairId, timestamp_ns: u64) -> RecordOutcome {
        let start = Instant::now();

        if pair.as_str().is_empty() {
            self.metrics.counter_inc(
                "tracking_error_total",
                &[("reason", "invalid_key".to_string())],
                1,
            );
            return RecordOutcome {
                success: false,
                correlations_updated: 0,
                duration_us: start.elapsed().as_micros() as u32,
            };
        }

        let now_ns = self.clock.now_ns();
        if timestamp_ns > now_ns.saturating_add(CLOCK_SKEW_TOLERANCE_NS) {
            tracing::warn!(pair = %pair, timestamp_ns, now_ns, "clock skew beyond tolerance");
            self.metrics.counter_inc(
                "tracking_error_total",
                &[("reason", "clock_skew".to_string())],
                1,
            );
        }

        self.ensure_capacity(&pair);

        let partners_now = self.touch_recent_activity(&pair, timestamp_ns);

        let mut touched_shards: Vec<usize> = partners_now
            .iter()
            .map(|q| shard_index(q, self.shards.len()))
            .chain(std::iter::once(shard_index(&pair, self.shards.len())))
            .collect();
        touched_shards.sort_unstable();
        touched_shards.dedup();

        let mut guards: Vec<(usize, parking_lot::MutexGuard<'_, Shard>)> = touched_shards
            .into_iter()
            .map(|idx| (idx, self.shards[idx].lock()))
            .collect();

        let pair_shard_idx = shard_index(&pair, self.shards.len());
        {
            let (_, shard) = guards.iter_mut().find(|(idx, _)| *idx == pair_shard_idx).unwrap();
            let state = shard.entry(pair.clone()).or_insert_with(PairState::new);
            state.timestamps.push_back(timestamp_ns);
            while let Some(&front) = state.timestamps.front() {
                if front + self.limits.window_ns < timestamp_ns {
                    state.timestamps.pop_front();
                } else {
                    break;
                }
            }
            state.newest_timestamp_ns = state.newest_timestamp_ns.max(timestamp_ns);
            state.total_updates += 1;
        }

        let mut affected = 0u32;
        for q in &partners_now {
            if q == &pair {
                continue;
            }
            let q_shard_idx = shard_index(q, self.shards.len());

            {
                let (_, p_shard) = guards.iter_mut().find(|(idx, _)| *idx == pair_shard_idx).unwrap();
                let state = p_shard.get_mut(&pair).unwrap();
                upsert_edge(state, q.clone(), timestamp_ns, self.limits.max_partners_per_pair);
            }
            {
                let (_, q_shard) = guards.iter_mut().find(|(idx, _)| *idx == q_shard_idx).unwrap();
                let state = q_shard.get_mut(q).unwrap();
                upsert_edge(state, pair.clone(), timestamp_ns, self.limits.max_partners_per_pair);
            }
            affected += 1;
        }

        drop(guards);

        let duration_us = start.elapsed().as_micros() as u32;
        self.record_latency.record_duration(start.elapsed());
        self.metrics
            .histogram_observe("correlation_tracking_duration_us", &[], duration_us as f64);

        RecordOutcome {
            success: true,
            correlations_updated: affected,
            duration_us,
        }
    }

    fn touch_recent_activity(&self, pair: &PairId, timestamp_ns: u64) -> Vec<PairId> {
        let mut activity = self.recent_activity.lock();
        activity.push_back((timestamp_ns, pair.clone()));
        while let Some(&(t, _)) = activity.front() {
            if t + self.limits.co_window_ns < timestamp_ns {
                activity.pop_front();
            } else {
                break;
            }
        }
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for (_, p) in activity.iter().rev() {
            if p != pair && seen.insert(p.clone()) {
                out.push(p.clone());
            }
        }
        out
    }

    fn ensure_capacity(&self, incoming: &PairId) {
        let already_tracked = {
            let idx = shard_index(incoming, self.shards.len());
            self.shards[idx].lock().contains_key(incoming)
        };
        if already_tracked {
            return;
        }
        if self.total_pairs.load(Ordering::Relaxed) < self.limits.max_tracked_pairs as u64 {
            self.total_pairs.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.evict_lru();
    }

    /// Scans every shard for the globally least-recently-seen pair and
    /// removes it. Infrequent relative to `record`, so a full-shard scan
    /// is an acceptable trade against the complexity of a cross-shard LRU
    /// index.
    fn evict_lru(&self) {
        let mut victim: Option<(u64, PairId, usize)> = None;
        for (idx, shard) in self.shards.iter().enumerate() {
            let shard = shard.lock();
            for (pair, state) in shard.iter() {
                if victim.as_ref().map_or(true, |(t, _, _)| state.newest_timestamp_ns < *t) {
                    victim = Some((state.newest_timestamp_ns, pair.clone(), idx));
                }
            }
        }
        if let Some((_, pair, idx)) = victim {
            self.shards[idx].lock().remove(&pair);
        }
    }

    /// `pair`'s live `total_updates`, or `0` if it isn't (or is no longer)
    /// tracked. Always called with no other shard lock held by the caller,
    /// since it may lock the same shard the caller just released.
    fn live_total_updates(&self, pair: &PairId) -> u64 {
        let idx = shard_index(pair, self.shards.len());
        self.shards[idx].lock().get(pair).map(|s| s.total_updates).unwrap_or(0)
    }

    /// Up to `top_n` pairs correlated with `pair`, sorted descending by
    /// score, filtered to `score >= min_score`. Scores are computed from
    /// both pairs' *live* `total_updates` rather than a snapshot cached on
    /// the edge, so `score(P,Q)` always equals `score(Q,P)` even when one
    /// side has taken further solo updates since they last co-occurred.
    pub fn rank(&self, pair: &PairId, top_n: u32, min_score: f64) -> Vec<CorrelationPair> {
        let (p_total_updates, partner_entries) = {
            let idx = shard_index(pair, self.shards.len());
            let shard = self.shards[idx].lock();
            let state = match shard.get(pair) {
                Some(state) => state,
                None => return Vec::new(),
            };
            let entries: Vec<(PairId, u32, u64)> = state
                .partners
                .iter()
                .filter(|(_, edge)| edge.co_occurrences > 0)
                .map(|(q, edge)| (q.clone(), edge.co_occurrences, edge.last_co_occurrence_ns))
                .collect();
            (state.total_updates, entries)
        };

        let now_ns = self.clock.now_ns();
        let mut results: Vec<CorrelationPair> = partner_entries
            .into_iter()
            .filter_map(|(q, co_occurrences, last_co_occurrence_ns)| {
                let q_total_updates = self.live_total_updates(&q);
                let score = compute_score(co_occurrences, p_total_updates, q_total_updates);
                if score < min_score {
                    return None;
                }
                CorrelationPair::new(pair, q, score, co_occurrences, last_co_occurrence_ns, now_ns).ok()
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_seen_timestamp_ns.cmp(&a.last_seen_timestamp_ns))
                .then_with(|| a.pair.cmp(&b.pair))
        });
        results.truncate(top_n as usize);
        results
    }

    /// The correlation score between two distinct pairs, if both are
    /// tracked and have ever co-occurred. Reads both pairs' live
    /// `total_updates` so the result is symmetric: `score(pair1, pair2)`
    /// always equals `score(pair2, pair1)`.
    pub fn score(&self, pair1: &PairId, pair2: &PairId) -> Option<f64> {
        if pair1 == pair2 {
            return None;
        }
        let idx = shard_index(pair1, self.shards.len());
        let (p_total_updates, co_occurrences) = {
            let shard = self.shards[idx].lock();
            let state = shard.get(pair1)?;
            let edge = state.partners.get(pair2)?;
            if edge.co_occurrences == 0 {
                return None;
            }
            (state.total_updates, edge.co_occurrences)
        };
        let q_total_updates = self.live_total_updates(pair2);
        Some(compute_score(co_occurrences, p_total_updates, q_total_updates))
    }

    /// Snapshot of every currently tracked pair, in unspecified order.
    pub fn tracked_pairs(&self) -> Vec<PairId> {
        self.shards
            .iter()
            .flat_map(|shard| shard.lock().keys().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Clears all tracker state.
    pub fn reset(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
        self.recent_activity.lock().clear();
        self.total_pairs.store(0, Ordering::Relaxed);
    }

    /// p95 of `record`'s observed duration, in microseconds. Exposed so
    /// callers (and tests) can check the `record` latency target in §4.4
    /// without reaching into `MetricsSink`.
    pub fn record_latency_p95_us(&self) -> u64 {
        self.record_latency.p95()
    }

    pub fn stats(&self) -> CorrelationStats {
        // First pass: snapshot every tracked pair's live `total_updates`
        // and the edge list, one shard lock at a time, so the second pass
        // can compute scores without needing two shard locks held at once.
        let mut total_updates_by_pair: HashMap<PairId, u64> = HashMap::new();
        let mut total_pairs = 0u64;
        let mut oldest: Option<u64> = None;
        let mut newest: Option<u64> = None;
        let mut window_bytes = 0u64;
        let mut edges: Vec<(PairId, PairId, u32)> = Vec::new();

        for shard in &self.shards {
            let shard = shard.lock();
            for (pair, state) in shard.iter() {
                total_pairs += 1;
                total_updates_by_pair.insert(pair.clone(), state.total_updates);
                window_bytes += (state.timestamps.len() * std::mem::size_of::<u64>()) as u64;
                if let Some(&front) = state.timestamps.front() {
                    oldest = Some(oldest.map_or(front, |o| o.min(front)));
                }
                newest = Some(newest.map_or(state.newest_timestamp_ns, |n| n.max(state.newest_timestamp_ns)));
                for (q, edge) in &state.partners {
                    if edge.co_occurrences > 0 {
                        edges.push((pair.clone(), q.clone(), edge.co_occurrences));
                    }
                }
            }
        }

        let mut total_co_occurrences = 0u64;
        let mut score_sum = 0f64;
        let mut score_count = 0u64;
        for (p, q, co_occurrences) in &edges {
            total_co_occurrences += *co_occurrences as u64;
            let p_updates = total_updates_by_pair.get(p).copied().unwrap_or(0);
            let q_updates = total_updates_by_pair.get(q).copied().unwrap_or(0);
            score_sum += compute_score(*co_occurrences, p_updates, q_updates);
            score_count += 1;
        }

        let memory_bytes = window_bytes
            + total_pairs * std::mem::size_of::<PairId>() as u64
            + total_co_occurrences * std::mem::size_of::<PartnerEdge>() as u64;

        CorrelationStats {
            total_pairs,
            // counts[P][Q] and counts[Q][P] are both incremented per
            // co-occurrence, so the unique edge count is half the sum.
            total_co_occurrences: total_co_occurrences / 2,
            avg_score: if score_count > 0 { score_sum / score_count as f64 } else { 0.0 },
            memory_bytes,
            oldest_timestamp_ns: oldest,
            newest_timestamp_ns: newest,
            window_bytes,
        }
    }
}

fn compute_score(co_occurrences: u32, update_count_a: u64, update_count_b: u64) -> f64 {
    let denom = update_count_a.max(update_count_b).max(1) as f64;
    (co_occurrences as f64 / denom).clamp(0.0, 1.0)
}

fn upsert_edge(state: &mut PairState, partner: PairId, timestamp_ns: u64, max_partners: u32) {
    if let Some(edge) = state.partners.get_mut(&partner) {
        edge.co_occurrences += 1;
        edge.last_co_occurrence_ns = timestamp_ns;
        return;
    }

    if state.partners.len() as u32 >= max_partners {
        if let Some(victim) = state
            .partners
            .iter()
            .min_by_key(|(_, edge)| edge.last_co_occurrence_ns)
            .map(|(pair, _)| pair.clone())
        {
            state.partners.remove(&victim);
        }
    }

    state.partners.insert(
        partner,
        PartnerEdge {
            co_occurrences: 1,
            last_co_occurrence_ns: timestamp_ns,
        },
    );
}
