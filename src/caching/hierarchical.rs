//! C3: HierarchicalCache — the read-through/write-through façade over
//! L1 + L2.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::caching::backing_store::{BackingStore, Opaque};
use crate::caching::price_matrix::{PriceMatrix, PriceRecord};
use crate::error::CacheWarmingError;
use crate::pair::PairId;

/// Result of a single `HierarchicalCache::get` call. Carries both the
/// L1-residency bit and the value so the warmer never issues a second
/// fetch to learn what it already has in hand.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub in_l1: bool,
    pub value: Option<Opaque>,
}

const PRICE_RECORD_SIZE: usize = std::mem::size_of::<PriceRecord>();

fn record_to_bytes(record: PriceRecord) -> Opaque {
    let mut buf = Vec::with_capacity(PRICE_RECORD_SIZE);
    buf.extend_from_slice(&record.price_fp.to_le_bytes());
    buf.extend_from_slice(&record.timestamp_ns.to_le_bytes());
    buf.extend_from_slice(&record.flags.to_le_bytes());
    Arc::from(buf.into_boxed_slice())
}

fn bytes_to_record(bytes: &[u8]) -> Result<PriceRecord, CacheWarmingError> {
    if bytes.len() < 18 {
        return Err(CacheWarmingError::CacheRead(format!(
            "expected at least 18 bytes for a PriceRecord, got {}",
            bytes.len()
        )));
    }
    let price_fp = i64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let timestamp_ns = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
    let flags = u16::from_le_bytes(bytes[16..18].try_into().unwrap());
    Ok(PriceRecord::new(price_fp, timestamp_ns, flags))
}

/// Read-through/write-through façade over the L1 price matrix and the L2
/// backing store.
pub struct HierarchicalCache {
    l1: Arc<PriceMatrix>,
    l2: Arc<dyn BackingStore>,
    l2_ttl: std::time::Duration,
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
}

impl HierarchicalCache {
    pub fn new(l1: Arc<PriceMatrix>, l2: Arc<dyn BackingStore>, l2_ttl: std::time::Duration) -> Self {
        Self {
            l1,
            l2,
            l2_ttl,
            l1_hits: AtomicU64::new(0),
            l2_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Single-fetch read: L1 first, then L2, never both needed by a
    /// caller wanting to know residency and value at once.
    pub fn get(&self, pair: &PairId) -> Result<CacheLookup, CacheWarmingError> {
        if let Some(record) = self.l1.get(pair)? {
            self.l1_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(CacheLookup {
                in_l1: true,
                value: Some(record_to_bytes(record)),
            });
        }

        match self.l2.get(pair)? {
            Some(bytes) => {
                // Validate eagerly so a corrupted L2 payload surfaces as
                // `CacheRead`, never a half-formed success.
                bytes_to_record(&bytes)?;
                self.l2_hits.fetch_add(1, Ordering::Relaxed);
                Ok(CacheLookup {
                    in_l1: false,
                    value: Some(bytes),
                })
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(CacheLookup {
                    in_l1: false,
                    value: None,
                })
            }
        }
    }

    /// Writes through both tiers.
    pub fn put(&self, pair: &PairId, value: Opaque) -> Result<(), CacheWarmingError> {
        let record = bytes_to_record(&value)?;
        self.l1.put(pair, record)?;
        self.l2.put(pair, value, self.l2_ttl)?;
        Ok(())
    }

    /// Promotes an already-fetched L2 value into L1 without re-writing L2
    /// (it's already there). Used by the warmer, which already paid for a
    /// single L2 fetch and must not issue a second read.
    pub fn promote(&self, pair: &PairId, value: &Opaque) -> Result<(), CacheWarmingError> {
        let record = bytes_to_record(value)?;
        self.l1.put(pair, record)
    }

    pub fn l1_slot_count(&self) -> u32 {
        self.l1.capacity_slots()
    }

    pub fn l1_size_bytes(&self) -> u64 {
        self.l1.capacity_bytes()
    }

    pub fn l1_used_slots(&self) -> usize {
        self.l1.len()
    }

    pub fn hits(&self) -> (u64, u64) {
        (
            self.l1_hits.load(Ordering::Relaxed),
            self.l2_hits.load(Ordering::Relaxed),
        )
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::backing_store::InMemoryBackingStore;
    use crate::caching::price_matrix::EvictionPolicy;
    use crate::clock::ManualClock;

    fn pair(s: &str) -> PairId {
        PairId::new(s).unwrap()
    }

    fn cache() -> HierarchicalCache {
        let clock = Arc::new(ManualClock::new(0));
        let l1 = Arc::new(PriceMatrix::new(8, 1, EvictionPolicy::Evict));
        let l2 = Arc::new(InMemoryBackingStore::new(clock));
        HierarchicalCache::new(l1, l2, std::time::Duration::from_secs(30))
    }

    #[test]
    fn put_populates_both_tiers_and_get_hits_l1() {
        let cache = cache();
        let p = pair("ETH/USDC");
        let record = PriceRecord::from_f64(1800.0, 1, 0);
        cache.put(&p, record_to_bytes(record)).unwrap();
        let lookup = cache.get(&p).unwrap();
        assert!(lookup.in_l1);
        assert!(lookup.value.is_some());
    }

    #[test]
    fn l2_only_hit_reports_in_l1_false() {
        let cache = cache();
        let p = pair("BTC/USDC");
        let record = PriceRecord::from_f64(60000.0, 1, 0);
        cache.l2.put(&p, record_to_bytes(record), cache.l2_ttl).unwrap();
        let lookup = cache.get(&p).unwrap();
        assert!(!lookup.in_l1);
        assert!(lookup.value.is_some());
    }

    #[test]
    fn total_miss_returns_no_value() {
        let cache = cache();
        let lookup = cache.get(&pair("NOPE/USDC")).unwrap();
        assert!(!lookup.in_l1);
        assert!(lookup.value.is_none());
    }

    #[test]
    fn promote_does_not_touch_l2() {
        let cache = cache();
        let p = pair("SOL/USDC");
        let record = PriceRecord::from_f64(140.0, 1, 0);
        let bytes = record_to_bytes(record);
        cache.l2.put(&p, bytes.clone(), cache.l2_ttl).unwrap();
        cache.promote(&p, &bytes).unwrap();
        let lookup = cache.get(&p).unwrap();
        assert!(lookup.in_l1);
    }
}
