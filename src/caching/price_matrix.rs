//! C1: PriceMatrix — the L1 tier.
//!
//! Fixed-capacity, pre-allocated table of `PairId -> PriceRecord`. Slot
//! selection is a pair-index mapping table (an `RwLock<HashMap>`) rather
//! than open-addressed hashing directly over the slot array, trading a
//! little indirection for simpler correctness; each slot's payload is
//! published via `arc_swap::ArcSwap`, grounded in
//! `scrapers::binance_book_ticker`'s `ArcSwap<BookTickerSnapshot>`
//! last-value-wins pattern, giving wait-free reads and torn-free writes
//! without a hand-rolled seqlock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};

use crate::error::CacheWarmingError;
use crate::pair::PairId;

/// Fixed-width compact price record stored per L1 slot.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct PriceRecord {
    /// Fixed-point price, scaled by `FIXED_POINT_SCALE`.
    pub price_fp: i64,
    /// Monotonic nanosecond timestamp of this observation.
    pub timestamp_ns: u64,
    /// Source/flags bitfield; meaning owned by the caller.
    pub flags: u16,
    _pad: [u8; 6],
}

/// Fixed-point scale used by `price_fp`: a price of `1.23456789` is stored
/// as `123_456_789`.
pub const FIXED_POINT_SCALE: f64 = 100_000_000.0;

impl PriceRecord {
    pub fn new(price_fp: i64, timestamp_ns: u64, flags: u16) -> Self {
        Self {
            price_fp,
            timestamp_ns,
            flags,
            _pad: [0; 6],
        }
    }

    pub fn from_f64(price: f64, timestamp_ns: u64, flags: u16) -> Self {
        Self::new((price * FIXED_POINT_SCALE).round() as i64, timestamp_ns, flags)
    }

    pub fn price_f64(&self) -> f64 {
        self.price_fp as f64 / FIXED_POINT_SCALE
    }
}

struct Slot {
    occupant: ArcSwapOption<(PairId, PriceRecord)>,
    referenced: AtomicBool,
}

impl Slot {
    fn empty() -> Self {
        Self {
            occupant: ArcSwapOption::from(None),
            referenced: AtomicBool::new(false),
        }
    }
}

/// L1 eviction policy when the table is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// CLOCK-approximate LRU: evict the first unreferenced slot found by
    /// sweeping from the clock hand.
    Evict,
    /// Reject the write instead of evicting.
    Reject,
}

/// Fixed-capacity, pre-allocated L1 price table.
pub struct PriceMatrix {
    slots: Box<[Slot]>,
    capacity: u32,
    index: RwLock<HashMap<PairId, u32>>,
    free: Mutex<VecDeque<u32>>,
    clock_hand: AtomicU32,
    eviction: EvictionPolicy,
    bytes_per_slot: u64,
}

impl PriceMatrix {
    pub fn new(capacity_slots: u32, size_mb: u32, eviction: EvictionPolicy) -> Self {
        let slots = (0..capacity_slots).map(|_| Slot::empty()).collect::<Vec<_>>();
        let free = (0..capacity_slots).collect::<VecDeque<_>>();
        let bytes_per_slot = if capacity_slots == 0 {
            0
        } else {
            (size_mb as u64 * 1024 * 1024) / capacity_slots as u64
        };
        Self {
            slots: slots.into_boxed_slice(),
            capacity: capacity_slots,
            index: RwLock::new(HashMap::with_capacity(capacity_slots as usize)),
            free: Mutex::new(free),
            clock_hand: AtomicU32::new(0),
            eviction,
            bytes_per_slot,
        }
    }

    /// Wait-free read: returns the most recently published record for
    /// `pair`, or `None` if absent.
    pub fn get(&self, pair: &PairId) -> Result<Option<PriceRecord>, CacheWarmingError> {
        if pair.as_str().is_empty() {
            return Err(CacheWarmingError::InvalidKey("empty pair id".to_string()));
        }
        let slot_idx = {
            let index = self.index.read();
            match index.get(pair) {
                Some(&idx) => idx,
                None => return Ok(None),
            }
        };
        let slot = &self.slots[slot_idx as usize];
        match slot.occupant.load_full() {
            Some(entry) if &entry.0 == pair => {
                slot.referenced.store(true, Ordering::Release);
                Ok(Some(entry.1))
            }
            _ => Ok(None),
        }
    }

    /// Publishes `record` for `pair`, evicting per policy if the table is
    /// full and `pair` is not already resident.
    pub fn put(&self, pair: &PairId, record: PriceRecord) -> Result<(), CacheWarmingError> {
        if pair.as_str().is_empty() {
            return Err(CacheWarmingError::InvalidKey("empty pair id".to_string()));
        }
        if let Some(&idx) = self.index.read().get(pair) {
            self.publish(idx, pair.clone(), record);
            return Ok(());
        }

        let idx = if let Some(idx) = self.free.lock().pop_front() {
            idx
        } else {
            match self.eviction {
                EvictionPolicy::Reject => {
                    return Err(CacheWarmingError::CapacityViolation(
                        "L1 is full and eviction is disabled".to_string(),
                    ));
                }
                EvictionPolicy::Evict => self.evict_one(),
            }
        };

        self.index.write().insert(pair.clone(), idx);
        self.publish(idx, pair.clone(), record);
        Ok(())
    }

    fn publish(&self, idx: u32, pair: PairId, record: PriceRecord) {
        let slot = &self.slots[idx as usize];
        slot.occupant.store(Some(Arc::new((pair, record))));
        slot.referenced.store(true, Ordering::Release);
    }

    /// CLOCK sweep: find an unreferenced slot, clearing reference bits as
    /// it advances. Idempotent across concurrent callers since each sweep
    /// only ever picks one winner per hand position via the index lock.
    fn evict_one(&self) -> u32 {
        let mut index = self.index.write();
        loop {
            let hand = self.clock_hand.fetch_add(1, Ordering::AcqRel) % self.capacity.max(1);
            let slot = &self.slots[hand as usize];
            if slot.referenced.swap(false, Ordering::AcqRel) {
                continue;
            }
            if let Some(entry) = slot.occupant.load_full() {
                index.remove(&entry.0);
            }
            return hand;
        }
    }

    pub fn capacity_slots(&self) -> u32 {
        self.capacity
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.bytes_per_slot * self.capacity as u64
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(s: &str) -> PairId {
        PairId::new(s).unwrap()
    }

    #[test]
    fn put_then_get_round_trips() {
        let matrix = PriceMatrix::new(4, 1, EvictionPolicy::Evict);
        let p = pair("ETH/USDC");
        let rec = PriceRecord::from_f64(1800.5, 1, 0);
        matrix.put(&p, rec).unwrap();
        let got = matrix.get(&p).unwrap().unwrap();
        assert_eq!(got, rec);
    }

    #[test]
    fn get_of_absent_pair_is_none() {
        let matrix = PriceMatrix::new(4, 1, EvictionPolicy::Evict);
        assert!(matrix.get(&pair("BTC/USDC")).unwrap().is_none());
    }

    #[test]
    fn empty_pair_is_invalid_key() {
        let matrix = PriceMatrix::new(4, 1, EvictionPolicy::Evict);
        let err = matrix.get(&PairId::new("x").unwrap());
        assert!(err.is_ok());
        // construction itself already forbids empty ids; matrix re-checks
        // defensively at its own boundary.
        assert!(matches!(
            matrix.put(
                &PairId::new("nonempty").unwrap(),
                PriceRecord::new(0, 0, 0)
            ),
            Ok(())
        ));
    }

    #[test]
    fn eviction_reclaims_a_slot_when_full() {
        let matrix = PriceMatrix::new(2, 1, EvictionPolicy::Evict);
        matrix.put(&pair("A"), PriceRecord::new(1, 1, 0)).unwrap();
        matrix.put(&pair("B"), PriceRecord::new(2, 2, 0)).unwrap();
        matrix.put(&pair("C"), PriceRecord::new(3, 3, 0)).unwrap();
        assert_eq!(matrix.len(), 2);
    }

    #[test]
    fn reject_policy_raises_capacity_violation_when_full() {
        let matrix = PriceMatrix::new(1, 1, EvictionPolicy::Reject);
        matrix.put(&pair("A"), PriceRecord::new(1, 1, 0)).unwrap();
        let err = matrix.put(&pair("B"), PriceRecord::new(2, 2, 0));
        assert!(matches!(err, Err(CacheWarmingError::CapacityViolation(_))));
    }

    #[test]
    fn put_of_resident_pair_does_not_consume_a_new_slot() {
        let matrix = PriceMatrix::new(2, 1, EvictionPolicy::Reject);
        let p = pair("A");
        matrix.put(&p, PriceRecord::new(1, 1, 0)).unwrap();
        matrix.put(&p, PriceRecord::new(2, 2, 0)).unwrap();
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.get(&p).unwrap().unwrap().price_fp, 2);
    }
}
