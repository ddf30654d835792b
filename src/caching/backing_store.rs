//! C2: BackingStore — the L2 tier.
//!
//! A slower, larger key/value tier holding serialized pair records with a
//! TTL. Treated as network-remote: implementations may block for tens of
//! milliseconds. The core ships one reference implementation,
//! `InMemoryBackingStore`, used by the demo binary and integration tests;
//! a real deployment plugs in whatever client talks to its actual L2.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::error::CacheWarmingError;
use crate::pair::PairId;

/// Opaque serialized payload. The warmer never interprets these bytes.
pub type Opaque = Arc<[u8]>;

/// Slower tier behind the L1 price matrix.
pub trait BackingStore: Send + Sync {
    fn get(&self, pair: &PairId) -> Result<Option<Opaque>, CacheWarmingError>;
    fn put(&self, pair: &PairId, bytes: Opaque, ttl: Duration) -> Result<(), CacheWarmingError>;
}

struct Entry {
    bytes: Opaque,
    expires_at_ns: u64,
}

/// In-memory reference `BackingStore`, TTL-governed via an injected
/// `Clock` rather than wall time.
pub struct InMemoryBackingStore {
    entries: Mutex<HashMap<PairId, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryBackingStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl BackingStore for InMemoryBackingStore {
    fn get(&self, pair: &PairId) -> Result<Option<Opaque>, CacheWarmingError> {
        if pair.as_str().is_empty() {
            return Err(CacheWarmingError::InvalidKey("empty pair id".to_string()));
        }
        let mut entries = self.entries.lock();
        let now_ns = self.clock.now_ns();
        match entries.get(pair) {
            Some(entry) if entry.expires_at_ns > now_ns => Ok(Some(entry.bytes.clone())),
            Some(_) => {
                entries.remove(pair);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, pair: &PairId, bytes: Opaque, ttl: Duration) -> Result<(), CacheWarmingError> {
        if pair.as_str().is_empty() {
            return Err(CacheWarmingError::InvalidKey("empty pair id".to_string()));
        }
        let expires_at_ns = self.clock.now_ns().saturating_add(ttl.as_nanos() as u64);
        self.entries.lock().insert(
            pair.clone(),
            Entry {
                bytes,
                expires_at_ns,
            },
        );
        Ok(())
    }
}
