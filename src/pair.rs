//! `PairId` and `ChainId`: the opaque stable identifiers threaded through
//! every subsystem.

use std::fmt;
use std::sync::Arc;

use crate::error::CacheWarmingError;

/// Opaque, cheaply-cloneable identifier for a trading pair.
///
/// Equality is exact except for case-folding of hex-looking addresses
/// (`0x`-prefixed strings are lower-cased at construction so `0xABC...` and
/// `0xabc...` compare equal). Hashing is O(1): `Arc<str>` hashes its
/// contents once per construction, not per use, since clones share the
/// same backing allocation.
#[derive(Clone, Eq)]
pub struct PairId(Arc<str>);

impl PairId {
    /// Builds a `PairId`, rejecting the empty string.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CacheWarmingError> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(CacheWarmingError::InvalidKey(
                "pair id must not be empty".to_string(),
            ));
        }
        let normalized = if raw.starts_with("0x") || raw.starts_with("0X") {
            raw.to_ascii_lowercase()
        } else {
            raw.to_string()
        };
        Ok(Self(Arc::from(normalized)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for PairId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::hash::Hash for PairId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PairId").field(&self.0).finish()
    }
}

impl Ord for PairId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for PairId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Identifier for the chain a pair trades on. Kept distinct from `PairId`
/// so metric labels don't collide with pair identity.
pub type ChainId = Arc<str>;
