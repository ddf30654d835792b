//! Hierarchical price cache: L1 in-process matrix + L2 backing store,
//! unified behind a single-fetch façade.

pub mod backing_store;
pub mod hierarchical;
pub mod price_matrix;

pub use backing_store::{BackingStore, InMemoryBackingStore, Opaque};
pub use hierarchical::{CacheLookup, HierarchicalCache};
pub use price_matrix::{EvictionPolicy, PriceMatrix, PriceRecord, FIXED_POINT_SCALE};
