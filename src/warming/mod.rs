//! Candidate selection and single-flight promotion of correlated pairs
//! into L1.

pub mod coordinator;
pub mod strategy;
pub mod warmer;

pub use coordinator::WarmingCoordinator;
pub use strategy::{build_strategy, Adaptive, StrategyContext, Threshold, TimeWeighted, TopN, WarmingStrategy};
pub use warmer::{CacheWarmer, WarmResult};
