//! Error taxonomy shared by every subsystem in this crate.
//!
//! Unlike the rest of the house style, which reaches for `anyhow` at call
//! sites, these variants are consumed structurally by other in-process
//! components (the tracker inspects `ClockSkew`, the warmer counts
//! `Timeout`s separately from `CacheRead`s) so a derived enum is used
//! instead.

use thiserror::Error;

/// The complete set of error conditions this crate's public API can surface.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CacheWarmingError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid domain value: {0}")]
    InvalidDomainValue(String),

    #[error("capacity violation: {0}")]
    CapacityViolation(String),

    #[error("cache read failed: {0}")]
    CacheRead(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("clock skew: {0}")]
    ClockSkew(String),

    #[error("shutting down")]
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, CacheWarmingError>;
