//! Predictive cache-warming subsystem for a multi-chain DEX arbitrage
//! detector.
//!
//! Three tightly-coupled subsystems live here: [`caching`] (the L1/L2
//! hierarchical price cache), [`correlation`] (the sliding-window
//! co-occurrence tracker), and [`warming`] (strategy selection and
//! single-flight promotion into L1). [`pair`], [`clock`], [`executor`],
//! [`error`], [`config`], and [`metrics_sink`] are the ambient stack every
//! subsystem above is built on.

pub mod caching;
pub mod clock;
pub mod config;
pub mod correlation;
pub mod error;
pub mod executor;
pub mod metrics_sink;
pub mod pair;
pub mod performance;
pub mod telemetry;
pub mod warming;

pub use clock::{Clock, ManualClock, QuantaClock};
pub use config::WarmingConfig;
pub use error::{CacheWarmingError, Result};
pub use executor::{Executor, SynchronousExecutor, TokioExecutor};
pub use metrics_sink::{FacadeMetricsSink, MetricsSink, NoopMetricsSink};
pub use pair::{ChainId, PairId};
