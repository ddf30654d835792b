//! Structured logging init.
//!
//! Mirrors the teacher's `performance::tracing_layer`, minus the custom
//! span-profiling layer that module bolts on: this crate only needs an
//! `EnvFilter` plus a `fmt` layer, since latency observation goes through
//! `MetricsSink`/`LatencyHistogram`, not through span timings.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber. `level` is used as the default
/// filter directive when `RUST_LOG` is unset (e.g. `"warm_cache=info"`).
///
/// Safe to call once per process; a second call is a no-op logged at debug.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = fmt().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
