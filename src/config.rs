//! Configuration for every tunable named in the component design.
//!
//! Grounded in `performance::config::PerfConfig`: a serde `Deserialize`
//! struct with `#[serde(default)]` on every field, loadable from a TOML
//! file or an environment variable pointing at one, falling back to
//! built-in defaults on any failure.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct L1Config {
    #[serde(default = "default_l1_slots")]
    pub slots: u32,
    #[serde(default = "default_l1_size_mb")]
    pub size_mb: u32,
}

impl Default for L1Config {
    fn default() -> Self {
        Self {
            slots: default_l1_slots(),
            size_mb: default_l1_size_mb(),
        }
    }
}

fn default_l1_slots() -> u32 {
    1024
}
fn default_l1_size_mb() -> u32 {
    64
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct L2Config {
    #[serde(default = "default_l2_ttl_ms")]
    pub ttl_ms: u32,
}

impl Default for L2Config {
    fn default() -> Self {
        Self {
            ttl_ms: default_l2_ttl_ms(),
        }
    }
}

fn default_l2_ttl_ms() -> u32 {
    30_000
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    #[serde(default = "default_window_ms")]
    pub window_ms: u32,
    #[serde(default = "default_co_window_ms")]
    pub co_window_ms: u32,
    #[serde(default = "default_max_tracked_pairs")]
    pub max_tracked_pairs: u32,
    #[serde(default = "default_max_partners_per_pair")]
    pub max_partners_per_pair: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            co_window_ms: default_co_window_ms(),
            max_tracked_pairs: default_max_tracked_pairs(),
            max_partners_per_pair: default_max_partners_per_pair(),
        }
    }
}

fn default_window_ms() -> u32 {
    60_000
}
fn default_co_window_ms() -> u32 {
    1_000
}
fn default_max_tracked_pairs() -> u32 {
    10_000
}
fn default_max_partners_per_pair() -> u32 {
    256
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StrategyType {
    TopN,
    Threshold,
    TimeWeighted,
    Adaptive,
}

impl Default for StrategyType {
    fn default() -> Self {
        StrategyType::TopN
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfig {
    #[serde(default)]
    pub r#type: StrategyType,
    #[serde(default = "default_strategy_top_n")]
    pub top_n: u32,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_target_hit_rate")]
    pub target_hit_rate: f64,
    /// `TimeWeighted`'s blend factor between score and recency.
    #[serde(default = "default_time_weight")]
    pub time_weight: f64,
    /// `Adaptive`'s step size per call.
    #[serde(default = "default_adaptive_alpha")]
    pub adaptive_alpha: f64,
    /// `Adaptive`'s floor on `currentN`.
    #[serde(default = "default_adaptive_n_min")]
    pub adaptive_n_min: u32,
    /// `Adaptive`'s ceiling on `currentN`.
    #[serde(default = "default_adaptive_n_max")]
    pub adaptive_n_max: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            r#type: StrategyType::default(),
            top_n: default_strategy_top_n(),
            min_score: default_min_score(),
            target_hit_rate: default_target_hit_rate(),
            time_weight: default_time_weight(),
            adaptive_alpha: default_adaptive_alpha(),
            adaptive_n_min: default_adaptive_n_min(),
            adaptive_n_max: default_adaptive_n_max(),
        }
    }
}

fn default_strategy_top_n() -> u32 {
    5
}
fn default_min_score() -> f64 {
    0.3
}
fn default_target_hit_rate() -> f64 {
    0.97
}
fn default_time_weight() -> f64 {
    0.7
}
fn default_adaptive_alpha() -> f64 {
    0.5
}
fn default_adaptive_n_min() -> u32 {
    1
}
fn default_adaptive_n_max() -> u32 {
    20
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WarmerConfig {
    #[serde(default = "default_max_pairs_per_warm")]
    pub max_pairs_per_warm: u32,
    #[serde(default = "default_warmer_timeout_ms")]
    pub timeout_ms: u32,
    #[serde(default = "default_per_pair_timeout_ms")]
    pub per_pair_timeout_ms: u32,
    #[serde(default = "default_warmer_enabled")]
    pub enabled: bool,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            max_pairs_per_warm: default_max_pairs_per_warm(),
            timeout_ms: default_warmer_timeout_ms(),
            per_pair_timeout_ms: default_per_pair_timeout_ms(),
            enabled: default_warmer_enabled(),
        }
    }
}

fn default_max_pairs_per_warm() -> u32 {
    10
}
fn default_warmer_timeout_ms() -> u32 {
    50
}
fn default_per_pair_timeout_ms() -> u32 {
    10
}
fn default_warmer_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    #[serde(default = "default_stale_age_ms")]
    pub stale_age_ms: u32,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u32,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u32,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            stale_age_ms: default_stale_age_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

fn default_stale_age_ms() -> u32 {
    5_000
}
fn default_sweep_interval_ms() -> u32 {
    30_000
}
fn default_shutdown_grace_ms() -> u32 {
    10_000
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
pub struct WarmingConfig {
    #[serde(default)]
    pub l1: L1Config,
    #[serde(default)]
    pub l2: L2Config,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub warmer: WarmerConfig,
    #[serde(default)]
    pub integration: IntegrationConfig,
}

/// Env var pointing at a TOML config file, consulted by `from_env`.
pub const CONFIG_PATH_ENV_VAR: &str = "WARM_CACHE_CONFIG_PATH";

impl WarmingConfig {
    /// Loads configuration from a TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cfg = toml::from_str(&raw)?;
        Ok(cfg)
    }

    /// Loads from the file named by `WARM_CACHE_CONFIG_PATH`, falling back
    /// to built-in defaults if the variable is unset or the file can't be
    /// read/parsed.
    pub fn from_env() -> Self {
        match std::env::var(CONFIG_PATH_ENV_VAR) {
            Ok(path) => Self::load(&path).unwrap_or_else(|err| {
                tracing::debug!(error = %err, path = %path, "falling back to default WarmingConfig");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}
