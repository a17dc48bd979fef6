//! Daemon configuration
//!
//! Read from an optional file (`SCORERD_CONFIG`, default `scorerd.yaml`)
//! overlaid with `SCORER__*` environment variables, e.g.
//! `SCORER__API_PORT=9000` or `SCORER__SCORING__STRATEGY=ipc_only`.

use anyhow::{Context, Result};
use scorer_lib::{IdleGateMode, ScoringStrategy, SelectorConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "scorerd.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct ScorerConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Port for the scoring API and health/metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_topology_path")]
    pub topology_path: PathBuf,

    /// Extra application profiles layered over the built-in catalog
    #[serde(default)]
    pub profiles_path: Option<PathBuf>,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// JSON snapshot served by the in-memory telemetry store
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// Monitoring interval of the telemetry pipeline
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            sample_interval_secs: default_sample_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_window")]
    pub window_secs: u64,

    #[serde(default)]
    pub strategy: ScoringStrategy,

    #[serde(default)]
    pub idle_gate: IdleGateMode,

    /// Consecutive telemetry failures before the store is reported unhealthy
    #[serde(default = "default_failure_threshold")]
    pub health_failure_threshold: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window(),
            strategy: ScoringStrategy::default(),
            idle_gate: IdleGateMode::default(),
            health_failure_threshold: default_failure_threshold(),
        }
    }
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "scorerd".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_topology_path() -> PathBuf {
    PathBuf::from("infra.yaml")
}

fn default_sample_interval() -> f64 {
    0.2
}

fn default_cache_ttl() -> u64 {
    10
}

fn default_window() -> u64 {
    20
}

fn default_failure_threshold() -> u32 {
    3
}

impl ScorerConfig {
    /// Load configuration from the default file location and environment
    pub fn load() -> Result<Self> {
        let file = std::env::var("SCORERD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(Some(&file))
    }

    /// Load configuration from an optional file and environment
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).required(false));
        }

        let config: ScorerConfig = builder
            .add_source(
                config::Environment::with_prefix("SCORER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read scorer configuration")?
            .try_deserialize()
            .context("Invalid scorer configuration")?;

        config.selector_config()?;
        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// Selector settings, validating the sampling interval
    pub fn selector_config(&self) -> Result<SelectorConfig> {
        let sample_interval = Duration::try_from_secs_f64(self.telemetry.sample_interval_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .with_context(|| {
                format!(
                    "telemetry.sample_interval_secs must be positive, got {}",
                    self.telemetry.sample_interval_secs
                )
            })?;

        Ok(SelectorConfig {
            window: Duration::from_secs(self.scoring.window_secs),
            sample_interval,
            strategy: self.scoring.strategy,
            idle_gate: self.scoring.idle_gate,
        })
    }
}
