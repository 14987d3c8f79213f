//! Monitor configuration

use anyhow::{bail, Context, Result};
use monitor_lib::{EngineConfig, RetentionPolicy, Target};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Monitor configuration, read from `MONITOR_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Node name from the deployment environment
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Tracked counters, comma-separated in the environment
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    /// Seconds between tick starts
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: f64,

    #[serde(default = "default_min_points_for_fit")]
    pub min_points_for_fit: usize,

    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    /// Per-target history length, 0 keeps every point
    #[serde(default)]
    pub history_capacity: usize,

    #[serde(default)]
    pub reset_history_on_regression: bool,

    /// Consecutive failed ticks before the monitor reports unhealthy
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Directory holding the per-target record files and the status log
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory of the JSON-lines store
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Port for the query, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_targets() -> Vec<String> {
    monitor_lib::engine::DEFAULT_TARGETS
        .iter()
        .map(|t| t.to_string())
        .collect()
}

fn default_poll_seconds() -> f64 {
    5.0
}

fn default_min_points_for_fit() -> usize {
    monitor_lib::regression::DEFAULT_MIN_POINTS_FOR_FIT
}

fn default_trend_window() -> usize {
    monitor_lib::regression::DEFAULT_TREND_WINDOW
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./monitor-store")
}

fn default_api_port() -> u16 {
    8000
}

impl MonitorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let source = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("MONITOR")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("targets"),
            )
            .build()?;

        Self::from_source(source)
    }

    fn from_source(source: config::Config) -> Result<Self> {
        let config: MonitorConfig = source
            .try_deserialize()
            .context("Invalid monitor configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.targets.iter().all(|t| t.trim().is_empty()) {
            bail!("at least one target is required");
        }
        if !self.poll_seconds.is_finite() || self.poll_seconds <= 0.0 {
            bail!("poll_seconds must be positive, got {}", self.poll_seconds);
        }
        if self.min_points_for_fit < 2 {
            bail!("min_points_for_fit must be at least 2");
        }
        if self.trend_window < 2 {
            bail!("trend_window must be at least 2");
        }
        Ok(())
    }

    pub fn target_list(&self) -> Vec<Target> {
        self.targets
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(Target::from)
            .collect()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            targets: self.target_list(),
            poll_period: Duration::from_secs_f64(self.poll_seconds),
            min_points_for_fit: self.min_points_for_fit,
            trend_window: self.trend_window,
            retention: RetentionPolicy::from_capacity(self.history_capacity),
            reset_history_on_regression: self.reset_history_on_regression,
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }
}
