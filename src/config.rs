//! Configuration types for flywheel

use crate::gear::{Gear, GearTable, GearThresholds};
use crate::query::{default_catalog, Query, QueryCatalog};
use crate::telemetry::LogFormat;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub thresholds: GearThresholds,
    #[serde(default)]
    pub gears: GearTable,
    /// Query catalog; the built-in market catalog is used when absent
    #[serde(default)]
    pub queries: Option<Vec<Query>>,
    #[serde(default)]
    pub volatility: VolatilityConfig,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Controller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Gear at process start
    #[serde(default)]
    pub initial_gear: Gear,

    /// Rate-limit units per budget window
    #[serde(default = "default_rate_limit_budget")]
    pub rate_limit_budget: u64,

    /// Budget window length; the window is reset externally on this period
    #[serde(default = "default_budget_window_secs")]
    pub budget_window_secs: u64,
}

fn default_rate_limit_budget() -> u64 {
    1000
}
fn default_budget_window_secs() -> u64 {
    3600 // hourly reset
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            initial_gear: Gear::Medium,
            rate_limit_budget: 1000,
            budget_window_secs: 3600,
        }
    }
}

impl ControllerConfig {
    pub fn budget_window(&self) -> Duration {
        Duration::from_secs(self.budget_window_secs)
    }
}

/// Rolling volatility configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VolatilityConfig {
    /// Window for realized volatility (minutes)
    #[serde(default = "default_volatility_window")]
    pub window_minutes: u64,
}

fn default_volatility_window() -> u64 {
    30
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self { window_minutes: 30 }
    }
}

/// Active/standby job configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FailoverConfig {
    /// Job names in fallback priority order; the first starts active
    #[serde(default = "default_jobs")]
    pub jobs: Vec<String>,

    /// A tick running longer than this fails over to the next standby
    #[serde(default = "default_tick_timeout_secs")]
    pub tick_timeout_secs: u64,

    /// A failed job returns to standby after this many seconds
    #[serde(default = "default_reinstate_after_secs")]
    pub reinstate_after_secs: u64,
}

fn default_jobs() -> Vec<String> {
    vec!["primary".to_string(), "standby".to_string()]
}
fn default_tick_timeout_secs() -> u64 {
    10
}
fn default_reinstate_after_secs() -> u64 {
    300
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            tick_timeout_secs: 10,
            reinstate_after_secs: 300,
        }
    }
}

impl FailoverConfig {
    pub fn tick_timeout(&self) -> Duration {
        Duration::from_secs(self.tick_timeout_secs)
    }

    pub fn reinstate_after(&self) -> Duration {
        Duration::from_secs(self.reinstate_after_secs)
    }
}

/// ML warehouse configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    /// Write tick records to Parquet
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Start a new file series after this many seconds
    #[serde(default = "default_rotation_interval_secs")]
    pub rotation_interval_secs: u64,

    /// Records buffered before a flush
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Maximum seconds between flushes
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Ticks in the rolling volatility average
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
}

fn default_true() -> bool {
    true
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./warehouse")
}
fn default_rotation_interval_secs() -> u64 {
    3600
}
fn default_buffer_size() -> usize {
    100
}
fn default_flush_interval_secs() -> u64 {
    60
}
fn default_rolling_window() -> usize {
    12
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: default_output_dir(),
            rotation_interval_secs: 3600,
            buffer_size: 100,
            flush_interval_secs: 60,
            rolling_window: 12,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus exporter port; no exporter when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Query catalog with the built-in fallback.
    ///
    /// `queries = []` is an explicitly empty catalog.
    pub fn catalog(&self) -> QueryCatalog {
        match &self.queries {
            Some(queries) => QueryCatalog::new(queries.clone()),
            None => default_catalog(),
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> anyhow::Result<()> {
        self.thresholds.validate()?;
        self.gears.validate()?;
        self.catalog().validate()?;
        if self.controller.rate_limit_budget == 0 {
            anyhow::bail!("controller.rate_limit_budget must be positive");
        }
        if self.controller.budget_window_secs == 0 {
            anyhow::bail!("controller.budget_window_secs must be positive");
        }
        if self.failover.jobs.is_empty() {
            anyhow::bail!("failover.jobs must name at least one job");
        }
        if self.failover.tick_timeout_secs == 0 {
            anyhow::bail!("failover.tick_timeout_secs must be positive");
        }
        Ok(())
    }
}
