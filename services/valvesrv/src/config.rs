//! Service configuration.
//!
//! Defaults are merged with an optional YAML file and `VALVESRV_*`
//! environment overrides, highest priority last.

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::transport::SerialConfig;
use crate::error::Result;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config/valvesrv.yaml";

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub devices: DevicesSection,
}

/// Service identity and logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_service_name")]
    pub name: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Log to console instead of rolling files
    #[serde(default = "default_true")]
    pub console: bool,
}

/// Poll scheduler tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// Pacing sleep between loop passes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Settle delay before a write retry
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Widened transaction timeout used for writes
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Commands drained per pass before polling resumes
    #[serde(default = "default_command_burst")]
    pub command_burst: usize,

    /// Attempts per command write
    #[serde(default = "default_write_attempts")]
    pub write_attempts: u32,

    /// Attempts per poll read
    #[serde(default = "default_read_attempts")]
    pub read_attempts: u32,

    /// Exhausted poll cycles before a device is declared offline
    #[serde(default = "default_offline_threshold")]
    pub offline_threshold: u32,

    /// Age after which data counts as stale while polling is active
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
}

/// Device list persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesSection {
    /// JSON file seeded at startup and rewritten on every registry change
    #[serde(default = "default_devices_file")]
    pub file: String,
}

fn default_service_name() -> String {
    "valvesrv".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_true() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_settle_delay_ms() -> u64 {
    50
}
fn default_write_timeout_ms() -> u64 {
    2000
}
fn default_command_burst() -> usize {
    5
}
fn default_write_attempts() -> u32 {
    3
}
fn default_read_attempts() -> u32 {
    2
}
fn default_offline_threshold() -> u32 {
    1
}
fn default_stale_after_ms() -> u64 {
    15_000
}
fn default_devices_file() -> String {
    "devices.json".to_string()
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            console: true,
        }
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            command_burst: default_command_burst(),
            write_attempts: default_write_attempts(),
            read_attempts: default_read_attempts(),
            offline_threshold: default_offline_threshold(),
            stale_after_ms: default_stale_after_ms(),
        }
    }
}

impl Default for DevicesSection {
    fn default() -> Self {
        Self {
            file: default_devices_file(),
        }
    }
}

impl SchedulerSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the YAML file (when present), then
    /// `VALVESRV_*` environment variables (`__` separates nesting).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());

        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed("VALVESRV_").split("__"))
            .extract()?;
        Ok(config)
    }
}
