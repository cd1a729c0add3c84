//! Application configuration.

use crate::error::{AppError, AppResult};
use feedlink_conn::LifecycleConfig;
use feedlink_core::BackoffParameters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Connection lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Backoff delay for the first retry (ms). Default: 1,000.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Backoff growth factor per consecutive failure. Default: 2.0.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Cap on the backoff delay (ms). Default: 60,000.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter half-width; 0.2 picks uniformly in [0.8x, 1.2x]. Default: 0.2.
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
    /// Retry ceiling; 0 retries forever. Default: 0.
    #[serde(default)]
    pub max_consecutive_failures: u32,
    /// Interval between health probes (ms). Default: 30,000.
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Bound on a single probe (ms). Default: 5,000.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Consecutive failed probes before a forced reconnect. Default: 3.
    #[serde(default = "default_max_probe_failures")]
    pub max_probe_failures: u32,
    /// Bound on waiting for background tasks at shutdown (ms). Default: 5,000.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter_ratio() -> f64 {
    0.2
}

fn default_probe_interval_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_max_probe_failures() -> u32 {
    3
}

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ratio: default_jitter_ratio(),
            max_consecutive_failures: 0,
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            max_probe_failures: default_max_probe_failures(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

/// Status-writer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Buffered status updates before overflow drops. Default: 64.
    #[serde(default = "default_status_buffer")]
    pub buffer: usize,
}

fn default_status_buffer() -> usize {
    64
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            buffer: default_status_buffer(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Service name used in the status hash and metric labels.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Connection lifecycle tuning.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Status-writer tuning.
    #[serde(default)]
    pub status: StatusConfig,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_service_name() -> String {
    "kalshi_ws".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            service_name: default_service_name(),
            connection: ConnectionConfig::default(),
            status: StatusConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the given path, falling back to defaults when the
    /// file does not exist.
    pub fn load(config_path: &str) -> AppResult<Self> {
        if Path::new(config_path).exists() {
            Self::from_file(config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Lifecycle configuration derived from the connection section.
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            backoff: BackoffParameters {
                initial_delay: Duration::from_millis(self.connection.initial_delay_ms),
                multiplier: self.connection.multiplier,
                max_delay: Duration::from_millis(self.connection.max_delay_ms),
                jitter_ratio: self.connection.jitter_ratio,
                max_consecutive_failures: self.connection.max_consecutive_failures,
            },
            probe_interval: Duration::from_millis(self.connection.probe_interval_ms),
            probe_timeout: Duration::from_millis(self.connection.probe_timeout_ms),
            max_probe_failures: self.connection.max_probe_failures,
            shutdown_timeout: Duration::from_millis(self.connection.shutdown_timeout_ms),
        }
    }
}
