//! Configuration loading for Pulse.
//!
//! Configuration is loaded from a TOML file (default: `pulse.toml`). Every
//! section and every key is optional.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use pulse_core::{FlushPolicy, RetryPolicy};

use crate::delivery::DeliveryConfig;
use crate::profile::StaticProfile;

/// Root configuration for a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Collector connection.
    pub collector: CollectorConfig,
    /// Batching thresholds.
    pub queue: QueueConfig,
    /// Retry policy for server errors.
    pub retry: RetryConfig,
    /// Fixed profile attributes.
    pub profile: StaticProfile,
}

/// Collector connection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Host, optionally with port (default: 127.0.0.1:8000).
    #[serde(default = "default_host")]
    pub host: String,
    /// Use HTTPS (default: false).
    #[serde(default)]
    pub use_https: bool,
    /// User identity. Events are dropped until one is set.
    #[serde(default)]
    pub identity: Option<String>,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Reachability probe timeout in seconds (default: 5).
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

/// Batching configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Events that force a flush (default: 10).
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    /// Age of the oldest event that forces a flush, in seconds (default: 10).
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// Expiry check cadence in seconds (default: 1).
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Extra attempts after a server error (default: 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between attempts in seconds (default: 2).
    #[serde(default = "default_retry_delay_secs")]
    pub delay_secs: u64,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_max_events() -> usize {
    pulse_core::DEFAULT_MAX_EVENTS
}

fn default_max_age_secs() -> u64 {
    pulse_core::DEFAULT_MAX_AGE.as_secs()
}

fn default_check_interval_secs() -> u64 {
    pulse_core::DEFAULT_CHECK_INTERVAL.as_secs()
}

fn default_max_retries() -> u32 {
    pulse_core::DEFAULT_MAX_RETRIES
}

fn default_retry_delay_secs() -> u64 {
    pulse_core::DEFAULT_RETRY_DELAY.as_secs()
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            use_https: false,
            identity: None,
            request_timeout_secs: default_request_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            max_age_secs: default_max_age_secs(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_secs: default_retry_delay_secs(),
        }
    }
}

impl PipelineConfig {
    /// Configuration for a collector host with every other value defaulted.
    pub fn for_host(host: &str, use_https: bool) -> Self {
        let mut config = Self::default();
        config.collector.host = host.to_string();
        config.collector.use_https = use_https;
        config
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if pulse_core::clean_host(&self.collector.host).is_empty() {
            return Err(ConfigError::Invalid("collector.host is empty".into()));
        }
        if self.queue.max_events == 0 {
            return Err(ConfigError::Invalid("queue.max_events must be at least 1".into()));
        }
        if self.queue.check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "queue.check_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Batching thresholds.
    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy::default()
            .with_max_events(self.queue.max_events)
            .with_max_age(Duration::from_secs(self.queue.max_age_secs))
            .with_check_interval(Duration::from_secs(self.queue.check_interval_secs))
    }

    /// Retry policy for server errors.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            delay: Duration::from_secs(self.retry.delay_secs),
        }
    }

    /// Delivery settings derived from the collector and retry sections.
    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig::new(&self.collector.host, self.collector.use_https)
            .with_request_timeout(Duration::from_secs(self.collector.request_timeout_secs))
            .with_retry(self.retry_policy())
    }

    /// Probe timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.collector.probe_timeout_secs)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
