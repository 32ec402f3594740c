//! # Configuration Management
//!
//! Centralized configuration for transfer coordinators and the node driver.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`SAVE_RELAY_*`)
//!
//! ## Sizing
//! The default chunk budget (1024 bytes) leaves headroom under the transport's
//! 1170 byte packet limit for the kind tag and transport overhead.

use crate::error::ConfigError;
use crate::transport::MAX_PACKET_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default bytes of blob carried by one Chunk packet
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default upper bound on a reassembled blob (64 MB)
pub const DEFAULT_MAX_BLOB_SIZE: usize = 64 * 1024 * 1024;

/// Default poll cadence, roughly 60 Hz
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RelayConfig {
    /// Chunking and deadline settings shared by every transfer kind
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Poll loop settings
    #[serde(default)]
    pub node: NodeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<Self>(content)?)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(val) = env_parse::<usize>("SAVE_RELAY_CHUNK_SIZE") {
            config.transfer.chunk_size = val;
        }

        if let Some(val) = env_parse::<u64>("SAVE_RELAY_REQUEST_TIMEOUT_MS") {
            config.transfer.request_timeout = Duration::from_millis(val);
        }

        if let Some(val) = env_parse::<u64>("SAVE_RELAY_REASSEMBLY_TIMEOUT_MS") {
            config.transfer.reassembly_timeout = Duration::from_millis(val);
        }

        if let Some(val) = env_parse::<u64>("SAVE_RELAY_TICK_INTERVAL_MS") {
            config.node.tick_interval = Duration::from_millis(val);
        }

        if let Ok(level) = std::env::var("SAVE_RELAY_LOG_LEVEL") {
            config.logging.log_level = level.parse().map_err(|_| {
                ConfigError::Invalid(vec![format!("Invalid log level: {level}")])
            })?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.transfer.validate());
        errors.extend(self.node.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<(), ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}

/// Chunking and deadline settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferConfig {
    /// Blob bytes per Chunk packet
    pub chunk_size: usize,

    /// Largest datagram the transport accepts
    pub max_packet_size: usize,

    /// How long a request waits for its transfer to finish
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// How long a partial transfer may sit without a new packet
    #[serde(with = "duration_serde")]
    pub reassembly_timeout: Duration,

    /// Transfers growing past this are discarded
    pub max_blob_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_packet_size: MAX_PACKET_SIZE,
            request_timeout: Duration::from_secs(30),
            reassembly_timeout: Duration::from_secs(10),
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.chunk_size == 0 {
            errors.push("Chunk size must be greater than 0".to_string());
        } else if self.chunk_size + 1 > self.max_packet_size {
            errors.push(format!(
                "Chunk size {} plus kind tag exceeds max packet size {}",
                self.chunk_size, self.max_packet_size
            ));
        }

        if self.request_timeout.as_millis() < 10 {
            errors.push("Request timeout too short (minimum: 10ms)".to_string());
        } else if self.request_timeout.as_secs() > 600 {
            errors.push("Request timeout too long (maximum: 600s)".to_string());
        }

        if self.reassembly_timeout.as_millis() < 10 {
            errors.push("Reassembly timeout too short (minimum: 10ms)".to_string());
        }

        if self.max_blob_size == 0 {
            errors.push("Max blob size must be greater than 0".to_string());
        }

        errors
    }
}

/// Poll loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Interval between dispatch cycles
    #[serde(with = "duration_serde")]
    pub tick_interval: Duration,

    /// Log a metrics snapshot every N ticks (0 disables)
    pub log_metrics_every_ticks: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            log_metrics_every_ticks: 0,
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.tick_interval.is_zero() {
            errors.push("Tick interval must be greater than 0".to_string());
        } else if self.tick_interval.as_secs() > 1 {
            errors.push("Tick interval too long (maximum: 1s)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Extra `EnvFilter` directives, e.g. `save_relay::protocol=trace`
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("save-relay"),
            log_level: Level::INFO,
            json_format: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if let Some(filter) = &self.filter {
            if filter.trim().is_empty() {
                errors.push("Log filter cannot be blank".to_string());
            }
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
