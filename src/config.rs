// Configuration File Support
//
// This module provides configuration file parsing for the inference
// gatekeeper. Supports TOML format with environment variable overrides.
// Configuration files are loaded from the XDG config directory:
// ~/.config/inference-gatekeeper/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::time::Duration;

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Retry delay must be a positive, finite number of seconds
    #[error("retry_delay_secs must be positive and finite, got {0}")]
    InvalidRetryDelay(f64),

    /// Unknown log level
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format
    #[error("Invalid log format: {0}. Must be one of: json, pretty, compact")]
    InvalidLogFormat(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Admission control configuration
    pub admission: AdmissionConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Admission controller configuration
///
/// An immutable snapshot consumed once at controller construction. Caps of
/// zero are valid and mean "never admit" while the limiter is enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Enable admission control
    pub enabled: bool,

    /// Maximum concurrent in-flight requests to the model API
    pub max_concurrent_requests: usize,

    /// Maximum requests granted in any trailing 60 seconds
    pub max_requests_per_minute: usize,

    /// Maximum requests granted in any trailing hour
    pub max_requests_per_hour: usize,

    /// How long a caller may queue for admission, in seconds
    pub queue_timeout_secs: u64,

    /// Delay between rate-window polls while queued, in seconds
    pub retry_delay_secs: f64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent_requests: 3,
            max_requests_per_minute: 30,
            max_requests_per_hour: 500,
            queue_timeout_secs: 30,
            retry_delay_secs: 1.0,
        }
    }
}

impl AdmissionConfig {
    /// Configuration with admission control switched off (for testing)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Queue timeout as a [`Duration`]
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    /// Retry delay as a [`Duration`]
    ///
    /// Saturates for values a `Duration` cannot represent; [`validate`]
    /// rejects such configurations up front.
    ///
    /// [`validate`]: AdmissionConfig::validate
    pub fn retry_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_delay_secs).unwrap_or(Duration::MAX)
    }

    /// Validate the admission configuration
    ///
    /// # Errors
    ///
    /// Returns an error if `retry_delay_secs` is not positive, finite, and
    /// representable as a `Duration`.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.retry_delay_secs > 0.0)
            || Duration::try_from_secs_f64(self.retry_delay_secs).is_err()
        {
            return Err(ConfigError::InvalidRetryDelay(self.retry_delay_secs));
        }
        Ok(())
    }
}

impl GatekeeperConfig {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default().apply_env_overrides());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file from {:?}", path))?;

        let config: GatekeeperConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file from {:?}", path))?;

        // Apply environment variable overrides
        let config = config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/inference-gatekeeper/config.toml` on Linux/Mac
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) =
            directories::ProjectDirs::from("io", "gatekeeper", "inference-gatekeeper")
        {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("inference-gatekeeper")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - GATEKEEPER_LOG_LEVEL
    /// - GATEKEEPER_LOG_FORMAT
    /// - GATEKEEPER_ENABLED
    /// - GATEKEEPER_MAX_CONCURRENT
    /// - GATEKEEPER_MAX_PER_MINUTE
    /// - GATEKEEPER_MAX_PER_HOUR
    /// - GATEKEEPER_QUEUE_TIMEOUT_SECS
    /// - GATEKEEPER_RETRY_DELAY_SECS
    fn apply_env_overrides(mut self) -> Self {
        // Logging overrides
        if let Ok(level) = std::env::var("GATEKEEPER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("GATEKEEPER_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Admission overrides
        if let Ok(enabled) = std::env::var("GATEKEEPER_ENABLED") {
            self.admission.enabled = enabled.parse().unwrap_or(self.admission.enabled);
        }
        if let Ok(max) = std::env::var("GATEKEEPER_MAX_CONCURRENT") {
            if let Ok(max) = max.parse::<usize>() {
                self.admission.max_concurrent_requests = max;
            }
        }
        if let Ok(max) = std::env::var("GATEKEEPER_MAX_PER_MINUTE") {
            if let Ok(max) = max.parse::<usize>() {
                self.admission.max_requests_per_minute = max;
            }
        }
        if let Ok(max) = std::env::var("GATEKEEPER_MAX_PER_HOUR") {
            if let Ok(max) = max.parse::<usize>() {
                self.admission.max_requests_per_hour = max;
            }
        }
        if let Ok(timeout) = std::env::var("GATEKEEPER_QUEUE_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.admission.queue_timeout_secs = timeout;
            }
        }
        if let Ok(delay) = std::env::var("GATEKEEPER_RETRY_DELAY_SECS") {
            if let Ok(delay) = delay.parse::<f64>() {
                if delay > 0.0 && Duration::try_from_secs_f64(delay).is_ok() {
                    self.admission.retry_delay_secs = delay;
                }
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(ConfigError::InvalidLogLevel(self.logging.level.clone())),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => return Err(ConfigError::InvalidLogFormat(self.logging.format.clone())),
        }

        self.admission.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = GatekeeperConfig::default();
        assert!(config.admission.enabled);
        assert_eq!(config.admission.max_concurrent_requests, 3);
        assert_eq!(config.admission.max_requests_per_minute, 30);
        assert_eq!(config.admission.max_requests_per_hour, 500);
        assert_eq!(config.admission.queue_timeout_secs, 30);
        assert_eq!(config.admission.retry_delay_secs, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_config() {
        let config = AdmissionConfig::disabled();
        assert!(!config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
            [logging]
            level = "debug"
            format = "pretty"

            [admission]
            enabled = true
            max_concurrent_requests = 5
            max_requests_per_minute = 60
            max_requests_per_hour = 1000
            queue_timeout_secs = 15
            retry_delay_secs = 0.5
        "#;
        fs::write(temp_file.path(), toml_content).unwrap();

        let config = GatekeeperConfig::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.admission.max_concurrent_requests, 5);
        assert_eq!(config.admission.max_requests_per_minute, 60);
        assert_eq!(config.admission.queue_timeout_secs, 15);
        assert_eq!(config.admission.retry_delay_secs, 0.5);
    }

    #[test]
    fn test_load_partial_toml_applies_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(
            temp_file.path(),
            r#"
            [admission]
            max_concurrent_requests = 1
        "#,
        )
        .unwrap();

        let config = GatekeeperConfig::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.admission.max_concurrent_requests, 1);
        assert_eq!(config.admission.max_requests_per_minute, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "this is not [valid toml").unwrap();

        let result = GatekeeperConfig::load_from_path(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_returns_defaults() {
        let config = GatekeeperConfig::load_from_path("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.admission, AdmissionConfig::default());
    }

    #[test]
    fn test_zero_caps_are_valid() {
        let config = AdmissionConfig {
            max_concurrent_requests: 0,
            max_requests_per_minute: 0,
            max_requests_per_hour: 0,
            ..AdmissionConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_retry_delay_rejected() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e30] {
            let config = AdmissionConfig {
                retry_delay_secs: bad,
                ..AdmissionConfig::default()
            };
            assert!(config.validate().is_err(), "expected rejection of {}", bad);
        }
    }

    #[test]
    fn test_retry_delay_accessor_never_panics() {
        // Unvalidated configs with absurd delays saturate instead of
        // panicking inside Duration conversion.
        for secs in [1e30, f64::INFINITY, f64::MAX] {
            let config = AdmissionConfig {
                retry_delay_secs: secs,
                ..AdmissionConfig::default()
            };
            assert_eq!(config.retry_delay(), Duration::MAX);
        }
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let config = GatekeeperConfig {
            logging: LoggingConfig {
                level: "loud".to_string(),
                ..LoggingConfig::default()
            },
            ..GatekeeperConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_accessors() {
        let config = AdmissionConfig::default();
        assert_eq!(config.queue_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
    }
}
