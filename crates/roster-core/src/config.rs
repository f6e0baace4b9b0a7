//! Engine configuration.
//!
//! Provides configuration file support via `roster.toml`, environment
//! variables, and runtime overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Runtime overrides (builder methods, CLI flags)
//! 2. Environment variables (`ROSTER_<SECTION>__<KEY>`)
//! 3. Configuration file (`roster.toml`)
//! 4. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::retry::RetryConfig;

/// Largest fetch window the engine will request in one call.
pub const MAX_WINDOW_SIZE: usize = 10_000;

/// Largest page window a list may show.
pub const MAX_VISIBLE_PAGES: usize = 99;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

/// List view section: debounce and local pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Delay before raw search text is committed, in milliseconds.
    pub debounce_ms: u64,
    /// Initial number of records per visible page.
    pub page_size: usize,
    /// Number of page buttons in the page window (odd, at least 3).
    pub max_visible_pages: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            page_size: 10,
            max_visible_pages: 5,
        }
    }
}

/// Remote fetch section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of records requested per fetch.
    pub window_size: usize,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Automatic retries for transient failures before the error is surfaced.
    pub max_retries: u32,
    /// Delay before the first automatic retry, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound for the backoff delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            window_size: 1000,
            timeout_secs: 30,
            max_retries: 2,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
        }
    }
}

impl FetchConfig {
    /// Builds the backoff policy used for automatic retries.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
            ..RetryConfig::default()
        }
    }

    /// Returns the request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
    /// Log format: text or json.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Main engine configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// List view configuration.
    pub list: ListConfig,
    /// Fetch configuration.
    pub fetch: FetchConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Loads configuration from default sources.
    ///
    /// Priority: defaults < `roster.toml` < environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("roster.toml")
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ROSTER_").split("__"))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.list.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "list.page_size".to_string(),
                message: "value must be at least 1".to_string(),
            });
        }

        let visible = self.list.max_visible_pages;
        if !(3..=MAX_VISIBLE_PAGES).contains(&visible) || visible % 2 == 0 {
            return Err(ConfigError::InvalidValue {
                key: "list.max_visible_pages".to_string(),
                message: format!("value {visible} must be odd and in [3, {MAX_VISIBLE_PAGES}]"),
            });
        }

        if self.fetch.window_size == 0 || self.fetch.window_size > MAX_WINDOW_SIZE {
            return Err(ConfigError::InvalidValue {
                key: "fetch.window_size".to_string(),
                message: format!(
                    "value {} is out of range [1, {MAX_WINDOW_SIZE}]",
                    self.fetch.window_size
                ),
            });
        }

        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fetch.timeout_secs".to_string(),
                message: "value must be at least 1".to_string(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                message: format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                message: format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        Ok(())
    }

    /// Returns the debounce delay as a `Duration`.
    #[must_use]
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.list.debounce_ms)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
