//! Configuration for the quote engine.
//!
//! Provides configuration loading from YAML with serde defaults and a
//! validation pass.
//!
//! # Usage
//!
//! ```rust,ignore
//! use quote_engine::config::{EngineConfig, load_config};
//!
//! // Defaults only
//! let config = EngineConfig::default();
//!
//! // From a YAML file
//! let config = load_config(Some("quote-engine.yaml"))?;
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Local database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Market clock configuration.
    #[serde(default)]
    pub clock: ClockConfig,
    /// Per-symbol refresh loop configuration.
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Symbol directory cache configuration.
    #[serde(default)]
    pub directory: DirectoryConfig,
}

impl EngineConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` on out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.is_empty() {
            return Err(ConfigError::ValidationError(
                "database.path must not be empty".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.clock.tick_ms == 0 {
            return Err(ConfigError::ValidationError(
                "clock.tick_ms must be at least 1".to_string(),
            ));
        }
        if self.clock.market_timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "clock.market_timezone '{}' is not a known timezone",
                self.clock.market_timezone
            )));
        }
        if self.refresh.cadence_ms == 0 {
            return Err(ConfigError::ValidationError(
                "refresh.cadence_ms must be at least 1".to_string(),
            ));
        }
        if self.refresh.max_fetch_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "refresh.max_fetch_attempts must be at least 1".to_string(),
            ));
        }
        if self.directory.refresh_after_days == 0 {
            return Err(ConfigError::ValidationError(
                "directory.refresh_after_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Local database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: String,
    /// Maximum pooled connections. One pool is shared process-wide.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Market clock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Clock update period in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// IANA name of the market timezone.
    #[serde(default = "default_market_timezone")]
    pub market_timezone: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            market_timezone: default_market_timezone(),
        }
    }
}

/// Per-symbol refresh loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Cycle cadence in milliseconds while active.
    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,
    /// Fetch attempts per cycle before the engine halts.
    #[serde(default = "default_max_fetch_attempts")]
    pub max_fetch_attempts: u32,
    /// Pause between fetch attempts in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Backoff multiplier between attempts (1.0 = fixed interval).
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            cadence_ms: default_cadence_ms(),
            max_fetch_attempts: default_max_fetch_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_multiplier: default_retry_multiplier(),
        }
    }
}

/// Symbol directory cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Age of the last directory write after which it is refetched.
    #[serde(default = "default_refresh_after_days")]
    pub refresh_after_days: u32,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            refresh_after_days: default_refresh_after_days(),
        }
    }
}

fn default_database_path() -> String {
    "stocks.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_tick_ms() -> u64 {
    100
}

fn default_market_timezone() -> String {
    "America/New_York".to_string()
}

const fn default_cadence_ms() -> u64 {
    1000
}

const fn default_max_fetch_attempts() -> u32 {
    3
}

const fn default_retry_backoff_ms() -> u64 {
    500
}

const fn default_retry_multiplier() -> f64 {
    1.0
}

const fn default_refresh_after_days() -> u32 {
    7
}

/// Load configuration from a YAML file, or defaults when `path` is `None`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<EngineConfig, ConfigError> {
    let config = match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p).map_err(|source| ConfigError::ReadError {
                path: p.to_string(),
                source,
            })?;
            serde_yaml_bw::from_str(&raw)?
        }
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}
