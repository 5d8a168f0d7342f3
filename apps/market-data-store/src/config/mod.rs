//! Configuration for the market data store.
//!
//! YAML with `${VAR}` / `${VAR:-default}` environment interpolation, parsed
//! and validated before use.
//!
//! # Usage
//!
//! ```rust,ignore
//! use market_data_store::config::load_config;
//!
//! let config = load_config(Some("config.yaml"))?;
//! println!("data directory: {}", config.storage.data_directory);
//! ```

mod observability;
mod storage;

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use observability::{LoggingConfig, ObservabilityConfig};
pub use storage::StorageConfig;

use crate::storage::{Compression, DEFLATE_LEVELS};

/// Highest supported `price_decimals`.
pub const MAX_PRICE_DECIMALS: u32 = 20;

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
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file.
///
/// `path` defaults to `config.yaml`.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string.
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    // An empty document means "all defaults".
    if interpolated.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Replace `${VAR}` and `${VAR:-default}` with environment values.
///
/// Unset or empty variables take the default, or the empty string when no
/// default is given.
#[allow(clippy::expect_used)] // Constant pattern
fn interpolate_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: OnceLock<Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |caps: &Captures<'_>| {
        let default = caps.get(2).map_or("", |m| m.as_str());
        match std::env::var(&caps[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let storage = &config.storage;

    if storage.data_directory.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.data_directory cannot be empty".to_string(),
        ));
    }

    if !(1..=MAX_PRICE_DECIMALS).contains(&storage.price_decimals) {
        return Err(ConfigError::ValidationError(format!(
            "storage.price_decimals must be between 1 and {MAX_PRICE_DECIMALS}"
        )));
    }

    if let Some(level) = storage.compression_level {
        if storage.compression == Compression::Stored {
            return Err(ConfigError::ValidationError(
                "storage.compression_level requires deflated compression".to_string(),
            ));
        }
        if !DEFLATE_LEVELS.contains(&level) {
            return Err(ConfigError::ValidationError(format!(
                "storage.compression_level must be between {} and {}",
                DEFLATE_LEVELS.start(),
                DEFLATE_LEVELS.end()
            )));
        }
    }

    let valid_formats = ["json", "pretty"];
    let format = config.observability.logging.format.as_str();
    if !valid_formats.contains(&format) {
        return Err(ConfigError::ValidationError(format!(
            "observability.logging.format must be one of: {valid_formats:?}"
        )));
    }

    Ok(())
}
