//! Application configuration loading and validation.
//!
//! A single TOML file describes the logger, the polling cadence, the scrape
//! endpoint and the list of devices. It is loaded once at startup and treated
//! as immutable afterwards.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{
    devices::{DeviceConfig, PollerConfig},
    logger::LoggerConfig,
    server::ServerConfig,
};

pub mod devices;
pub mod logger;
pub mod server;

/// Default location used when no path is given on the command line or in
/// `SHELLY_EXPORTER_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/shelly-exporter/config.toml";

const EARLY_TIMESTAMP: &str = "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z";

/// Timestamp for messages printed before the tracing subscriber exists.
#[doc(hidden)]
pub fn early_timestamp() -> String {
    time::format_description::parse(EARLY_TIMESTAMP)
        .ok()
        .and_then(|format| time::OffsetDateTime::now_utc().format(&format).ok())
        .unwrap_or_default()
}

/// Timestamped console output usable before logging is initialised.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub logger: LoggerConfig,

    #[validate(nested)]
    pub poller: PollerConfig,

    #[validate(nested)]
    pub server: ServerConfig,

    /// Poll targets, in the order they are fetched.
    #[validate(length(min = 1, message = "At least one [[devices]] entry is required"), nested)]
    pub devices: Vec<DeviceConfig>,
}

impl Config {
    /// Locates and loads the configuration file.
    ///
    /// `explicit` comes from `--config` / `SHELLY_EXPORTER_CONFIG`; without it
    /// the default path is tried.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be found, read, parsed or
    /// validated.
    pub fn new(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = Self::resolve_path(explicit)?;
        Self::load(&path)
    }

    fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = explicit {
            print_info!("Using config from command line: {}", path.display());
            return Ok(path.to_path_buf());
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Ok(fallback.to_path_buf());
        }

        Err(ConfigError::NotFound(format!(
            "no --config given and {} does not exist",
            DEFAULT_CONFIG_PATH
        )))
    }

    /// Loads and validates configuration from `path`.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing and validation errors as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_string_lossy().to_string()));
        }

        let config_str = fs::read_to_string(path)?;
        let config = Self::from_toml(&config_str)?;

        print_info!(
            "Successfully loaded config from: {} ({} devices)",
            path.display(),
            config.devices.len()
        );
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(text: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(config)
    }
}
