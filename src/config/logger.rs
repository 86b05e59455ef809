//! Logging configuration.
//!
//! Controls the global level, timestamp rendering and which outputs (console,
//! systemd journald) receive events. Validation runs before the subscriber is
//! installed so a bad `[logger]` section fails startup with a readable message.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Console output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Timestamp rendering for console events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    #[default]
    Rfc3339,
    Unix,
    /// A `time` crate format description, e.g. `"[hour]:[minute]:[second]"`.
    Custom(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggerConfig {
    /// trace, debug, info, warn or error (case-insensitive).
    /// `RUST_LOG`, when set, takes precedence.
    #[validate(custom(function = "validate_log_level"))]
    pub level: String,

    #[validate(nested)]
    pub console: Option<ConsoleConfig>,

    #[validate(nested)]
    pub journald: Option<JournaldConfig>,

    #[validate(custom(function = "validate_timestamp_format"))]
    pub timestamp_format: TimestampFormat,
}

fn validate_timestamp_format(format: &TimestampFormat) -> Result<(), ValidationError> {
    let TimestampFormat::Custom(description) = format else {
        return Ok(());
    };
    if description.is_empty() {
        let mut err = ValidationError::new("invalid_timestamp_format");
        err.message = Some("Custom timestamp format cannot be empty".into());
        return Err(err);
    }
    if time::format_description::parse(description).is_err() {
        let mut err = ValidationError::new("invalid_timestamp_format");
        err.message = Some(format!("Unparseable timestamp format: {}", description).into());
        return Err(err);
    }
    Ok(())
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_log_level");
            err.message = Some(format!("Invalid log level: {}", level).into());
            Err(err)
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: "info".to_string(),
            timestamp_format: TimestampFormat::default(),
            console: Some(ConsoleConfig::default()),
            journald: Some(JournaldConfig::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    /// Include the module path of each event.
    pub show_target: bool,
    pub show_thread_ids: bool,
    /// Emit an event when a span closes, with its duration.
    pub show_spans: bool,
    pub ansi_colors: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            enabled: true,
            format: LogFormat::default(),
            show_target: false,
            show_thread_ids: false,
            show_spans: false,
            ansi_colors: true,
        }
    }
}

/// systemd journald output (Linux only).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JournaldConfig {
    #[serde(default)]
    pub enabled: bool,

    /// `SYSLOG_IDENTIFIER` attached to every entry.
    #[validate(length(min = 1))]
    pub identifier: String,
}

impl Default for JournaldConfig {
    fn default() -> Self {
        JournaldConfig {
            enabled: false,
            identifier: "shelly-exporter".to_string(),
        }
    }
}
