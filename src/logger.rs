//! Global `tracing` subscriber setup.
//!
//! `LoggerManager` validates the `[logger]` section and installs a registry
//! with a console layer and/or a systemd journald layer. `RUST_LOG` overrides
//! the configured level for every layer.

use std::{fmt as std_fmt, io};

use thiserror::Error;
use time::{
    format_description::{well_known::Rfc3339, OwnedFormatItem},
    OffsetDateTime,
};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, format::Writer, time::FormatTime},
    prelude::*,
    EnvFilter, Layer, Registry,
};
use validator::{Validate, ValidationErrors};

use crate::{
    config::logger::{ConsoleConfig, LogFormat, LoggerConfig, TimestampFormat},
    print_info, print_warn,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Logger initialization error: {0}")]
    InitializationError(String),

    #[error("Logger configuration validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("No logging layers were configured or successfully initialized")]
    NoLayersConfigured,

    #[error("Failed to initialize journald logger while console output is also enabled; check the [logger] section")]
    JournaldFailedWithConsoleEnabled,
}

/// Renders event timestamps according to `TimestampFormat`.
enum EventTimer {
    Rfc3339,
    Unix,
    Custom(OwnedFormatItem),
}

impl EventTimer {
    fn from_config(format: &TimestampFormat) -> Result<Self, LoggerError> {
        Ok(match format {
            TimestampFormat::Rfc3339 => EventTimer::Rfc3339,
            TimestampFormat::Unix => EventTimer::Unix,
            TimestampFormat::Custom(description) => EventTimer::Custom(
                time::format_description::parse_owned::<1>(description)
                    .map_err(|e| LoggerError::InitializationError(e.to_string()))?,
            ),
        })
    }
}

impl FormatTime for EventTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std_fmt::Result {
        let now = OffsetDateTime::now_utc();
        match self {
            EventTimer::Rfc3339 => {
                let stamp = now.format(&Rfc3339).map_err(|_| std_fmt::Error)?;
                write!(w, "{}", stamp)
            }
            EventTimer::Unix => write!(w, "{}", now.unix_timestamp()),
            EventTimer::Custom(items) => {
                let stamp = now.format(items).map_err(|_| std_fmt::Error)?;
                write!(w, "{}", stamp)
            }
        }
    }
}

pub struct LoggerManager {
    config: LoggerConfig,
}

impl LoggerManager {
    /// # Errors
    ///
    /// Returns `LoggerError::ValidationError` if the configuration is invalid.
    pub fn new(config: LoggerConfig) -> Result<Self, LoggerError> {
        config.validate()?;
        Ok(LoggerManager { config })
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.config.level))
    }

    /// Installs the global subscriber. Must be called once, before the
    /// poller and the server start.
    ///
    /// # Errors
    ///
    /// Fails when no layer could be built, when journald is the only failing
    /// output next to an enabled console, or when a global subscriber is
    /// already installed.
    pub fn init(&mut self) -> Result<(), LoggerError> {
        let mut layers: Vec<BoxedLayer> = Vec::new();

        if let Some(console) = self.config.console.as_ref().filter(|c| c.enabled) {
            layers.push(self.console_layer(console)?);
        }

        if let Some(journald) = self.config.journald.as_ref().filter(|j| j.enabled) {
            match self.journald_layer(&journald.identifier) {
                Ok(layer) => {
                    layers.push(layer);
                    print_info!(
                        "Systemd journald logger initialized with identifier: {}",
                        journald.identifier
                    );
                }
                Err(e) => {
                    print_warn!("Failed to initialize systemd journald logger: {}", e);
                    if self.config.console.as_ref().is_some_and(|c| c.enabled) {
                        return Err(LoggerError::JournaldFailedWithConsoleEnabled);
                    }
                }
            }
        }

        if layers.is_empty() {
            print_warn!("No logging layers were initialized. Please check your configuration.");
            return Err(LoggerError::NoLayersConfigured);
        }

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(|e| LoggerError::InitializationError(e.to_string()))
    }

    fn console_layer(&self, config: &ConsoleConfig) -> Result<BoxedLayer, LoggerError> {
        let span_events = if config.show_spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_span_events(span_events)
            .with_ansi(config.ansi_colors)
            .with_timer(EventTimer::from_config(&self.config.timestamp_format)?)
            .with_writer(io::stdout);

        let filter = self.filter();
        Ok(match config.format {
            LogFormat::Json => base.json().with_filter(filter).boxed(),
            LogFormat::Pretty => base.pretty().with_filter(filter).boxed(),
            LogFormat::Compact => base.compact().with_filter(filter).boxed(),
        })
    }

    fn journald_layer(&self, identifier: &str) -> Result<BoxedLayer, LoggerError> {
        let layer = tracing_journald::layer()?.with_syslog_identifier(identifier.to_string());
        Ok(layer.with_filter(self.filter()).boxed())
    }
}
