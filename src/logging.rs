//! Logging setup.
//!
//! Everything logs through `tracing`. The `[application]` section chooses the
//! level and one of three layouts. When `RUST_LOG` is set it replaces the
//! level filter entirely, e.g. `RUST_LOG=soil_ingest=debug,sqlx=warn`.
//!
//! # Example
//! ```no_run
//! use soil_ingest::{config::IngestConfig, logging};
//! use tracing::info;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IngestConfig::load()?;
//! logging::init_from_config(&config)?;
//! info!(port = "/dev/ttyACM0", "Sensor session opened");
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line with colors, for a terminal
    #[default]
    Pretty,
    /// One line per event without colors, for service logs
    Compact,
    /// Newline-delimited JSON
    Json,
}

impl FromStr for LogFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(IngestError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: pretty, compact, json",
                s
            ))),
        }
    }
}

/// Resolved logging options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Default level when `RUST_LOG` is unset
    pub level: Level,
    /// Output layout
    pub format: LogFormat,
    /// Attach source file and line to every event
    pub source_location: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            source_location: false,
        }
    }
}

impl LogSettings {
    /// Read level and format from the `[application]` section.
    pub fn from_config(config: &IngestConfig) -> IngestResult<Self> {
        let raw_level = config.application.log_level.trim();
        let level = Level::from_str(raw_level).map_err(|_| {
            IngestError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: trace, debug, info, warn, error",
                raw_level
            ))
        })?;

        Ok(Self {
            level,
            format: config.application.log_format.parse()?,
            ..Self::default()
        })
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()))
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_file(self.source_location)
            .with_line_number(self.source_location);

        match self.format {
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Compact => base.compact().with_ansi(false).boxed(),
            LogFormat::Json => base.json().boxed(),
        }
    }
}

/// Install the global subscriber described by `config`.
pub fn init_from_config(config: &IngestConfig) -> IngestResult<()> {
    init(&LogSettings::from_config(config)?)
}

/// Install the global subscriber.
///
/// A subscriber that is already installed (a second call, or a test harness)
/// is left in place and `Ok(())` is returned.
pub fn init(settings: &LogSettings) -> IngestResult<()> {
    tracing_subscriber::registry()
        .with(settings.layer().with_filter(settings.filter()))
        .try_init()
        .or_else(|err| {
            if tracing::dispatcher::has_been_set() {
                Ok(())
            } else {
                Err(IngestError::Configuration(format!(
                    "Failed to initialize logging: {}",
                    err
                )))
            }
        })
}
