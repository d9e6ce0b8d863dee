//! Error types for the ingestion pipeline.
//!
//! Every failure the pipeline can observe is named here, using `thiserror`.
//! The split follows how the scheduler reacts to each one:
//!
//! - **`IngestError`**: top-level startup and wiring errors. `DeviceNotFound` and
//!   `Session(SessionError::Open)` are fatal at startup; everything else in this enum
//!   is a configuration or environment problem surfaced before the loop starts.
//! - **`SessionError`**: serial link faults. `Open` is fatal at startup, the rest are
//!   recoverable and drive the reopen policy.
//! - **`ParseError`**: a single bad line. Logged and discarded.
//! - **`StoreError`**: storage failures. Write failures are logged, backed off and the
//!   sample is dropped.
//!
//! There is no timeout variant: "no data yet" is a normal read outcome
//! (`LineRead::Idle`).

use thiserror::Error;

/// Convenience alias for results using the top-level error type.
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Top-level error for startup, configuration and wiring.
#[derive(Error, Debug)]
pub enum IngestError {
    /// No enumerated serial device matched any of the configured hints.
    #[error("No serial device matched hints {hints:?}")]
    DeviceNotFound {
        /// Hints that were tried, lower-cased.
        hints: Vec<String>,
    },

    /// The host serial port list could not be read.
    #[error("Failed to enumerate serial ports: {0}")]
    Enumeration(#[from] serialport::Error),

    /// Serial session failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Generic I/O failure outside the serial session.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for IngestError {
    fn from(err: figment::Error) -> Self {
        IngestError::Config(Box::new(err))
    }
}

/// Serial session failures.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The device path could not be opened at startup.
    #[error("Failed to open serial port {path}: {source}")]
    Open {
        /// Device path.
        path: String,
        /// Underlying serial error.
        #[source]
        source: serialport::Error,
    },

    /// An I/O error occurred while reading from an open port.
    #[error("Read error on serial port {path}: {source}")]
    Read {
        /// Device path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The device closed the stream (typically unplugged).
    #[error("Serial port {path} closed the connection")]
    Disconnected {
        /// Device path.
        path: String,
    },

    /// A read was attempted while no port handle is held.
    #[error("Serial port {path} is not open")]
    NotOpen {
        /// Device path.
        path: String,
    },

    /// The single reopen attempt failed.
    #[error("Failed to reopen serial port {path}: {source}")]
    Reopen {
        /// Device path.
        path: String,
        /// Underlying serial error.
        #[source]
        source: serialport::Error,
    },
}

impl SessionError {
    /// Device path the error refers to.
    pub fn path(&self) -> &str {
        match self {
            SessionError::Open { path, .. }
            | SessionError::Read { path, .. }
            | SessionError::Disconnected { path }
            | SessionError::NotOpen { path }
            | SessionError::Reopen { path, .. } => path,
        }
    }
}

/// A sensor line that does not carry a usable humidity value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing left after stripping the label, percent signs and whitespace.
    #[error("Empty reading after normalization")]
    Empty,

    /// The remaining text is not a decimal number.
    #[error("Not a decimal number: '{0}'")]
    NotANumber(String),

    /// The number parsed but is infinite or NaN.
    #[error("Non-finite reading: '{0}'")]
    NonFinite(String),
}

/// Storage failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not connect to the database.
    #[error("Failed to connect to store: {0}")]
    Connect(#[source] sqlx::Error),

    /// A single append failed.
    #[error("Failed to write sample: {0}")]
    Write(#[source] sqlx::Error),

    /// A read query failed.
    #[error("Query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Schema creation failed.
    #[error("Failed to create schema: {0}")]
    Schema(#[source] sqlx::Error),

    /// The URL scheme is neither MySQL nor SQLite.
    #[error("Unsupported store URL '{0}': expected mysql:// or sqlite:")]
    UnsupportedUrl(String),

    /// Range bounds are not `YYYY-MM-DD HH:MM:SS` timestamps.
    #[error("Invalid range bound '{0}': expected YYYY-MM-DD HH:MM:SS")]
    InvalidRange(String),

    /// A generated day would fall past the last representable date.
    #[error("{days} days from {start} run past the last representable date")]
    DateOutOfRange {
        /// First day requested
        start: chrono::NaiveDate,
        /// Number of days requested
        days: u32,
    },
}
