//! # Soil Ingest Core Library
//!
//! This crate reads humidity lines from a soil sensor on a serial port,
//! classifies each reading, throttles writes to a fixed interval and appends
//! the accepted samples to a relational store. The binary (`main.rs`) wires
//! these pieces together behind a small CLI; the library keeps them testable
//! without hardware or a database server.
//!
//! ## Crate Structure
//!
//! - **`config`**: Layered configuration (defaults, TOML file, `SOIL_INGEST_*`
//!   environment) loaded with `figment`. See `config::IngestConfig`.
//! - **`error`**: `IngestError` and the per-stage `SessionError`, `ParseError`
//!   and `StoreError` enums.
//! - **`hardware`**: Serial port discovery (`locator`), the line-oriented
//!   `SerialSession`, and a scripted mock line source.
//! - **`parser`**: Turns a raw sensor line into a humidity value.
//! - **`sample`**: `SensorSample` and the soil status classifier.
//! - **`ingest`**: The ingestion state machine, its rate window, the
//!   startup sequence and stop-signal forwarding.
//! - **`storage`**: `SampleSink` and the SQL store (MySQL or SQLite through
//!   `sqlx`), read queries and the synthetic data populator.
//! - **`logging`**: `tracing-subscriber` setup.

pub mod config;
pub mod error;
pub mod hardware;
pub mod ingest;
pub mod logging;
pub mod parser;
pub mod sample;
pub mod storage;

pub use error::{IngestError, IngestResult};
pub use ingest::{run_ingestion, IngestStats};
pub use sample::{SensorSample, SoilStatus};
