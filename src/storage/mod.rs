//! Relational storage for accepted samples.
//!
//! The ingestion core needs exactly one operation from storage: append a sample
//! and report success or failure ([`SampleSink`]). The read side (recent rows,
//! range, latest value) serves the query commands and never feeds back into
//! ingestion.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;
use crate::sample::SensorSample;

pub mod mock;
pub mod populate;
pub mod sql;

pub use sql::SqlStore;

/// Append-only destination for accepted samples.
#[async_trait]
pub trait SampleSink: Send {
    /// Persist one sample as a new row.
    async fn append(&mut self, sample: &SensorSample) -> Result<(), StoreError>;

    /// Release connections. Safe to call repeatedly.
    async fn close(&mut self);
}

/// A stored row as returned by [`SqlStore::recent`].
///
/// Serialized with the column names the dashboard front end already consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSample {
    /// Row id
    pub id: i64,
    /// `YYYY-MM-DD HH:MM:SS`
    #[serde(rename = "fecha_hora")]
    pub timestamp: String,
    /// Humidity percentage
    #[serde(rename = "humedad")]
    pub humidity: f64,
    /// Soil status label
    #[serde(rename = "estado_suelo")]
    pub soil_status: String,
}

/// A `(timestamp, humidity)` pair as returned by [`SqlStore::between`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HumidityPoint {
    /// `YYYY-MM-DD HH:MM:SS`
    #[serde(rename = "fecha_hora")]
    pub timestamp: String,
    /// Humidity percentage
    #[serde(rename = "humedad")]
    pub humidity: f64,
}
