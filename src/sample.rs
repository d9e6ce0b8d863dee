//! Sensor sample data model and soil status classification.

use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Humidity below this percentage is reported as [`SoilStatus::Low`].
pub const LOW_HUMIDITY_THRESHOLD: f64 = 30.0;

/// Timestamp format used in the store and on the query boundary.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Two-valued soil status derived from humidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoilStatus {
    /// Humidity under the threshold; the device shows a red LED.
    #[serde(rename = "Baja (LED rojo)")]
    Low,
    /// Humidity at or above the threshold; the device shows a green LED.
    #[serde(rename = "Adecuada (LED verde)")]
    Adequate,
}

impl SoilStatus {
    /// Classify a humidity reading.
    ///
    /// Total over finite values: negative readings and readings above 100 are
    /// classified like any other value, not clamped or rejected.
    pub fn classify(humidity_percent: f64) -> Self {
        if humidity_percent < LOW_HUMIDITY_THRESHOLD {
            SoilStatus::Low
        } else {
            SoilStatus::Adequate
        }
    }

    /// Label persisted in the store.
    pub fn label(&self) -> &'static str {
        match self {
            SoilStatus::Low => "Baja (LED rojo)",
            SoilStatus::Adequate => "Adecuada (LED verde)",
        }
    }
}

impl fmt::Display for SoilStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Shorthand for [`SoilStatus::classify`].
pub fn classify(humidity_percent: f64) -> SoilStatus {
    SoilStatus::classify(humidity_percent)
}

/// One accepted reading, ready to be appended to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSample {
    /// Local time the scheduler accepted the reading, second precision.
    pub timestamp: NaiveDateTime,
    /// Humidity as parsed from the sensor line.
    pub humidity_percent: f64,
    /// Status derived from `humidity_percent`.
    pub soil_status: SoilStatus,
}

impl SensorSample {
    /// Build a sample accepted at `accepted_at`, truncating to whole seconds.
    pub fn accept(accepted_at: DateTime<Local>, humidity_percent: f64) -> Self {
        Self::at(accepted_at.naive_local(), humidity_percent)
    }

    /// Build a sample at a given naive local timestamp, truncating to whole seconds.
    pub fn at(timestamp: NaiveDateTime, humidity_percent: f64) -> Self {
        let timestamp = timestamp.with_nanosecond(0).unwrap_or(timestamp);
        Self {
            timestamp,
            humidity_percent,
            soil_status: SoilStatus::classify(humidity_percent),
        }
    }

    /// Timestamp rendered as `YYYY-MM-DD HH:MM:SS`.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}
