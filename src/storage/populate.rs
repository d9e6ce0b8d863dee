//! Synthetic sample generation for dashboard development.
//!
//! Writes `per_day` rows for each of `days` consecutive days starting at
//! `start`, at random times of day, with humidity uniform in `[10, 60)`
//! rounded to two decimals. Not used by the ingestion loop.

use chrono::{Days, NaiveDate, NaiveTime};
use rand::Rng;
use tracing::info;

use super::SampleSink;
use crate::error::StoreError;
use crate::sample::SensorSample;

/// Lower bound of generated humidity (inclusive)
pub const MIN_SYNTHETIC_HUMIDITY: f64 = 10.0;
/// Upper bound of generated humidity (exclusive)
pub const MAX_SYNTHETIC_HUMIDITY: f64 = 60.0;

/// Generate one synthetic sample on `day`.
pub fn synthetic_sample<R: Rng>(day: NaiveDate, rng: &mut R) -> SensorSample {
    let seconds_into_day = rng.gen_range(0..86_400u32);
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds_into_day, 0)
        .unwrap_or(NaiveTime::MIN);
    let humidity = rng.gen_range(MIN_SYNTHETIC_HUMIDITY..MAX_SYNTHETIC_HUMIDITY);
    let humidity = (humidity * 100.0).round() / 100.0;
    SensorSample::at(day.and_time(time), humidity)
}

/// Write synthetic rows and return how many were written.
///
/// Stops at the first write failure. A range running past the last
/// representable date is rejected before anything is written.
pub async fn populate<S, R>(
    sink: &mut S,
    start: NaiveDate,
    days: u32,
    per_day: u32,
    rng: &mut R,
) -> Result<u64, StoreError>
where
    S: SampleSink + ?Sized,
    R: Rng + Send,
{
    let out_of_range = || StoreError::DateOutOfRange { start, days };
    if days > 0 {
        start
            .checked_add_days(Days::new(u64::from(days - 1)))
            .ok_or_else(out_of_range)?;
    }

    let mut written = 0u64;

    for offset in 0..days {
        let day = start
            .checked_add_days(Days::new(u64::from(offset)))
            .ok_or_else(out_of_range)?;
        for _ in 0..per_day {
            let sample = synthetic_sample(day, rng);
            sink.append(&sample).await?;
            written += 1;
        }
    }

    info!(rows = written, start = %start, days, "Synthetic samples written");
    Ok(written)
}
