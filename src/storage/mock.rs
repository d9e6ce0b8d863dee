//! In-memory sample sink for tests and dry runs.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use super::SampleSink;
use crate::error::StoreError;
use crate::sample::SensorSample;

#[derive(Debug, Default)]
struct Recorded {
    samples: Vec<SensorSample>,
    attempts: usize,
    failing_attempts: BTreeSet<usize>,
    closed: bool,
}

/// Records appended samples. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    /// Sink that accepts every append.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose appends fail on the given zero-based attempt numbers.
    pub fn failing_on(attempts: impl IntoIterator<Item = usize>) -> Self {
        let sink = Self::default();
        sink.with(|rec| rec.failing_attempts = attempts.into_iter().collect());
        sink
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> T {
        let mut rec = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rec)
    }

    /// Successfully appended samples, in order.
    pub fn samples(&self) -> Vec<SensorSample> {
        self.with(|rec| rec.samples.clone())
    }

    /// Number of append calls, failed ones included.
    pub fn attempts(&self) -> usize {
        self.with(|rec| rec.attempts)
    }

    /// True once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.with(|rec| rec.closed)
    }
}

#[async_trait]
impl SampleSink for RecordingSink {
    async fn append(&mut self, sample: &SensorSample) -> Result<(), StoreError> {
        self.with(|rec| {
            let attempt = rec.attempts;
            rec.attempts += 1;
            if rec.closed || rec.failing_attempts.contains(&attempt) {
                return Err(StoreError::Write(sqlx::Error::PoolClosed));
            }
            rec.samples.push(sample.clone());
            Ok(())
        })
    }

    async fn close(&mut self) {
        self.with(|rec| rec.closed = true);
    }
}
