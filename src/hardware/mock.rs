//! Mock sensor link
//!
//! Provides a scripted [`LineSource`] for exercising the ingestion loop
//! without a physical device. Each call to `read_line` consumes one
//! [`ScriptStep`]; `LineAfter` steps use `tokio::time::sleep`, so tests running
//! with paused time control exactly when lines arrive.
//!
//! # Example
//!
//! ```rust,ignore
//! let source = ScriptedSource::new([
//!     ScriptStep::line("Humedad del suelo: 25.50%"),
//!     ScriptStep::Fault,
//!     ScriptStep::line_after(Duration::from_secs(2), "42.0%"),
//! ])
//! .with_reopen_results([true])
//! .shutdown_when_exhausted(shutdown_tx);
//! let tracker = source.tracker();
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use super::session::{LineRead, LineSource};
use crate::error::SessionError;

const MOCK_PATH: &str = "/dev/mock-sensor";

/// One scripted outcome of `read_line`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Return this line immediately
    Line(String),
    /// Sleep, then return the line
    LineAfter(Duration, String),
    /// Return `LineRead::Idle`
    Idle,
    /// Fail with a disconnect
    Fault,
}

impl ScriptStep {
    /// Immediate line.
    pub fn line(text: impl Into<String>) -> Self {
        ScriptStep::Line(text.into())
    }

    /// Line delivered after `delay`.
    pub fn line_after(delay: Duration, text: impl Into<String>) -> Self {
        ScriptStep::LineAfter(delay, text.into())
    }
}

#[derive(Debug, Default)]
struct SourceLog {
    reads: usize,
    reopens: usize,
    closed: bool,
}

/// Read-only view of what the scheduler did to a [`ScriptedSource`].
#[derive(Debug, Clone)]
pub struct SourceTracker(Arc<Mutex<SourceLog>>);

impl SourceTracker {
    fn with<T>(&self, f: impl FnOnce(&SourceLog) -> T) -> T {
        let log = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&log)
    }

    /// Number of `read_line` calls.
    pub fn reads(&self) -> usize {
        self.with(|log| log.reads)
    }

    /// Number of `reopen` calls.
    pub fn reopens(&self) -> usize {
        self.with(|log| log.reopens)
    }

    /// True once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.with(|log| log.closed)
    }
}

/// Scripted line source.
pub struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
    reopen_results: VecDeque<bool>,
    on_exhausted: Option<watch::Sender<bool>>,
    log: Arc<Mutex<SourceLog>>,
}

impl ScriptedSource {
    /// Source that plays `steps` in order, then reports idle forever.
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            reopen_results: VecDeque::new(),
            on_exhausted: None,
            log: Arc::new(Mutex::new(SourceLog::default())),
        }
    }

    /// Outcomes of successive `reopen` calls; once exhausted reopen succeeds.
    pub fn with_reopen_results(mut self, results: impl IntoIterator<Item = bool>) -> Self {
        self.reopen_results = results.into_iter().collect();
        self
    }

    /// Request shutdown through `tx` when the script runs out.
    pub fn shutdown_when_exhausted(mut self, tx: watch::Sender<bool>) -> Self {
        self.on_exhausted = Some(tx);
        self
    }

    /// Handle for inspecting calls after the source was moved into a scheduler.
    pub fn tracker(&self) -> SourceTracker {
        SourceTracker(self.log.clone())
    }

    fn update(&self, f: impl FnOnce(&mut SourceLog)) {
        let mut log = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut log);
    }
}

#[async_trait]
impl LineSource for ScriptedSource {
    async fn read_line(&mut self) -> Result<LineRead, SessionError> {
        self.update(|log| log.reads += 1);

        match self.steps.pop_front() {
            Some(ScriptStep::Line(line)) => Ok(LineRead::Line(line)),
            Some(ScriptStep::LineAfter(delay, line)) => {
                tokio::time::sleep(delay).await;
                Ok(LineRead::Line(line))
            }
            Some(ScriptStep::Idle) => Ok(LineRead::Idle),
            Some(ScriptStep::Fault) => Err(SessionError::Disconnected {
                path: MOCK_PATH.to_string(),
            }),
            None => {
                if let Some(tx) = &self.on_exhausted {
                    let _ = tx.send(true);
                }
                Ok(LineRead::Idle)
            }
        }
    }

    async fn reopen(&mut self) -> Result<(), SessionError> {
        self.update(|log| log.reopens += 1);

        if self.reopen_results.pop_front().unwrap_or(true) {
            Ok(())
        } else {
            Err(SessionError::Reopen {
                path: MOCK_PATH.to_string(),
                source: serialport::Error::new(
                    serialport::ErrorKind::NoDevice,
                    "scripted reopen failure",
                ),
            })
        }
    }

    async fn close(&mut self) {
        self.update(|log| log.closed = true);
    }
}
