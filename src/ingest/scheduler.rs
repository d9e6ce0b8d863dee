//! Ingestion state machine
//!
//! Drives a [`LineSource`] into a [`SampleSink`], one line at a time:
//!
//! ```text
//!   AwaitingLine ──line parsed──▶ Throttled(h) ──admit/write or drop──▶ AwaitingLine
//!        │   ▲                                                            ▲
//!        │   └──idle or unparsable line                                   │
//!        └──read error──▶ Faulted(err) ──reopen (ok or backoff)───────────┘
//! ```
//!
//! No error inside the loop terminates it. Shutdown is observed between
//! iterations and interrupts every pause, after which both the source and the
//! sink are closed.

use chrono::Local;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::rate_window::RateWindow;
use crate::config::SchedulerConfig;
use crate::error::SessionError;
use crate::hardware::{LineRead, LineSource};
use crate::parser::LineParser;
use crate::sample::SensorSample;
use crate::storage::SampleSink;

/// Where the loop is between two iterations.
#[derive(Debug)]
pub enum IngestState {
    /// Waiting for the next line from the device
    AwaitingLine,
    /// A humidity value was parsed and awaits the rate check
    Throttled(f64),
    /// The last read failed; the link must be reopened
    Faulted(SessionError),
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Non-blank lines received
    pub lines_read: u64,
    /// Lines discarded because no number could be parsed
    pub parse_failures: u64,
    /// Samples appended to the store
    pub written: u64,
    /// Parsed samples dropped by the rate window
    pub throttled: u64,
    /// Read errors that sent the loop to recovery
    pub read_faults: u64,
    /// Reopen attempts that failed
    pub reopen_failures: u64,
    /// Appends rejected by the store
    pub write_failures: u64,
}

/// Single-task ingestion loop owning its line source and sink.
pub struct IngestScheduler<S, W> {
    source: S,
    sink: W,
    parser: LineParser,
    config: SchedulerConfig,
    window: RateWindow,
    stats: IngestStats,
}

impl<S, W> IngestScheduler<S, W>
where
    S: LineSource,
    W: SampleSink,
{
    /// Create a scheduler with an unset rate window.
    pub fn new(source: S, sink: W, parser: LineParser, config: SchedulerConfig) -> Self {
        Self {
            source,
            sink,
            parser,
            config,
            window: RateWindow::new(),
            stats: IngestStats::default(),
        }
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    ///
    /// Closes the source and the sink before returning the final counters.
    #[instrument(skip_all, name = "ingest")]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> IngestStats {
        info!(
            write_interval = ?self.config.write_interval,
            "Ingestion loop started"
        );

        let mut state = IngestState::AwaitingLine;
        while !shutdown_requested(&shutdown) {
            state = self.step(state, &mut shutdown).await;
        }

        self.source.close().await;
        self.sink.close().await;

        info!(stats = ?self.stats, "Ingestion loop stopped");
        self.stats
    }

    /// Advance the machine by one transition.
    pub async fn step(
        &mut self,
        state: IngestState,
        shutdown: &mut watch::Receiver<bool>,
    ) -> IngestState {
        match state {
            IngestState::AwaitingLine => self.await_line(shutdown).await,
            IngestState::Throttled(humidity) => self.admit(humidity, shutdown).await,
            IngestState::Faulted(err) => self.recover(err, shutdown).await,
        }
    }

    async fn await_line(&mut self, shutdown: &mut watch::Receiver<bool>) -> IngestState {
        match self.source.read_line().await {
            Ok(LineRead::Line(line)) => {
                self.stats.lines_read += 1;
                match self.parser.parse(&line) {
                    Ok(humidity) => IngestState::Throttled(humidity),
                    Err(err) => {
                        self.stats.parse_failures += 1;
                        warn!(line = %line, error = %err, "Discarding invalid sensor line");
                        IngestState::AwaitingLine
                    }
                }
            }
            Ok(LineRead::Idle) => {
                pause(self.config.idle_yield, shutdown).await;
                IngestState::AwaitingLine
            }
            Err(err) => IngestState::Faulted(err),
        }
    }

    async fn admit(
        &mut self,
        humidity: f64,
        shutdown: &mut watch::Receiver<bool>,
    ) -> IngestState {
        let now = Instant::now();
        if !self.window.admits(now, self.config.write_interval) {
            self.stats.throttled += 1;
            debug!(humidity, "Sample inside write interval, dropped");
            return IngestState::AwaitingLine;
        }

        let sample = SensorSample::accept(Local::now(), humidity);
        match self.sink.append(&sample).await {
            Ok(()) => {
                self.window.record(now);
                self.stats.written += 1;
                info!(
                    timestamp = %sample.timestamp_string(),
                    humidity = sample.humidity_percent,
                    status = %sample.soil_status,
                    "Sample stored"
                );
            }
            Err(err) => {
                self.stats.write_failures += 1;
                error!(
                    humidity,
                    error = %err,
                    backoff = ?self.config.write_backoff,
                    "Store write failed, sample dropped"
                );
                pause(self.config.write_backoff, shutdown).await;
            }
        }

        IngestState::AwaitingLine
    }

    async fn recover(
        &mut self,
        err: SessionError,
        shutdown: &mut watch::Receiver<bool>,
    ) -> IngestState {
        self.stats.read_faults += 1;
        warn!(port = %err.path(), error = %err, "Serial link fault, reopening");

        match self.source.reopen().await {
            Ok(()) => info!(port = %err.path(), "Serial link recovered"),
            Err(reopen_err) => {
                self.stats.reopen_failures += 1;
                error!(
                    error = %reopen_err,
                    backoff = ?self.config.fault_backoff,
                    "Reopen failed"
                );
                pause(self.config.fault_backoff, shutdown).await;
            }
        }

        IngestState::AwaitingLine
    }
}

/// True once shutdown was requested or nobody can request it anymore.
fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Sleep for `duration`, returning early on a shutdown change.
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) {
    if duration.is_zero() {
        tokio::task::yield_now().await;
        return;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.changed() => {}
    }
}
