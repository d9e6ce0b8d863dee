//! Ingestion pipeline startup and loop.
//!
//! Startup order is fixed: locate the device, open the serial session, connect
//! the store, then hand both to the [`IngestScheduler`]. A device that cannot
//! be found stops startup before any port or database connection is opened.

pub mod rate_window;
pub mod scheduler;
pub mod shutdown;

pub use rate_window::RateWindow;
pub use scheduler::{IngestScheduler, IngestState, IngestStats};
pub use shutdown::{forward_stop_signals, StopSignals};

use tokio::sync::watch;
use tracing::{error, info};

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::hardware::{locator, select_device, DeviceCandidate, LineSource, SerialSession, SerialSettings};
use crate::parser::LineParser;
use crate::storage::SqlStore;

/// Resolve the device path: the configured port if set, else the first
/// candidate matching the configured hints.
pub fn resolve_device(config: &IngestConfig, candidates: &[DeviceCandidate]) -> IngestResult<String> {
    resolve_with(config, |hints| Ok(select_device(candidates, hints).cloned()))
}

fn resolve_with<F>(config: &IngestConfig, find: F) -> IngestResult<String>
where
    F: FnOnce(&[String]) -> IngestResult<Option<DeviceCandidate>>,
{
    if let Some(port) = &config.device.port {
        info!(port = %port, "Using configured serial port");
        return Ok(port.clone());
    }

    let hints = config.normalized_hints();
    match find(&hints)? {
        Some(candidate) => {
            info!(
                port = %candidate.port_name,
                description = %candidate.description,
                "Sensor found"
            );
            Ok(candidate.port_name)
        }
        None => Err(IngestError::DeviceNotFound { hints }),
    }
}

/// Locate the sensor on the host, start the pipeline and run it until `shutdown`.
///
/// Ports are only enumerated when no port is configured.
pub async fn run_ingestion(
    config: &IngestConfig,
    shutdown: watch::Receiver<bool>,
) -> IngestResult<IngestStats> {
    let device = resolve_with(config, locator::locate)?;
    start(config, &device, shutdown).await
}

/// Start the pipeline against an already enumerated port list.
pub async fn run_with_candidates(
    config: &IngestConfig,
    candidates: &[DeviceCandidate],
    shutdown: watch::Receiver<bool>,
) -> IngestResult<IngestStats> {
    let device = resolve_device(config, candidates)?;
    start(config, &device, shutdown).await
}

async fn start(
    config: &IngestConfig,
    device: &str,
    shutdown: watch::Receiver<bool>,
) -> IngestResult<IngestStats> {
    let mut session = SerialSession::open(device, SerialSettings::from(&config.device)).await?;

    let store = match SqlStore::connect(&config.storage).await {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "Store unavailable, releasing serial port");
            session.close().await;
            return Err(err.into());
        }
    };

    let scheduler = IngestScheduler::new(
        session,
        store,
        LineParser::new(config.parser.label_prefix.clone()),
        config.scheduler.clone(),
    );
    Ok(scheduler.run(shutdown).await)
}
