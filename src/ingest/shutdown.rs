//! Process stop signals forwarded to the ingestion loop.
//!
//! On Unix both SIGTERM (systemd, `docker stop`) and SIGINT stop the loop
//! cleanly; elsewhere Ctrl+C does.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Registered stop-signal handlers.
pub struct StopSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
}

impl StopSignals {
    /// Register the handlers now, so a signal delivered before the first
    /// `recv` is not lost. Must be called inside a tokio runtime.
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                terminate: signal(SignalKind::terminate())?,
                interrupt: signal(SignalKind::interrupt())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next stop signal and return its name.
    pub async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.terminate.recv() => "SIGTERM",
                _ = self.interrupt.recv() => "SIGINT",
            }
        }
        #[cfg(not(unix))]
        {
            match tokio::signal::ctrl_c().await {
                Ok(()) => "Ctrl+C",
                Err(_) => std::future::pending().await,
            }
        }
    }
}

/// Spawn a task that sets `shutdown` to `true` on the first stop signal.
///
/// Falls back to Ctrl+C alone if the handlers cannot be registered. The
/// sender is never dropped without a signal, so the loop keeps running.
pub fn forward_stop_signals(shutdown: watch::Sender<bool>) -> JoinHandle<()> {
    let installed = StopSignals::install();

    tokio::spawn(async move {
        let name = match installed {
            Ok(mut signals) => signals.recv().await,
            Err(err) => {
                warn!(error = %err, "Signal handlers unavailable, watching Ctrl+C only");
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(error = %err, "Ctrl+C handler unavailable");
                    std::future::pending::<()>().await;
                }
                "Ctrl+C"
            }
        };

        info!(signal = name, "Shutdown requested");
        let _ = shutdown.send(true);
    })
}
