//! Write throttle state.

use std::time::Duration;
use tokio::time::Instant;

/// Monotonic instant of the last sample that was accepted and written.
///
/// Starts unset, so the first sample after startup is always admitted. Only
/// a successful write moves it; failed writes and link recoveries leave it
/// untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateWindow {
    last_written: Option<Instant>,
}

impl RateWindow {
    /// Unset window.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a sample observed at `now` may be written.
    pub fn admits(&self, now: Instant, interval: Duration) -> bool {
        match self.last_written {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= interval,
        }
    }

    /// Record a successful write at `now`.
    pub fn record(&mut self, now: Instant) {
        self.last_written = Some(now);
    }

    /// Instant of the last successful write, if any.
    pub fn last_written(&self) -> Option<Instant> {
        self.last_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_window_admits_first_sample() {
        let window = RateWindow::new();
        assert!(window.admits(Instant::now(), Duration::from_secs(30)));
        assert!(window.last_written().is_none());
    }

    #[test]
    fn admits_at_exact_interval() {
        let start = Instant::now();
        let mut window = RateWindow::new();
        window.record(start);

        let interval = Duration::from_secs(2);
        assert!(!window.admits(start + Duration::from_millis(1999), interval));
        assert!(window.admits(start + interval, interval));
        assert!(window.admits(start + Duration::from_secs(5), interval));
    }

    #[test]
    fn zero_interval_admits_everything() {
        let start = Instant::now();
        let mut window = RateWindow::new();
        window.record(start);
        assert!(window.admits(start, Duration::ZERO));
    }

    #[test]
    fn earlier_instant_does_not_underflow() {
        let start = Instant::now();
        let mut window = RateWindow::new();
        window.record(start + Duration::from_secs(10));
        assert!(!window.admits(start, Duration::from_secs(1)));
    }
}
