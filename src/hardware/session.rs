//! Serial session for the humidity sensor.
//!
//! Owns the single port handle for its open lifetime: open, read one line
//! with a bounded wait, close, reopen. The scheduler only sees it through
//! [`LineSource`], never the raw handle.
//!
//! Protocol Overview:
//! - Baud: 9600 by default, 8N1, no flow control
//! - Terminator: LF; a trailing CR is trimmed
//! - Payload: free text, e.g. `Humedad del suelo: 25.50%`
//!
//! A read that times out is [`LineRead::Idle`], never an error. Only a real
//! link fault (I/O error, end of stream) is reported as [`SessionError`].

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::task::spawn_blocking;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::error::SessionError;

/// Longest line kept while waiting for its terminator.
pub const MAX_LINE_BYTES: usize = 4096;

/// Outcome of a single bounded read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// One complete, non-blank line with surrounding whitespace trimmed.
    Line(String),
    /// Nothing arrived within the read timeout.
    Idle,
}

/// Capability to pull sensor lines and recover the link.
#[async_trait]
pub trait LineSource: Send {
    /// Wait up to the read timeout for one line.
    async fn read_line(&mut self) -> Result<LineRead, SessionError>;

    /// Close the current handle if open, back off, and open the same device again.
    async fn reopen(&mut self) -> Result<(), SessionError>;

    /// Release the device. Safe to call repeatedly.
    async fn close(&mut self);
}

/// Byte stream a session can read from.
pub trait SensorStream: AsyncRead + Unpin + Send {}
impl<T: AsyncRead + Unpin + Send> SensorStream for T {}
type DynSerial = Box<dyn SensorStream>;

/// Serial link settings
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Maximum wait for one line
    pub read_timeout: Duration,
    /// Pause between close and reopen
    pub reopen_backoff: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self::from(&DeviceConfig::default())
    }
}

impl From<&DeviceConfig> for SerialSettings {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            baud_rate: config.baud_rate,
            read_timeout: config.read_timeout,
            reopen_backoff: config.reopen_backoff,
        }
    }
}

/// An open (or recently failed) serial connection to the sensor.
pub struct SerialSession {
    path: String,
    settings: SerialSettings,
    port: Option<BufReader<DynSerial>>,
    /// Bytes of a line that straddled a read timeout
    pending: Vec<u8>,
}

impl SerialSession {
    /// Open the device at `path`.
    ///
    /// # Errors
    /// Returns [`SessionError::Open`] if the port is missing, busy or not permitted.
    pub async fn open(path: &str, settings: SerialSettings) -> Result<Self, SessionError> {
        let port = open_port(path, settings.baud_rate)
            .await
            .map_err(|source| SessionError::Open {
                path: path.to_string(),
                source,
            })?;

        info!(port = %path, baud = settings.baud_rate, "Serial port opened");
        Ok(Self::with_stream(path, settings, port))
    }

    /// Wrap an already-open byte stream (in-memory pipes in tests, adapters).
    pub fn with_stream(
        path: impl Into<String>,
        settings: SerialSettings,
        stream: impl AsyncRead + Unpin + Send + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            settings,
            port: Some(BufReader::new(Box::new(stream))),
            pending: Vec::new(),
        }
    }

    /// Device path this session reads from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True while a port handle is held.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn release(&mut self) -> bool {
        self.pending.clear();
        self.port.take().is_some()
    }
}

async fn open_port(
    path: &str,
    baud_rate: u32,
) -> Result<tokio_serial::SerialStream, serialport::Error> {
    let path_owned = path.to_string();

    // Opening a tty can block on some drivers
    spawn_blocking(move || {
        tokio_serial::new(&path_owned, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
    })
    .await
    .map_err(|e| {
        serialport::Error::new(
            serialport::ErrorKind::Unknown,
            format!("port open task failed: {}", e),
        )
    })?
}

/// Decode one raw line, dropping invalid UTF-8 sequences and surrounding whitespace.
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .replace(char::REPLACEMENT_CHARACTER, "")
        .trim()
        .to_string()
}

#[async_trait]
impl LineSource for SerialSession {
    async fn read_line(&mut self) -> Result<LineRead, SessionError> {
        let Some(port) = self.port.as_mut() else {
            return Err(SessionError::NotOpen {
                path: self.path.clone(),
            });
        };

        // read_until appends to `pending`, so bytes read before a timeout survive
        let room = MAX_LINE_BYTES.saturating_sub(self.pending.len()) as u64;
        let mut bounded = AsyncReadExt::take(&mut *port, room);
        match tokio::time::timeout(
            self.settings.read_timeout,
            bounded.read_until(b'\n', &mut self.pending),
        )
        .await
        {
            Err(_) => Ok(LineRead::Idle),
            Ok(Ok(0)) => {
                self.pending.clear();
                Err(SessionError::Disconnected {
                    path: self.path.clone(),
                })
            }
            Ok(Ok(_)) => {
                if !self.pending.ends_with(b"\n") && self.pending.len() >= MAX_LINE_BYTES {
                    warn!(
                        port = %self.path,
                        bytes = self.pending.len(),
                        "Discarding unterminated line over size limit"
                    );
                    self.pending.clear();
                    return Ok(LineRead::Idle);
                }

                let raw = std::mem::take(&mut self.pending);
                let line = decode_line(&raw);
                if line.is_empty() {
                    return Ok(LineRead::Idle);
                }
                debug!(port = %self.path, line = %line, "Sensor line received");
                Ok(LineRead::Line(line))
            }
            Ok(Err(source)) => {
                self.pending.clear();
                Err(SessionError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }

    async fn reopen(&mut self) -> Result<(), SessionError> {
        if self.release() {
            debug!(port = %self.path, "Closed failed serial handle");
        }

        tokio::time::sleep(self.settings.reopen_backoff).await;

        let port = open_port(&self.path, self.settings.baud_rate)
            .await
            .map_err(|source| {
                warn!(port = %self.path, error = %source, "Serial reopen failed");
                SessionError::Reopen {
                    path: self.path.clone(),
                    source,
                }
            })?;

        self.port = Some(BufReader::new(Box::new(port)));
        info!(port = %self.path, "Serial port reopened");
        Ok(())
    }

    async fn close(&mut self) {
        if self.release() {
            info!(port = %self.path, "Serial port closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn settings() -> SerialSettings {
        SerialSettings {
            baud_rate: 9600,
            read_timeout: Duration::from_secs(1),
            reopen_backoff: Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reads_complete_lines() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut session = SerialSession::with_stream("/dev/test", settings(), device);

        host.write_all(b"Humedad del suelo: 25.50%\r\n42.0%\n")
            .await
            .unwrap();

        assert_eq!(
            session.read_line().await.unwrap(),
            LineRead::Line("Humedad del suelo: 25.50%".to_string())
        );
        assert_eq!(
            session.read_line().await.unwrap(),
            LineRead::Line("42.0%".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_idle_not_error() {
        let (_host, device) = tokio::io::duplex(64);
        let mut session = SerialSession::with_stream("/dev/test", settings(), device);

        let start = tokio::time::Instant::now();
        assert_eq!(session.read_line().await.unwrap(), LineRead::Idle);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(session.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn partial_line_survives_timeout() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut session = SerialSession::with_stream("/dev/test", settings(), device);

        host.write_all(b"31.").await.unwrap();
        assert_eq!(session.read_line().await.unwrap(), LineRead::Idle);

        host.write_all(b"25\n").await.unwrap();
        assert_eq!(
            session.read_line().await.unwrap(),
            LineRead::Line("31.25".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blank_line_is_idle() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut session = SerialSession::with_stream("/dev/test", settings(), device);

        host.write_all(b"   \r\n").await.unwrap();
        assert_eq!(session.read_line().await.unwrap(), LineRead::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_utf8_is_dropped() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut session = SerialSession::with_stream("/dev/test", settings(), device);

        host.write_all(b"\xffHumedad del suelo: 25.50%\r\n").await.unwrap();
        let line = match session.read_line().await.unwrap() {
            LineRead::Line(line) => line,
            other => panic!("unexpected read: {:?}", other),
        };

        assert_eq!(line, "Humedad del suelo: 25.50%");
        assert_eq!(crate::parser::LineParser::default().parse(&line), Ok(25.5));
    }

    #[test]
    fn decode_drops_invalid_sequences_mid_line() {
        assert_eq!(decode_line(b" 12\xfe.5\xc3\n"), "12.5");
    }

    #[tokio::test(start_paused = true)]
    async fn unterminated_flood_is_discarded() {
        let (mut host, device) = tokio::io::duplex(16 * 1024);
        let mut session = SerialSession::with_stream("/dev/test", settings(), device);

        let mut flood = vec![b'7'; MAX_LINE_BYTES + 100];
        flood.extend_from_slice(b"\n12.5\n");
        host.write_all(&flood).await.unwrap();

        assert_eq!(session.read_line().await.unwrap(), LineRead::Idle);
        // The tail of the flood arrives as its own line
        assert_eq!(
            session.read_line().await.unwrap(),
            LineRead::Line("7".repeat(100))
        );
        assert_eq!(
            session.read_line().await.unwrap(),
            LineRead::Line("12.5".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn end_of_stream_is_disconnect() {
        let (host, device) = tokio::io::duplex(64);
        let mut session = SerialSession::with_stream("/dev/test", settings(), device);
        drop(host);

        let err = session.read_line().await.unwrap_err();
        assert!(matches!(err, SessionError::Disconnected { .. }));
        assert_eq!(err.path(), "/dev/test");
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_idempotent_and_blocks_reads() {
        let (_host, device) = tokio::io::duplex(64);
        let mut session = SerialSession::with_stream("/dev/test", settings(), device);

        session.close().await;
        session.close().await;
        assert!(!session.is_open());
        assert!(matches!(
            session.read_line().await,
            Err(SessionError::NotOpen { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn reopen_missing_device_reports_error_after_backoff() {
        let (_host, device) = tokio::io::duplex(64);
        let mut session =
            SerialSession::with_stream("/dev/soil-ingest-missing-port", settings(), device);

        let start = tokio::time::Instant::now();
        let err = session.reopen().await.unwrap_err();

        assert!(matches!(err, SessionError::Reopen { .. }));
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn open_missing_device_fails() {
        let result = SerialSession::open("/dev/soil-ingest-missing-port", settings()).await;
        assert!(matches!(result, Err(SessionError::Open { .. })));
    }
}
