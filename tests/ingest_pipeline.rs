//! End-to-end tests: serial session over an in-memory pipe, SQLite store on disk.

use soil_ingest::config::{IngestConfig, SchedulerConfig, StorageConfig};
use soil_ingest::error::{IngestError, SessionError};
use soil_ingest::hardware::{DeviceCandidate, SerialSession, SerialSettings};
use soil_ingest::ingest::{run_with_candidates, IngestScheduler};
use soil_ingest::parser::LineParser;
use soil_ingest::storage::SqlStore;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

fn sqlite_url(path: &Path) -> String {
    format!("sqlite:{}?mode=rwc", path.display())
}

fn storage(url: &str) -> StorageConfig {
    StorageConfig {
        url: url.to_string(),
        table: "datos_parcela".to_string(),
        max_connections: 1,
        create_schema: true,
    }
}

fn serial_settings() -> SerialSettings {
    SerialSettings {
        baud_rate: 9600,
        read_timeout: Duration::from_millis(100),
        reopen_backoff: Duration::from_millis(50),
    }
}

fn scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        write_interval: Duration::from_millis(500),
        idle_yield: Duration::from_millis(10),
        fault_backoff: Duration::from_millis(50),
        write_backoff: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn test_burst_is_throttled_and_rows_are_classified() {
    let dir = TempDir::new().unwrap();
    let url = sqlite_url(&dir.path().join("soil.db"));

    let (mut device, host) = tokio::io::duplex(1024);
    let session = SerialSession::with_stream("/dev/ttyACM0", serial_settings(), host);
    let store = SqlStore::connect(&storage(&url)).await.unwrap();

    let (tx, rx) = watch::channel(false);
    let scheduler = IngestScheduler::new(session, store, LineParser::default(), scheduler_config());
    let handle = tokio::spawn(scheduler.run(rx));

    device
        .write_all(
            b"Humedad del suelo: 25.50%\r\nHumedad del suelo: 26.00%\r\nHumedad del suelo: 27.00%\r\n",
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(800)).await;
    device.write_all(b"Humedad del suelo: 42.0%\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(stats.lines_read, 4);
    assert_eq!(stats.written, 2);
    assert_eq!(stats.throttled, 2);

    let reader = SqlStore::connect(&storage(&url)).await.unwrap();
    let rows = reader.recent(10).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].humidity, 42.0);
    assert_eq!(rows[0].soil_status, "Adecuada (LED verde)");
    assert_eq!(rows[1].humidity, 25.5);
    assert_eq!(rows[1].soil_status, "Baja (LED rojo)");
    assert_eq!(reader.latest_humidity().await.unwrap(), Some(42.0));
}

#[tokio::test]
async fn test_garbage_lines_do_not_reach_store() {
    let dir = TempDir::new().unwrap();
    let url = sqlite_url(&dir.path().join("soil.db"));

    let (mut device, host) = tokio::io::duplex(1024);
    let session = SerialSession::with_stream("/dev/ttyACM0", serial_settings(), host);
    let store = SqlStore::connect(&storage(&url)).await.unwrap();

    let (tx, rx) = watch::channel(false);
    let scheduler = IngestScheduler::new(session, store, LineParser::default(), scheduler_config());
    let handle = tokio::spawn(scheduler.run(rx));

    device.write_all(b"abc\n%\n\n   \n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(stats.parse_failures, 2);
    assert_eq!(stats.written, 0);

    let reader = SqlStore::connect(&storage(&url)).await.unwrap();
    assert!(reader.recent(10).await.unwrap().is_empty());
    assert_eq!(reader.latest_humidity().await.unwrap(), None);
}

#[tokio::test]
async fn test_unplugged_device_keeps_stored_rows_and_retries() {
    let dir = TempDir::new().unwrap();
    let url = sqlite_url(&dir.path().join("soil.db"));

    let (mut device, host) = tokio::io::duplex(1024);
    // Reopen targets a path that does not exist, like an unplugged board
    let session = SerialSession::with_stream(
        "/dev/soil-ingest-test-unplugged",
        serial_settings(),
        host,
    );
    let store = SqlStore::connect(&storage(&url)).await.unwrap();

    let (tx, rx) = watch::channel(false);
    let scheduler = IngestScheduler::new(session, store, LineParser::default(), scheduler_config());
    let handle = tokio::spawn(scheduler.run(rx));

    device.write_all(b"Humedad del suelo: 33.30%\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(device);
    tokio::time::sleep(Duration::from_millis(400)).await;

    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(stats.written, 1);
    assert!(stats.read_faults >= 1);
    assert!(stats.reopen_failures >= 1);

    let reader = SqlStore::connect(&storage(&url)).await.unwrap();
    let rows = reader.recent(10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].humidity, 33.3);
}

#[tokio::test]
async fn test_no_matching_device_opens_nothing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("soil.db");

    let mut config = IngestConfig::default();
    config.storage = storage(&sqlite_url(&db_path));
    let candidates = vec![
        DeviceCandidate::new("/dev/ttyS0", "PCI Port"),
        DeviceCandidate::new("/dev/rfcomm0", "Bluetooth Port"),
    ];

    let (_tx, rx) = watch::channel(false);
    let result = run_with_candidates(&config, &candidates, rx).await;

    assert!(matches!(result, Err(IngestError::DeviceNotFound { .. })));
    assert!(!db_path.exists(), "store must not be touched without a device");
}

#[tokio::test]
async fn test_missing_configured_port_fails_before_store() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("soil.db");

    let mut config = IngestConfig::default();
    config.device.port = Some("/dev/soil-ingest-test-missing".to_string());
    config.storage = storage(&sqlite_url(&db_path));

    let (_tx, rx) = watch::channel(false);
    let result = run_with_candidates(&config, &[], rx).await;

    match result {
        Err(IngestError::Session(SessionError::Open { path, .. })) => {
            assert_eq!(path, "/dev/soil-ingest-test-missing");
        }
        other => panic!("expected open failure, got {other:?}"),
    }
    assert!(!db_path.exists());
}
