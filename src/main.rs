//! CLI Entry Point for soil-ingest
//!
//! Provides command-line interface for:
//! - Running the serial ingestion loop until SIGINT/SIGTERM
//! - Listing serial ports and whether they match the device hints
//! - Querying stored samples (recent rows, a time range, the latest value)
//! - Populating the store with synthetic rows for dashboard work
//!
//! # Usage
//!
//! Run ingestion:
//! ```bash
//! soil-ingest run
//! ```
//!
//! Query the last 20 rows:
//! ```bash
//! soil-ingest --config config/soil_ingest.toml recent --limit 20
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use soil_ingest::config::{IngestConfig, DEFAULT_CONFIG_PATH};
use soil_ingest::hardware::locator;
use soil_ingest::ingest::{forward_stop_signals, run_ingestion};
use soil_ingest::logging;
use soil_ingest::storage::{populate::populate, SampleSink, SqlStore};
use soil_ingest::IngestError;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "soil-ingest")]
#[command(about = "Soil humidity serial ingestion", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the sensor and store samples until SIGINT or SIGTERM
    Run,

    /// List serial ports and show which ones match the device hints
    Ports,

    /// Print the most recent stored rows as JSON
    Recent {
        /// Number of rows
        #[arg(long, default_value = "50")]
        limit: u32,
    },

    /// Print (timestamp, humidity) pairs in an inclusive time range as JSON
    Range {
        /// Start, `YYYY-MM-DD HH:MM:SS`
        #[arg(long)]
        start: String,
        /// End, `YYYY-MM-DD HH:MM:SS`
        #[arg(long)]
        end: String,
    },

    /// Print the latest stored humidity as JSON
    Latest,

    /// Write synthetic rows for dashboard development
    Populate {
        /// First day, `YYYY-MM-DD`
        #[arg(long, default_value = "2025-06-01")]
        start: NaiveDate,
        /// Number of consecutive days
        #[arg(long, default_value = "92")]
        days: u32,
        /// Rows per day
        #[arg(long, default_value = "10")]
        per_day: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = IngestConfig::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    config.validate()?;
    logging::init_from_config(&config)?;

    match cli.command {
        Commands::Run => run(&config).await,
        Commands::Ports => list_ports(&config),
        Commands::Recent { limit } => recent(&config, limit).await,
        Commands::Range { start, end } => range(&config, &start, &end).await,
        Commands::Latest => latest(&config).await,
        Commands::Populate {
            start,
            days,
            per_day,
        } => populate_store(config, start, days, per_day).await,
    }
}

async fn run(config: &IngestConfig) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    forward_stop_signals(shutdown_tx);

    match run_ingestion(config, shutdown_rx).await {
        Ok(stats) => {
            info!(
                written = stats.written,
                throttled = stats.throttled,
                parse_failures = stats.parse_failures,
                read_faults = stats.read_faults,
                "Ingestion finished"
            );
            Ok(())
        }
        Err(IngestError::DeviceNotFound { hints }) => {
            error!(?hints, "No sensor found; check the USB cable or set device.port");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn list_ports(config: &IngestConfig) -> Result<()> {
    let hints = config.normalized_hints();
    let candidates = locator::enumerate()?;
    if candidates.is_empty() {
        println!("No serial ports found");
    }
    for candidate in &candidates {
        let marker = if candidate.matches(&hints) { "*" } else { " " };
        println!("{} {:<20} {}", marker, candidate.port_name, candidate.description);
    }
    Ok(())
}

async fn recent(config: &IngestConfig, limit: u32) -> Result<()> {
    let mut store = SqlStore::connect(&config.storage).await?;
    let rows = store.recent(limit).await;
    store.close().await;
    println!("{}", serde_json::to_string_pretty(&rows?)?);
    Ok(())
}

async fn range(config: &IngestConfig, start: &str, end: &str) -> Result<()> {
    let mut store = SqlStore::connect(&config.storage).await?;
    let points = store.between(start, end).await;
    store.close().await;
    println!("{}", serde_json::to_string_pretty(&points?)?);
    Ok(())
}

async fn latest(config: &IngestConfig) -> Result<()> {
    let mut store = SqlStore::connect(&config.storage).await?;
    let value = store.latest_humidity().await;
    store.close().await;
    match value? {
        Some(humidity) => {
            println!("{}", json!({ "humedad": humidity }));
            Ok(())
        }
        None => {
            println!("{}", json!({ "error": "No hay datos" }));
            anyhow::bail!("no samples stored")
        }
    }
}

async fn populate_store(
    mut config: IngestConfig,
    start: NaiveDate,
    days: u32,
    per_day: u32,
) -> Result<()> {
    config.storage.create_schema = true;
    let mut store = SqlStore::connect(&config.storage).await?;
    let mut rng = StdRng::from_entropy();
    let result = populate(&mut store, start, days, per_day, &mut rng).await;
    store.close().await;

    let written = result?;
    println!("{}", json!({ "written": written }));
    Ok(())
}
