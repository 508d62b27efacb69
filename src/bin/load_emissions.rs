//! Emissions Loader
//!
//! Reads a well-emissions CSV, derives wells, emission types and dated
//! readings, and loads them into the graph capture API in concurrent batches.
//!
//! Usage:
//!   load_emissions [CSV_FILE] [--batch-size N] [--max-threads N]
//!
//! Environment (see `emissions_loader::config`):
//!   INDYKITE_HOST, INDYKITE_TOKEN, BATCH_SIZE, MAX_THREADS, DEBUG_MODE,
//!   SSL_VERIFY, CSV_FILE_PATH

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use emissions_loader::capture::{sink_from_config, BatchDispatcher};
use emissions_loader::{loader, CaptureConfig};

#[derive(Parser, Debug)]
#[command(name = "load_emissions")]
#[command(about = "Load emissions data from CSV into the graph capture API")]
struct Args {
    /// Path to the CSV file (takes precedence over CSV_FILE_PATH)
    csv_file: Option<PathBuf>,

    /// Number of items per batch (default: BATCH_SIZE or 250)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Maximum number of concurrent batch workers (default: MAX_THREADS or 6)
    #[arg(long)]
    max_threads: Option<usize>,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Import failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let config = CaptureConfig::from_env()?.with_overrides(args.batch_size, args.max_threads)?;
    info!(
        "Configuration: BATCH_SIZE={}, MAX_THREADS={}",
        config.batch_size, config.max_concurrency
    );

    let csv_path = config.resolve_input(args.csv_file.as_deref())?;
    info!("Starting emissions data import");
    info!("Using CSV file: {}", csv_path.display());
    info!("Using capture host: {}", config.host);
    if config.dry_run {
        warn!("*** DEBUG MODE ENABLED - requests will be logged but not sent ***");
    }

    let sink = sink_from_config(&config)?;
    let dispatcher = BatchDispatcher::new(config.batch_size, config.max_concurrency);
    let report = loader::run(&csv_path, &dispatcher, sink.as_ref())?;

    info!(
        rows = report.rows_read,
        wells = report.wells,
        nodes = report.nodes,
        relationships = report.relationships,
        "Import finished: node batches {}/{} ok, relationship batches {}/{} ok",
        report.node_batches.completed,
        report.node_batches.total(),
        report.relationship_batches.completed,
        report.relationship_batches.total()
    );

    if !report.all_batches_succeeded() {
        warn!("Some batches failed; failed payloads were written to stderr for replay");
    }
    Ok(report.all_batches_succeeded())
}
