//! Capture Payload Replay
//!
//! Posts nodes or relationships from a JSON file to the graph capture API
//! in a single request. Accepts the failed-batch payloads echoed by
//! `load_emissions`.
//!
//! Usage:
//!   post_nodes_rels payload.json
//!   post_nodes_rels payload.json --type relationships
//!
//! Reads INDYKITE_HOST, INDYKITE_TOKEN, DEBUG_MODE and SSL_VERIFY; batch
//! settings do not apply.
//!
//! Exits 0 on success, 1 on any validation, classification or posting failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use emissions_loader::capture::{sink_from_config, CaptureKind};
use emissions_loader::replay::{self, ReplaySubmitter};
use emissions_loader::CaptureConfig;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PayloadType {
    Nodes,
    Relationships,
}

impl From<PayloadType> for CaptureKind {
    fn from(t: PayloadType) -> Self {
        match t {
            PayloadType::Nodes => CaptureKind::Nodes,
            PayloadType::Relationships => CaptureKind::Relationships,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "post_nodes_rels")]
#[command(about = "Post nodes or relationships from a JSON file to the graph capture API")]
struct Args {
    /// Path to the JSON file containing nodes or relationships
    json_file: PathBuf,

    /// Payload type; auto-detected when omitted
    #[arg(long = "type", value_enum)]
    kind: Option<PayloadType>,
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
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = CaptureConfig::endpoint_from_env()?;
    let doc = replay::load_document(&args.json_file)?;
    let sink = sink_from_config(&config)?;

    let report = ReplaySubmitter::new(sink.as_ref()).submit(doc, args.kind.map(Into::into))?;

    info!("Successfully posted {} {}", report.count, report.kind);
    info!(
        "Response: {}",
        serde_json::to_string_pretty(&report.response)?
    );
    Ok(())
}
