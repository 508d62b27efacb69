//! Capture API
//!
//! HTTP sink for the graph capture endpoints and the batched, bounded
//! dispatcher that feeds it.

pub mod client;
pub mod dispatch;

pub use client::{CaptureClient, CaptureError, CaptureKind, CaptureSink, DryRunSink};
pub use dispatch::{run_bounded, BatchDispatcher, DispatchTally};

use anyhow::Result;

use crate::config::CaptureConfig;

/// Sink selected by configuration: the HTTP client, or a no-op in dry-run mode.
pub fn sink_from_config(config: &CaptureConfig) -> Result<Box<dyn CaptureSink>> {
    if config.dry_run {
        return Ok(Box::new(DryRunSink::new(&config.host)));
    }
    Ok(Box::new(CaptureClient::new(
        &config.host,
        &config.token,
        config.verify_tls,
    )?))
}
