//! Emissions Loader Library
//!
//! Loads well-emissions spreadsheets into the graph capture API and replays
//! captured payloads. Shared by the `load_emissions` and `post_nodes_rels`
//! binaries and the integration tests.

pub mod capture;
pub mod config;
pub mod graph;
pub mod identity;
pub mod ingest;
pub mod loader;
pub mod replay;

pub use config::{CaptureConfig, ConfigError};
