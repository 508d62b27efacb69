//! Emissions Load Pipeline
//!
//! CSV file -> grouped rows -> capture graph -> node batches, then
//! relationship batches. Relationships are only sent after every node
//! batch has resolved, since they reference node external ids.

use anyhow::Result;
use std::path::Path;
use tracing::{error, info, warn};

use crate::capture::{BatchDispatcher, CaptureKind, CaptureSink, DispatchTally};
use crate::graph::{CaptureGraph, GraphBuilder};
use crate::ingest;

/// Outcome of one load run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub wells: usize,
    pub nodes: usize,
    pub relationships: usize,
    pub node_batches: DispatchTally,
    pub relationship_batches: DispatchTally,
}

impl LoadReport {
    pub fn all_batches_succeeded(&self) -> bool {
        self.node_batches.failed == 0 && self.relationship_batches.failed == 0
    }
}

/// Read and transform `path` without sending anything.
pub fn build_graph(path: &Path) -> Result<(CaptureGraph, usize, usize)> {
    info!("Reading CSV file...");
    let rows = ingest::read_rows(path)?;
    let rows_read = rows.len();
    info!("Read {} rows from CSV", rows_read);

    let wells = ingest::group_by_well(rows);
    info!("Found {} unique wells", wells.len());

    let graph = GraphBuilder::for_file(path).build(&wells);
    log_summary(&graph);
    Ok((graph, rows_read, wells.len()))
}

/// Load `path` into the capture API through `sink`.
pub fn run(path: &Path, dispatcher: &BatchDispatcher, sink: &dyn CaptureSink) -> Result<LoadReport> {
    let (graph, rows_read, wells) = build_graph(path)?;

    info!("Creating nodes in batches of {}...", dispatcher.batch_size());
    if graph.nodes.is_empty() {
        error!("No nodes to create! Skipping node creation.");
    }
    let node_batches = dispatcher.dispatch(CaptureKind::Nodes, &graph.nodes, sink)?;

    info!(
        "Creating relationships in batches of {}...",
        dispatcher.batch_size()
    );
    if graph.relationships.is_empty() {
        error!("No relationships to create! Skipping relationship creation.");
    }
    let relationship_batches =
        dispatcher.dispatch(CaptureKind::Relationships, &graph.relationships, sink)?;

    Ok(LoadReport {
        rows_read,
        wells,
        nodes: graph.nodes.len(),
        relationships: graph.relationships.len(),
        node_batches,
        relationship_batches,
    })
}

fn log_summary(graph: &CaptureGraph) {
    info!("Prepared {} nodes", graph.nodes.len());
    if graph.nodes.is_empty() {
        warn!("No nodes prepared! Check CSV data processing.");
    } else {
        info!("  Node breakdown: {}", format_breakdown(&graph.node_breakdown()));
    }

    info!("Prepared {} relationships", graph.relationships.len());
    if graph.relationships.is_empty() {
        warn!("No relationships prepared! Check CSV data processing.");
    } else {
        info!(
            "  Relationship breakdown: {}",
            format_breakdown(&graph.relationship_breakdown())
        );
    }
}

fn format_breakdown(counts: &[(String, usize)]) -> String {
    counts
        .iter()
        .map(|(name, n)| format!("{}: {}", name, n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_breakdown() {
        let counts = vec![("Well".to_string(), 2), ("Flaring".to_string(), 5)];
        assert_eq!(format_breakdown(&counts), "Well: 2, Flaring: 5");
        assert_eq!(format_breakdown(&[]), "");
    }
}
