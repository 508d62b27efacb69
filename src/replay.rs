//! Payload Replay
//!
//! Re-sends a previously captured node or relationship payload (for example
//! a failed batch echoed by the loader) to the capture API in one request.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{error, info};

use crate::capture::client::echo_failed_payload;
use crate::capture::{CaptureKind, CaptureSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// Shape matches neither nodes nor relationships.
    Unclassifiable,
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unclassifiable => write!(
                f,
                "could not determine if data is nodes or relationships; \
                 specify --type nodes or --type relationships"
            ),
        }
    }
}

impl std::error::Error for ReplayError {}

/// Result of a successful replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub kind: CaptureKind,
    pub count: usize,
    pub response: Value,
}

pub fn load_document(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Error reading file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON file {}", path.display()))
}

/// Classify a document by its structure.
///
/// Nodes: `{"nodes": [...]}`, a single `{external_id, type, ...}` object, or a
/// non-empty list whose items all carry `external_id`, `type` and `properties`.
/// Relationships: a non-empty list whose items all carry `source`, `target`
/// and `type`.
pub fn detect_kind(doc: &Value) -> Option<CaptureKind> {
    let has_all = |v: &Value, keys: &[&str]| {
        v.as_object()
            .map(|o| keys.iter().all(|k| o.contains_key(*k)))
            .unwrap_or(false)
    };

    match doc {
        Value::Object(map) => {
            if matches!(map.get("nodes"), Some(Value::Array(_))) {
                return Some(CaptureKind::Nodes);
            }
            if has_all(doc, &["external_id", "type"]) {
                return Some(CaptureKind::Nodes);
            }
            None
        }
        Value::Array(items) if !items.is_empty() => {
            if items
                .iter()
                .all(|i| has_all(i, &["external_id", "type", "properties"]))
            {
                Some(CaptureKind::Nodes)
            } else if items.iter().all(|i| has_all(i, &["source", "target", "type"])) {
                Some(CaptureKind::Relationships)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Strip any number of `{"nodes": ...}` wrappers down to the node list.
/// A single remaining value becomes a one-element list; empty values an
/// empty list.
pub fn unwrap_nodes(doc: Value) -> Vec<Value> {
    let mut current = doc;
    while let Value::Object(map) = &mut current {
        match map.remove("nodes") {
            Some(inner) => current = inner,
            None => break,
        }
    }

    match current {
        Value::Array(items) => items,
        v if is_truthy(&v) => vec![v],
        _ => Vec::new(),
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Sends replayed payloads through a capture sink.
pub struct ReplaySubmitter<'a> {
    sink: &'a dyn CaptureSink,
}

impl<'a> ReplaySubmitter<'a> {
    pub fn new(sink: &'a dyn CaptureSink) -> Self {
        Self { sink }
    }

    /// Classify (unless `explicit` is given) and post `doc` in a single request.
    pub fn submit(&self, doc: Value, explicit: Option<CaptureKind>) -> Result<ReplayReport> {
        let kind = match explicit {
            Some(k) => k,
            None => {
                let k = detect_kind(&doc).ok_or(ReplayError::Unclassifiable)?;
                info!("Auto-detected type: {}", k);
                k
            }
        };

        let payload = match kind {
            CaptureKind::Nodes => json!({ "nodes": unwrap_nodes(doc) }),
            CaptureKind::Relationships => doc,
        };
        let count = kind.item_count(&payload);
        let url = self.sink.url(kind);

        info!("POST {}", url);
        info!("Sending {} {}...", count, kind);

        match self.sink.post(kind, &payload) {
            Ok(response) => Ok(ReplayReport {
                kind,
                count,
                response,
            }),
            Err(e) => {
                e.log_details();
                error!("Failed payload written to STDERR");
                echo_failed_payload(kind, &url, &payload, false);
                Err(anyhow::Error::new(e).context(format!("Error posting {}", kind)))
            }
        }
    }
}
