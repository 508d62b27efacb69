//! Capture API Client
//!
//! Blocking HTTP sink for the node and relationship capture endpoints,
//! plus a dry-run sink that performs no I/O.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

/// Header carrying the capture API client key.
pub const CLIENT_KEY_HEADER: &str = "X-IK-ClientKey";

const BODY_PREVIEW_CHARS: usize = 500;

/// Which capture endpoint a payload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    Nodes,
    Relationships,
}

impl CaptureKind {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Nodes => "/capture/v1/nodes",
            Self::Relationships => "/capture/v1/relationships",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Relationships => "relationships",
        }
    }

    /// Request body for a batch of already-serialized items.
    /// Nodes are wrapped in `{"nodes": [...]}`, relationships are a bare array.
    pub fn wrap(&self, items: Vec<Value>) -> Value {
        match self {
            Self::Nodes => json!({ "nodes": items }),
            Self::Relationships => Value::Array(items),
        }
    }

    /// Number of items a request body carries.
    pub fn item_count(&self, payload: &Value) -> usize {
        let inner = match (self, payload) {
            (Self::Nodes, Value::Object(map)) => map.get("nodes"),
            (Self::Relationships, Value::Object(map)) => map.get("relationships"),
            _ => Some(payload),
        };
        match inner {
            Some(Value::Array(items)) => items.len(),
            _ => 1,
        }
    }
}

impl std::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single capture request.
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// Payload could not be serialized.
    Encode(String),
    /// Connection, TLS or timeout failure.
    Transport { url: String, message: String },
    /// Non-2xx response.
    Status {
        url: String,
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
    },
    /// Success status but the body is not JSON.
    Decode { url: String, message: String },
}

impl CaptureError {
    /// Operator hint for server-side failures, which on this API mostly
    /// reflect payload problems rather than outages.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Status { status, .. } if *status >= 500 => Some(
                "server error: likely invalid data format or structure, missing required \
                 fields, server-side validation failure, or a backend service issue",
            ),
            _ => None,
        }
    }

    /// Log the full response context at error level.
    pub fn log_details(&self) {
        match self {
            Self::Status {
                url,
                status,
                headers,
                body,
            } => {
                error!(url = %url, status, "Capture request rejected");
                for (name, value) in headers {
                    error!("  response header {}: {}", name, value);
                }
                error!("Response body:\n{}", pretty_body(body));
                if let Some(hint) = self.hint() {
                    warn!("⚠️ {}", hint);
                }
            }
            other => error!("{}", other),
        }
    }
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(m) => write!(f, "failed to encode payload: {}", m),
            Self::Transport { url, message } => write!(f, "POST {} failed: {}", url, message),
            Self::Status {
                url, status, body, ..
            } => {
                let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
                write!(f, "POST {} returned HTTP {}: {}", url, status, preview)?;
                if let Some(hint) = self.hint() {
                    write!(f, " ({})", hint)?;
                }
                Ok(())
            }
            Self::Decode { url, message } => {
                write!(f, "POST {} returned an undecodable body: {}", url, message)
            }
        }
    }
}

impl std::error::Error for CaptureError {}

/// Destination for capture payloads.
pub trait CaptureSink: Sync {
    /// POST one payload and return the decoded JSON response.
    fn post(&self, kind: CaptureKind, payload: &Value) -> Result<Value, CaptureError>;

    /// Endpoint URL for `kind`, used in diagnostics.
    fn url(&self, kind: CaptureKind) -> String;
}

/// HTTP sink backed by a blocking reqwest client.
#[derive(Clone)]
pub struct CaptureClient {
    client: Client,
    host: String,
}

impl CaptureClient {
    pub fn new(host: &str, token: &str, verify_tls: bool) -> Result<Self> {
        if !verify_tls {
            warn!("⚠️ TLS certificate verification is DISABLED");
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    CLIENT_KEY_HEADER,
                    token.parse().context("Invalid capture API token")?,
                );
                headers
            })
            .build()
            .context("Failed to build CaptureClient")?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
        })
    }
}

impl CaptureSink for CaptureClient {
    fn url(&self, kind: CaptureKind) -> String {
        format!("{}{}", self.host, kind.path())
    }

    fn post(&self, kind: CaptureKind, payload: &Value) -> Result<Value, CaptureError> {
        let url = self.url(kind);
        debug!(
            url = %url,
            items = kind.item_count(payload),
            "POST request payload:\n{}",
            serde_json::to_string_pretty(payload).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .map_err(|e| CaptureError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        debug!(url = %url, status = status.as_u16(), "Response status");

        if !status.is_success() {
            let headers = resp
                .headers()
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str().to_string(),
                        v.to_str().unwrap_or("<binary>").to_string(),
                    )
                })
                .collect();
            let body = resp.text().unwrap_or_default();
            return Err(CaptureError::Status {
                url,
                status: status.as_u16(),
                headers,
                body,
            });
        }

        if status != StatusCode::OK && status != StatusCode::CREATED {
            warn!(url = %url, status = status.as_u16(), "Unexpected success status");
        }

        resp.json::<Value>().map_err(|e| CaptureError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

/// Sink that logs and reports success without sending anything.
#[derive(Debug, Clone)]
pub struct DryRunSink {
    host: String,
}

impl DryRunSink {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
        }
    }
}

impl CaptureSink for DryRunSink {
    fn url(&self, kind: CaptureKind) -> String {
        format!("{}{}", self.host, kind.path())
    }

    fn post(&self, kind: CaptureKind, payload: &Value) -> Result<Value, CaptureError> {
        let count = kind.item_count(payload);
        info!(
            url = %self.url(kind),
            "[DRY RUN] Skipping POST of {} {}",
            count,
            kind
        );
        debug!(
            "[DRY RUN] payload:\n{}",
            serde_json::to_string_pretty(payload).unwrap_or_default()
        );
        let mut resp = serde_json::Map::new();
        resp.insert("status".to_string(), json!("debug"));
        resp.insert(format!("{}_processed", kind), json!(count));
        Ok(Value::Object(resp))
    }
}

/// Banner for an echoed payload; `batched` marks one chunk of a load run.
pub fn failed_payload_title(kind: CaptureKind, batched: bool) -> String {
    let scope = if batched { " BATCH" } else { "" };
    format!("FAILED {}{} PAYLOAD", kind.as_str().to_uppercase(), scope)
}

/// Echo a failed payload to stderr in full so it can be replayed later.
/// The client key is never echoed.
pub fn echo_failed_payload(kind: CaptureKind, url: &str, payload: &Value, batched: bool) {
    let rule = "=".repeat(80);
    let title = failed_payload_title(kind, batched);
    eprintln!("{}", rule);
    eprintln!("{}", title);
    eprintln!("{}", rule);
    eprintln!("URL: {}", url);
    eprintln!(
        "Headers: {{\"{}\": \"<redacted>\", \"Content-Type\": \"application/json\"}}",
        CLIENT_KEY_HEADER
    );
    eprintln!("Payload:");
    eprintln!(
        "{}",
        serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
    );
    eprintln!("{}", rule);
}

fn pretty_body(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}
