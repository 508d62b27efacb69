//! Batch Dispatch
//!
//! Splits node or relationship sets into fixed-size chunks and submits them
//! on a bounded worker pool. A failing chunk is reported and counted, never
//! retried, and never stops its siblings.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use super::client::{echo_failed_payload, CaptureError, CaptureKind, CaptureSink};

/// Final counts of one dispatch round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchTally {
    pub completed: usize,
    pub failed: usize,
}

impl DispatchTally {
    pub fn total(&self) -> usize {
        self.completed + self.failed
    }
}

/// Map `f` over contiguous chunks of `items` with at most `max_concurrency`
/// chunks in flight. Returns one outcome per chunk, in chunk order.
///
/// The pool is sized `min(max_concurrency, chunk_count)` and torn down
/// before returning.
pub fn run_bounded<T, R, F>(
    items: &[T],
    chunk_size: usize,
    max_concurrency: usize,
    f: F,
) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &[T]) -> R + Sync,
{
    let chunks: Vec<&[T]> = items.chunks(chunk_size.max(1)).collect();
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let workers = max_concurrency.max(1).min(chunks.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("capture-worker-{}", i))
        .build()
        .context("Failed to build dispatch worker pool")?;

    Ok(pool.install(|| {
        chunks
            .par_iter()
            .enumerate()
            .map(|(idx, chunk)| f(idx, chunk))
            .collect()
    }))
}

/// Submits capture payloads in batches.
#[derive(Debug, Clone, Copy)]
pub struct BatchDispatcher {
    batch_size: usize,
    max_concurrency: usize,
}

impl BatchDispatcher {
    pub fn new(batch_size: usize, max_concurrency: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Send `items` to the `kind` endpoint of `sink`. Returns once every
    /// chunk has either succeeded or failed.
    pub fn dispatch<T: Serialize + Sync>(
        &self,
        kind: CaptureKind,
        items: &[T],
        sink: &dyn CaptureSink,
    ) -> Result<DispatchTally> {
        if items.is_empty() {
            warn!("No {} to create, skipping", kind);
            return Ok(DispatchTally::default());
        }

        let total_batches = items.len().div_ceil(self.batch_size);
        info!(
            "Processing {} {} batches with up to {} concurrent workers (batch_size={}, max_concurrency={})",
            total_batches,
            kind,
            self.max_concurrency.min(total_batches),
            self.batch_size,
            self.max_concurrency
        );

        let outcomes = run_bounded(items, self.batch_size, self.max_concurrency, |idx, chunk| {
            let batch_num = idx + 1;
            match submit_chunk(kind, chunk, sink) {
                Ok(_) => {
                    info!(
                        "✓ Batch {}/{} ({} {}) completed",
                        batch_num,
                        total_batches,
                        chunk.len(),
                        kind
                    );
                    true
                }
                Err(e) => {
                    error!(
                        "✗ Error creating {} batch {}/{}: {}",
                        kind, batch_num, total_batches, e
                    );
                    false
                }
            }
        })?;

        let completed = outcomes.iter().filter(|ok| **ok).count();
        let tally = DispatchTally {
            completed,
            failed: outcomes.len() - completed,
        };
        info!(
            "{}: {} batches completed, {} batches failed",
            kind, tally.completed, tally.failed
        );
        Ok(tally)
    }
}

fn submit_chunk<T: Serialize>(
    kind: CaptureKind,
    chunk: &[T],
    sink: &dyn CaptureSink,
) -> Result<Value, CaptureError> {
    let items = chunk
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    let payload = kind.wrap(items);

    sink.post(kind, &payload).map_err(|e| {
        e.log_details();
        echo_failed_payload(kind, &sink.url(kind), &payload, true);
        e
    })
}
