//! Producer stage — streams source lines into the bounded URL queue.

use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::QueueEntry;

/// Log a producer checkpoint every this many source lines
const PRODUCER_LOG_INTERVAL: u64 = 1000;

/// Everything the producer task needs, moved into it at spawn time
pub(crate) struct ProducerContext {
    /// Input file with one URL per line
    pub(crate) source_path: PathBuf,
    /// Number of workers to release with `Done` entries at the end
    pub(crate) workers: usize,
    /// Bounded URL queue; `send` suspends while the queue is at capacity
    pub(crate) item_tx: mpsc::Sender<QueueEntry<String>>,
    /// Cooperative stop signal for process-level interrupts
    pub(crate) cancel_token: CancellationToken,
}

/// Run the producer to completion
///
/// Streams the source line by line, trimming and skipping blanks, and
/// enqueues each URL in source order. The bounded queue is the pipeline's
/// only producer-side backpressure point.
///
/// Every exit path — exhausted source, read failure, cancellation — ends
/// with exactly one `Done` entry per worker, so no worker is ever left
/// blocked on an empty queue.
pub(crate) async fn run_producer(ctx: ProducerContext) -> Result<u64> {
    let result = produce_lines(&ctx).await;

    if let Err(ref e) = result {
        tracing::error!(error = %e, "producer failed, releasing workers");
    }

    for _ in 0..ctx.workers {
        if ctx.item_tx.send(QueueEntry::Done).await.is_err() {
            // All receivers are gone; the remaining workers have already exited
            break;
        }
    }

    result
}

async fn produce_lines(ctx: &ProducerContext) -> Result<u64> {
    let file = File::open(&ctx.source_path).await.map_err(|e| {
        Error::SourceRead(format!("{}: {e}", ctx.source_path.display()))
    })?;
    let mut lines = BufReader::new(file).lines();

    let mut lines_read: u64 = 0;
    let mut produced: u64 = 0;

    loop {
        if ctx.cancel_token.is_cancelled() {
            tracing::info!(produced, "shutdown requested, producer stopping early");
            break;
        }

        let line = lines.next_line().await.map_err(|e| {
            Error::SourceRead(format!("{}: {e}", ctx.source_path.display()))
        })?;
        let Some(line) = line else { break };
        lines_read += 1;

        let url = line.trim();
        if url.is_empty() {
            continue;
        }

        let entry = QueueEntry::Item(url.to_string());
        tokio::select! {
            _ = ctx.cancel_token.cancelled() => {
                tracing::info!(produced, "shutdown requested while enqueuing, producer stopping");
                break;
            }
            sent = ctx.item_tx.send(entry) => {
                if sent.is_err() {
                    // All workers exited early; nothing left to produce for
                    tracing::warn!(produced, "URL queue closed, producer stopping");
                    break;
                }
            }
        }
        produced += 1;

        if lines_read % PRODUCER_LOG_INTERVAL == 0 {
            tracing::info!(lines_read, produced, "producer progress");
        }
    }

    tracing::debug!(lines_read, produced, "producer finished reading source");
    Ok(produced)
}
