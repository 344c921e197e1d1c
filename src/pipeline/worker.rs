//! Worker stage — fetches URLs from the shared queue and classifies results.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::cpu_pool::CpuPool;
use crate::error::FetchError;
use crate::fetcher::UrlFetcher;
use crate::types::{OutcomeRecord, QueueEntry};

/// Receiving end of the bounded URL queue, shared by all workers
///
/// `tokio::sync::mpsc` has a single consumer, so workers take turns holding
/// the lock across one `recv`. The lock is released as soon as an entry is
/// dequeued; fetches run fully concurrently.
pub(crate) type SharedItemReceiver = Arc<Mutex<mpsc::Receiver<QueueEntry<String>>>>;

/// How much of an undecodable body is kept in the error log
const BODY_PREVIEW_CHARS: usize = 200;

/// Everything one worker task needs, moved into it at spawn time
pub(crate) struct WorkerContext {
    /// Worker index, for log correlation only
    pub(crate) id: usize,
    /// Transport used for every fetch
    pub(crate) fetcher: Arc<dyn UrlFetcher>,
    /// Offload pool for JSON body decoding
    pub(crate) cpu_pool: CpuPool,
    /// Shared receiving end of the bounded URL queue
    pub(crate) item_rx: SharedItemReceiver,
    /// Output queue toward the result writer
    pub(crate) output_tx: mpsc::UnboundedSender<QueueEntry<OutcomeRecord>>,
}

/// Run one worker to completion
///
/// Dequeues until it observes its `Done` entry (or the queue closes), and
/// publishes exactly one record for every real item it dequeues. A failed
/// fetch is a record like any other; nothing a single URL does can stop the
/// worker or its siblings.
pub(crate) async fn run_worker(ctx: WorkerContext) {
    loop {
        let entry = {
            let mut item_rx = ctx.item_rx.lock().await;
            item_rx.recv().await
        };

        let url = match entry {
            Some(QueueEntry::Item(url)) => url,
            Some(QueueEntry::Done) | None => break,
        };

        let record = fetch_and_classify(ctx.id, &*ctx.fetcher, &ctx.cpu_pool, url).await;
        if ctx.output_tx.send(QueueEntry::Item(record)).is_err() {
            // Writer is gone; no point fetching what can't be recorded
            tracing::warn!(worker_id = ctx.id, "output queue closed, worker stopping");
            break;
        }
    }

    tracing::debug!(worker_id = ctx.id, "worker exiting");
}

/// Fetch one URL and classify the outcome, in priority order:
/// connection failure, timeout, HTTP status, decode failure, success.
/// Each classification is terminal; exactly one record comes back.
async fn fetch_and_classify(
    worker_id: usize,
    fetcher: &dyn UrlFetcher,
    cpu_pool: &CpuPool,
    url: String,
) -> OutcomeRecord {
    let response = match fetcher.fetch(&url).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(worker_id, url = %url, error = %e, "fetch failed");
            return OutcomeRecord::failure(url, &e);
        }
    };

    if !(200..=299).contains(&response.status) {
        let e = FetchError::HttpStatus(response.status);
        tracing::error!(worker_id, url = %url, status = response.status, "HTTP error status");
        return OutcomeRecord::failure(url, &e);
    }

    // Decode off the async runtime; an undecodable body keeps a truncated
    // preview for the log but only the classification marker is persisted.
    let body = response.body;
    let decoded = match cpu_pool
        .submit(move || {
            serde_json::from_str::<serde_json::Value>(&body).map_err(|e| {
                let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
                (e, preview)
            })
        })
        .await
    {
        Ok(task) => task.join().await,
        Err(e) => Err(e),
    };

    match decoded {
        Ok(Ok(content)) => {
            tracing::debug!(worker_id, url = %url, "fetched and decoded");
            OutcomeRecord::success(url, content)
        }
        Ok(Err((e, preview))) => {
            tracing::error!(worker_id, url = %url, error = %e, preview = %preview, "response body is not valid JSON");
            OutcomeRecord::failure(url, &FetchError::Decode)
        }
        Err(e) => {
            // Pool failure (task panicked) is contained to this item
            tracing::error!(worker_id, url = %url, error = %e, "decode task failed");
            OutcomeRecord::failure(url, &FetchError::Decode)
        }
    }
}
