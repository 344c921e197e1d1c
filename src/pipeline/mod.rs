//! Core fetch pipeline split into focused submodules.
//!
//! The `FetchPipeline` struct and its stages are organized by role:
//! - [`producer`] - Source streaming and bounded enqueue
//! - [`worker`] - Concurrent fetch and classification
//! - [`writer`] - Single-consumer durable sink appends
//!
//! This module owns construction, the event surface, and the orchestrated
//! shutdown sequence.

mod producer;
mod worker;
mod writer;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Instant;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::cpu_pool::CpuPool;
use crate::error::{Error, Result};
use crate::fetcher::{HttpFetcher, UrlFetcher};
use crate::types::{Event, QueueEntry, RunSummary};

use producer::{ProducerContext, run_producer};
use worker::{WorkerContext, run_worker};
use writer::{WriterContext, run_writer};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Bounded-concurrency URL fetch pipeline (cloneable - all fields are Arc-wrapped)
///
/// One instance describes one runnable pipeline; [`run`](Self::run) executes
/// it to completion. Multiple pipelines with independent configurations can
/// run concurrently in the same process.
#[derive(Clone)]
pub struct FetchPipeline {
    /// Configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    /// Cooperative stop signal; see [`shutdown`](Self::shutdown)
    cancel_token: CancellationToken,
    /// Transport used by every worker
    fetcher: Arc<dyn UrlFetcher>,
}

impl FetchPipeline {
    /// Create a pipeline with the production HTTP transport
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(config.request_timeout)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Create a pipeline with a custom transport
    ///
    /// Used by tests to script fetch outcomes, and by embedders that need a
    /// non-HTTP transport behind the same pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn UrlFetcher>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            event_tx,
            cancel_token: CancellationToken::new(),
            fetcher,
        })
    }

    /// Subscribe to pipeline events
    ///
    /// Events are broadcast best-effort; a lagging subscriber misses old
    /// events rather than blocking the pipeline.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Request a graceful stop of an in-flight run
    ///
    /// The producer stops enqueuing new URLs, workers finish what is
    /// already queued, and the writer flushes every record it receives
    /// before [`run`](Self::run) returns a partial summary.
    pub fn shutdown(&self) {
        tracing::info!("graceful shutdown requested");
        let _ = self.event_tx.send(Event::Shutdown);
        self.cancel_token.cancel();
    }

    /// The configuration this pipeline was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline to completion
    ///
    /// Sequence: count the expected total, open the sink, start producer +
    /// workers + writer concurrently, then shut down in order: await the
    /// producer, await all workers, push the termination entry so the
    /// writer can stop even short of the expected total, await the writer,
    /// and close the offload pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceRead`] if the source cannot be opened or
    /// read (workers are still released cleanly), [`Error::SinkOpen`] if
    /// the sink cannot be created (before any worker starts), or
    /// [`Error::Io`] if appending to the sink fails mid-run. Per-URL
    /// failures never surface here; they are records in the sink.
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = chrono::Utc::now();
        let started = Instant::now();

        let total = count_source_lines(&self.config.source_path).await?;
        tracing::info!(
            total,
            source = %self.config.source_path.display(),
            workers = self.config.workers,
            "starting run"
        );
        let _ = self.event_tx.send(Event::RunStarted { total });

        // Sink-open failure is fatal before any worker starts
        let sink = File::create(&self.config.sink_path).await.map_err(|e| {
            Error::SinkOpen(format!("{}: {e}", self.config.sink_path.display()))
        })?;

        let cpu_pool = CpuPool::new(self.config.cpu_workers);
        let (item_tx, item_rx) = mpsc::channel(self.config.queue_capacity);
        let item_rx: worker::SharedItemReceiver = Arc::new(Mutex::new(item_rx));
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        let producer = tokio::spawn(run_producer(ProducerContext {
            source_path: self.config.source_path.clone(),
            workers: self.config.workers,
            item_tx,
            cancel_token: self.cancel_token.clone(),
        }));

        let workers: Vec<_> = (0..self.config.workers)
            .map(|id| {
                tokio::spawn(run_worker(WorkerContext {
                    id,
                    fetcher: Arc::clone(&self.fetcher),
                    cpu_pool: cpu_pool.clone(),
                    item_rx: Arc::clone(&item_rx),
                    output_tx: output_tx.clone(),
                }))
            })
            .collect();

        let writer = tokio::spawn(run_writer(WriterContext {
            sink,
            sink_path: self.config.sink_path.clone(),
            output_rx,
            cpu_pool: cpu_pool.clone(),
            total,
            progress_interval: self.config.progress_interval,
            event_tx: self.event_tx.clone(),
        }));

        // Shutdown sequence. Each step is awaited even if an earlier stage
        // failed, so no task is left blocked on a queue.
        let produced = match producer.await {
            Ok(result) => result,
            Err(e) => Err(Error::Task(format!("producer task failed: {e}"))),
        };

        let worker_results = futures::future::join_all(workers).await;
        for (id, result) in worker_results.into_iter().enumerate() {
            if let Err(e) = result {
                tracing::error!(worker_id = id, error = %e, "worker task failed");
            }
        }

        // All workers have exited; release the writer even if processed < total
        let _ = output_tx.send(QueueEntry::Done);
        drop(output_tx);

        let counters = match writer.await {
            Ok(result) => result?,
            Err(e) => return Err(Error::Task(format!("writer task failed: {e}"))),
        };

        cpu_pool.close().await;

        // A producer failure aborts the run, but only after the drain above
        // so the sink keeps everything that was already in flight
        let produced = produced?;
        tracing::debug!(produced, "all stages drained");

        let _ = self.event_tx.send(Event::RunComplete {
            processed: counters.processed,
            succeeded: counters.succeeded,
            failed: counters.failed,
        });
        tracing::info!(
            processed = counters.processed,
            succeeded = counters.succeeded,
            failed = counters.failed,
            sink = %self.config.sink_path.display(),
            "run complete"
        );

        Ok(RunSummary {
            counters,
            total,
            sink_path: self.config.sink_path.clone(),
            started_at,
            elapsed: started.elapsed(),
        })
    }
}

/// Count non-blank source lines to learn the expected total up front
///
/// # Errors
///
/// Returns [`Error::SourceRead`] if the file cannot be opened or read;
/// this is the fatal-before-processing precondition check.
async fn count_source_lines(path: &std::path::Path) -> Result<u64> {
    let file = File::open(path)
        .await
        .map_err(|e| Error::SourceRead(format!("{}: {e}", path.display())))?;
    let mut lines = BufReader::new(file).lines();

    let mut total = 0u64;
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| Error::SourceRead(format!("{}: {e}", path.display())))?
    {
        if !line.trim().is_empty() {
            total += 1;
        }
    }
    Ok(total)
}
