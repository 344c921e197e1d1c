//! Result writer stage — the single consumer appending records to the sink.

use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc};

use crate::cpu_pool::CpuPool;
use crate::error::Result;
use crate::types::{Event, OutcomeRecord, QueueEntry, RunCounters};

/// Everything the writer task needs, moved into it at spawn time
pub(crate) struct WriterContext {
    /// Open sink handle; this task is the only writer for the whole run
    pub(crate) sink: File,
    /// Sink location, for logging only
    pub(crate) sink_path: PathBuf,
    /// Output queue fed by the workers
    pub(crate) output_rx: mpsc::UnboundedReceiver<QueueEntry<OutcomeRecord>>,
    /// Offload pool for record serialization
    pub(crate) cpu_pool: CpuPool,
    /// Expected record count (non-blank source lines)
    pub(crate) total: u64,
    /// Emit a checkpoint every this many processed records
    pub(crate) progress_interval: u64,
    /// Broadcast channel for progress events
    pub(crate) event_tx: broadcast::Sender<Event>,
}

/// Run the writer to completion, returning the final counters
///
/// Drains the output queue one record at a time: serialize on the offload
/// pool, append the line, flush immediately. Flushing per record means a
/// crash never truncates the sink mid-record; every line already written is
/// independently parseable.
///
/// Terminates when `processed` reaches the expected total, or on the
/// explicit termination entry the orchestrator pushes once all workers have
/// exited (the path taken after a producer failure or an interrupt).
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if appending to the sink fails.
/// A record that fails to *serialize* is counted as failed and skipped; it
/// never stops the writer.
pub(crate) async fn run_writer(mut ctx: WriterContext) -> Result<RunCounters> {
    let mut counters = RunCounters::default();

    loop {
        if counters.processed >= ctx.total {
            break;
        }

        let record = match ctx.output_rx.recv().await {
            Some(QueueEntry::Item(record)) => record,
            Some(QueueEntry::Done) | None => break,
        };
        let succeeded = record.is_success();
        let url = record.url.clone();

        let encoded = match ctx
            .cpu_pool
            .submit(move || serde_json::to_string(&record))
            .await
        {
            Ok(task) => task.join().await,
            Err(e) => Err(e),
        };

        match encoded {
            Ok(Ok(line)) => {
                ctx.sink.write_all(line.as_bytes()).await?;
                ctx.sink.write_all(b"\n").await?;
                ctx.sink.flush().await?;

                counters.processed += 1;
                if succeeded {
                    counters.succeeded += 1;
                } else {
                    counters.failed += 1;
                }
            }
            Ok(Err(e)) => {
                tracing::error!(url = %url, error = %e, "failed to serialize record, skipping");
                counters.processed += 1;
                counters.failed += 1;
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "serialize task failed, skipping record");
                counters.processed += 1;
                counters.failed += 1;
            }
        }

        if counters.processed % ctx.progress_interval == 0 {
            tracing::info!(
                processed = counters.processed,
                total = ctx.total,
                succeeded = counters.succeeded,
                failed = counters.failed,
                "progress checkpoint"
            );
            let _ = ctx.event_tx.send(Event::Progress {
                processed: counters.processed,
                total: ctx.total,
                succeeded: counters.succeeded,
                failed: counters.failed,
            });
        }
    }

    tracing::info!(
        processed = counters.processed,
        succeeded = counters.succeeded,
        failed = counters.failed,
        sink = %ctx.sink_path.display(),
        "writer finished"
    );

    Ok(counters)
}
