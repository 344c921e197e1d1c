//! Core types for url-harvest

use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Entry on a pipeline queue: a real value or an explicit termination signal
///
/// Modeling termination as a tagged variant (rather than a nullable sentinel)
/// means every enqueued value is self-describing: a legitimate payload can
/// never be mistaken for "no more work". The producer enqueues exactly one
/// `Done` per worker; each worker consumes exactly one before exiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEntry<T> {
    /// A real unit of work
    Item(T),
    /// No more work will arrive; the consumer should exit
    Done,
}

/// Final status of a fetched URL
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// 2xx response with a decodable JSON body
    Success,
    /// Connection, timeout, HTTP status, or decode failure
    Error,
}

/// One classified result per source URL, serialized as one JSON line
///
/// `content` is present iff the fetch succeeded; `error` carries the
/// classification marker iff it failed. Absent fields are omitted from the
/// serialized line so every record is self-contained and minimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// The URL this record describes
    pub url: String,
    /// Whether the fetch succeeded
    pub status: FetchStatus,
    /// Decoded JSON payload (present iff status is success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    /// Classification marker (present iff status is error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutcomeRecord {
    /// Build a success record carrying the decoded payload
    pub fn success(url: String, content: serde_json::Value) -> Self {
        Self {
            url,
            status: FetchStatus::Success,
            content: Some(content),
            error: None,
        }
    }

    /// Build an error record carrying the classification marker
    pub fn failure(url: String, error: &FetchError) -> Self {
        Self {
            url,
            status: FetchStatus::Error,
            content: None,
            error: Some(error.to_string()),
        }
    }

    /// Whether this record describes a successful fetch
    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}

/// Running totals owned exclusively by the result writer
///
/// Mutated only on the writer task, read by the orchestrator only after the
/// writer has terminated. Invariant: `succeeded + failed == processed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Records drained from the output queue (written or counted as failed)
    pub processed: u64,
    /// Records with success status
    pub succeeded: u64,
    /// Records with error status, plus records lost to serialization failure
    pub failed: u64,
}

/// Final report returned by [`FetchPipeline::run`](crate::FetchPipeline::run)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Final counters from the writer
    pub counters: RunCounters,
    /// Number of non-blank source lines (expected total)
    pub total: u64,
    /// Where the results were written
    pub sink_path: PathBuf,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

/// Events emitted by the pipeline during a run
///
/// Subscribe via [`FetchPipeline::subscribe`](crate::FetchPipeline::subscribe).
/// Events are broadcast best-effort; a slow or absent subscriber never blocks
/// the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The run started and the expected total is known
    RunStarted {
        /// Number of non-blank source lines
        total: u64,
    },

    /// Progress checkpoint (every `progress_interval` written records)
    Progress {
        /// Records processed so far
        processed: u64,
        /// Expected total
        total: u64,
        /// Successful records so far
        succeeded: u64,
        /// Failed records so far
        failed: u64,
    },

    /// The writer finished and the sink is complete
    RunComplete {
        /// Records processed
        processed: u64,
        /// Successful records
        succeeded: u64,
        /// Failed records
        failed: u64,
    },

    /// Graceful shutdown was requested
    Shutdown,
}
