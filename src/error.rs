//! Error types for url-harvest
//!
//! Two layers of failure exist in the pipeline:
//! - Run-fatal errors ([`Error`]) that abort the whole run: invalid
//!   configuration, an unreadable source, an unwritable sink.
//! - Per-item fetch failures ([`FetchError`]) that are recorded in the
//!   item's output line and never propagate past it.

use thiserror::Error;

/// Result type alias for url-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Run-fatal error type for url-harvest
///
/// Only these variants halt a run. Everything that can go wrong with a
/// single URL is captured as a [`FetchError`] inside that item's record.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "workers")
        key: Option<String>,
    },

    /// Source file cannot be opened or read (fatal before/during production)
    #[error("source read error: {0}")]
    SourceRead(String),

    /// Sink file cannot be created (fatal before workers start)
    #[error("sink open error: {0}")]
    SinkOpen(String),

    /// I/O error while appending to the sink
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CPU offload task failed to complete (panicked or was aborted)
    #[error("offload task error: {0}")]
    Task(String),
}

/// Per-item fetch classification
///
/// Classification is terminal per item: exactly one of these (or success)
/// describes every dequeued URL. The `Display` form is the marker persisted
/// in the record's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection or DNS failure, including invalid URLs and aborted body reads
    #[error("connection error")]
    Connection,

    /// The request did not complete within the configured per-request timeout
    #[error("timeout")]
    Timeout,

    /// Response status outside the 200-299 success range
    #[error("HTTP {0}")]
    HttpStatus(u16),

    /// 2xx response whose body is not valid JSON
    #[error("JSON decode error")]
    Decode,
}

impl FetchError {
    /// Classify a transport-level reqwest error.
    ///
    /// Timeouts take priority; everything else reqwest can fail with before
    /// an HTTP status exists (DNS, refused connection, TLS, malformed URL,
    /// interrupted body read) is a connection failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Connection
        }
    }
}
