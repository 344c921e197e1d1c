//! # url-harvest
//!
//! Bounded-concurrency URL fetch pipeline that streams classified results
//! to a JSON-Lines sink without holding the full result set in memory.
//!
//! ## Design Philosophy
//!
//! url-harvest is designed to be:
//! - **Bounded everywhere** - workers, queued items, and CPU tasks all have
//!   fixed caps set by configuration, never by global state
//! - **Failure-isolating** - a URL that times out, refuses connections, or
//!   returns garbage becomes one error record; the run keeps going
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use url_harvest::{Config, FetchPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         source_path: "./urls.txt".into(),
//!         sink_path: "./results.jsonl".into(),
//!         workers: 5,
//!         ..Default::default()
//!     };
//!
//!     let pipeline = FetchPipeline::new(config)?;
//!
//!     // Subscribe to progress events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = pipeline.run().await?;
//!     println!(
//!         "processed {} of {} ({} ok, {} failed)",
//!         summary.counters.processed,
//!         summary.total,
//!         summary.counters.succeeded,
//!         summary.counters.failed,
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Bounded CPU offload pool
pub mod cpu_pool;
/// Error types
pub mod error;
/// URL fetching seam (trait + reqwest implementation)
pub mod fetcher;
/// Core pipeline implementation (decomposed into focused submodules)
pub mod pipeline;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use cpu_pool::{CpuPool, CpuTask};
pub use error::{Error, FetchError, Result};
pub use fetcher::{FetchResponse, HttpFetcher, UrlFetcher};
pub use pipeline::FetchPipeline;
pub use types::{Event, FetchStatus, OutcomeRecord, QueueEntry, RunCounters, RunSummary};

/// Helper function to run a pipeline with graceful signal handling.
///
/// Spawns a watcher for a termination signal and triggers the pipeline's
/// `shutdown()` when one arrives: the producer stops enqueuing, workers
/// drain what is already queued, and the writer flushes what it holds, so
/// the returned summary covers everything durably written.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with a Ctrl+C fallback if
///   signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Errors
///
/// Propagates whatever [`FetchPipeline::run`] returns.
///
/// # Example
///
/// ```no_run
/// use url_harvest::{Config, FetchPipeline, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pipeline = FetchPipeline::new(Config::default())?;
///     let summary = run_with_shutdown(pipeline).await?;
///     println!("wrote {}", summary.sink_path.display());
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(pipeline: FetchPipeline) -> Result<RunSummary> {
    let watcher = pipeline.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        watcher.shutdown();
    });
    pipeline.run().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        _ => {
            tracing::warn!("Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
