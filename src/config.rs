//! Configuration types for url-harvest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a [`FetchPipeline`](crate::FetchPipeline) run
///
/// All values are fixed for the lifetime of a run; multiple pipelines can
/// run concurrently with independent configurations. Defaults match a
/// moderate local workload and can be overridden per field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Input file with one URL per line; blank lines are skipped
    /// (default: "./urls.txt")
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,

    /// Output JSON-Lines file, created (truncated) at run start
    /// (default: "./results.jsonl")
    #[serde(default = "default_sink_path")]
    pub sink_path: PathBuf,

    /// Number of fetch workers, the maximum number of requests in flight
    /// (default: 5)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Number of CPU offload slots for JSON decode/encode work (default: 4)
    #[serde(default = "default_cpu_workers")]
    pub cpu_workers: usize,

    /// Capacity of the URL queue between producer and workers; the producer
    /// suspends while the queue is full (default: 10000)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-request timeout, applied independently to every fetch
    /// (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Emit a progress checkpoint every this many written records
    /// (default: 100)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_path: default_source_path(),
            sink_path: default_sink_path(),
            workers: default_workers(),
            cpu_workers: default_cpu_workers(),
            queue_capacity: default_queue_capacity(),
            request_timeout: default_request_timeout(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl Config {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key if any bound is
    /// zero (a zero-capacity queue, zero workers, or zero CPU slots would
    /// deadlock the pipeline before it starts).
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config {
                message: "workers must be at least 1".to_string(),
                key: Some("workers".to_string()),
            });
        }
        if self.cpu_workers == 0 {
            return Err(Error::Config {
                message: "cpu_workers must be at least 1".to_string(),
                key: Some("cpu_workers".to_string()),
            });
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config {
                message: "queue_capacity must be at least 1".to_string(),
                key: Some("queue_capacity".to_string()),
            });
        }
        if self.progress_interval == 0 {
            return Err(Error::Config {
                message: "progress_interval must be at least 1".to_string(),
                key: Some("progress_interval".to_string()),
            });
        }
        Ok(())
    }
}

fn default_source_path() -> PathBuf {
    PathBuf::from("./urls.txt")
}

fn default_sink_path() -> PathBuf {
    PathBuf::from("./results.jsonl")
}

fn default_workers() -> usize {
    5
}

fn default_cpu_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_progress_interval() -> u64 {
    100
}

// Duration serialization helper (serializes as whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
