//! Shared test helpers for pipeline tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error::FetchError;
use crate::fetcher::{FetchResponse, UrlFetcher};

/// Write a source file with the given lines into the temp dir
pub(crate) fn write_source(temp_dir: &TempDir, lines: &[&str]) -> PathBuf {
    let path = temp_dir.path().join("urls.txt");
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

/// Config pointing at temp-dir paths with small, deterministic bounds
pub(crate) fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        source_path: temp_dir.path().join("urls.txt"),
        sink_path: temp_dir.path().join("results.jsonl"),
        workers: 2,
        cpu_workers: 2,
        queue_capacity: 10,
        request_timeout: Duration::from_secs(5),
        progress_interval: 100,
    }
}

/// Read the sink back as parsed JSON lines
pub(crate) fn read_sink(path: &std::path::Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Scripted transport with programmable per-URL outcomes
///
/// Unknown URLs succeed with a `{"ok":true}` body. An optional gate
/// consumes one semaphore permit per fetch, letting tests act as a
/// controllable slow consumer.
pub(crate) struct ScriptedFetcher {
    responses: Mutex<HashMap<String, Result<FetchResponse, FetchError>>>,
    gate: Option<Arc<Semaphore>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_ok(self, url: &str, body: &str) -> Self {
        self.with_response(
            url,
            Ok(FetchResponse {
                status: 200,
                body: body.to_string(),
            }),
        )
    }

    pub(crate) fn with_status(self, url: &str, status: u16) -> Self {
        self.with_response(
            url,
            Ok(FetchResponse {
                status,
                body: String::new(),
            }),
        )
    }

    pub(crate) fn with_error(self, url: &str, error: FetchError) -> Self {
        self.with_response(url, Err(error))
    }

    pub(crate) fn with_response(
        self,
        url: &str,
        response: Result<FetchResponse, FetchError>,
    ) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
        self
    }

    /// Make every fetch consume one permit from the gate before answering
    pub(crate) fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// URLs fetched so far, in call order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UrlFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.calls.lock().unwrap().push(url.to_string());
        match self.responses.lock().unwrap().get(url) {
            Some(response) => response.clone(),
            None => Ok(FetchResponse {
                status: 200,
                body: r#"{"ok":true}"#.to_string(),
            }),
        }
    }
}
