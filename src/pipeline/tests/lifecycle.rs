use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::error::{Error, FetchError};
use crate::pipeline::FetchPipeline;
use crate::pipeline::test_helpers::{ScriptedFetcher, read_sink, test_config, write_source};
use crate::types::Event;

/// Generous upper bound; every pipeline run in here finishes in milliseconds
/// unless termination is broken.
const RUN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::test]
async fn terminates_for_all_worker_and_capacity_combinations() {
    for workers in [1usize, 5, 50] {
        for total in [0usize, 1, 100] {
            for capacity in [1usize, 10] {
                let temp_dir = tempdir().unwrap();
                let lines: Vec<String> =
                    (0..total).map(|i| format!("https://a.test/{i}")).collect();
                let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
                write_source(&temp_dir, &line_refs);

                let mut config = test_config(&temp_dir);
                config.workers = workers;
                config.queue_capacity = capacity;

                let pipeline =
                    FetchPipeline::with_fetcher(config, Arc::new(ScriptedFetcher::new()))
                        .unwrap();
                let summary = timeout(RUN_DEADLINE, pipeline.run())
                    .await
                    .unwrap_or_else(|_| {
                        panic!("deadlock with workers={workers} total={total} capacity={capacity}")
                    })
                    .unwrap();

                assert_eq!(summary.total, total as u64);
                assert_eq!(summary.counters.processed, total as u64);
                assert_eq!(
                    summary.counters.succeeded + summary.counters.failed,
                    summary.counters.processed
                );
            }
        }
    }
}

#[tokio::test]
async fn each_url_appears_at_most_once_in_the_sink() {
    let temp_dir = tempdir().unwrap();
    let lines: Vec<String> = (0..50).map(|i| format!("https://a.test/{i}")).collect();
    let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    write_source(&temp_dir, &line_refs);

    let mut config = test_config(&temp_dir);
    config.workers = 5;

    let fetcher = Arc::new(ScriptedFetcher::new());
    let pipeline = FetchPipeline::with_fetcher(config.clone(), Arc::clone(&fetcher) as _).unwrap();
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.counters.processed, 50);

    let mut urls: Vec<String> = read_sink(&config.sink_path)
        .iter()
        .map(|line| line["url"].as_str().unwrap().to_string())
        .collect();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 50, "every URL written exactly once");
    assert_eq!(fetcher.calls().len(), 50, "every URL fetched exactly once");
}

#[tokio::test]
async fn reference_scenario_counts_and_markers() {
    let temp_dir = tempdir().unwrap();
    write_source(
        &temp_dir,
        &[
            "https://good.test/ok",
            "https://good.test/missing",
            "https://bad.test/",
        ],
    );

    let mut config = test_config(&temp_dir);
    config.workers = 2;
    config.queue_capacity = 2;

    let fetcher = ScriptedFetcher::new()
        .with_ok("https://good.test/ok", r#"{"x":1}"#)
        .with_status("https://good.test/missing", 404)
        .with_error("https://bad.test/", FetchError::Connection);

    let pipeline = FetchPipeline::with_fetcher(config.clone(), Arc::new(fetcher)).unwrap();
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.counters.processed, 3);
    assert_eq!(summary.counters.succeeded, 1);
    assert_eq!(summary.counters.failed, 2);

    let lines = read_sink(&config.sink_path);
    assert_eq!(lines.len(), 3);
    for line in &lines {
        match line["url"].as_str().unwrap() {
            "https://good.test/ok" => {
                assert_eq!(line["status"], "success");
                assert_eq!(line["content"], serde_json::json!({"x": 1}));
            }
            "https://good.test/missing" => {
                assert_eq!(line["status"], "error");
                assert_eq!(line["error"], "HTTP 404");
            }
            "https://bad.test/" => {
                assert_eq!(line["status"], "error");
                assert_eq!(line["error"], "connection error");
            }
            other => panic!("unexpected url in sink: {other}"),
        }
    }
}

#[tokio::test]
async fn missing_source_fails_before_processing() {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir); // no urls.txt written

    let pipeline = FetchPipeline::with_fetcher(config, Arc::new(ScriptedFetcher::new())).unwrap();
    match pipeline.run().await {
        Err(Error::SourceRead(_)) => {}
        other => panic!("expected SourceRead error, got {other:?}"),
    }
}

#[tokio::test]
async fn unwritable_sink_fails_before_workers_start() {
    let temp_dir = tempdir().unwrap();
    write_source(&temp_dir, &["https://a.test/1"]);

    let mut config = test_config(&temp_dir);
    config.sink_path = temp_dir.path().join("missing-dir").join("results.jsonl");

    let fetcher = Arc::new(ScriptedFetcher::new());
    let pipeline = FetchPipeline::with_fetcher(config, Arc::clone(&fetcher) as _).unwrap();
    match pipeline.run().await {
        Err(Error::SinkOpen(_)) => {}
        other => panic!("expected SinkOpen error, got {other:?}"),
    }
    assert!(fetcher.calls().is_empty(), "no fetch may start");
}

#[tokio::test]
async fn invalid_config_rejected_at_construction() {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    config.workers = 0;

    match FetchPipeline::with_fetcher(config, Arc::new(ScriptedFetcher::new())) {
        Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("workers")),
        other => panic!("expected Config error, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn emits_run_started_and_run_complete_events() {
    let temp_dir = tempdir().unwrap();
    write_source(&temp_dir, &["https://a.test/1", "https://a.test/2"]);

    let pipeline =
        FetchPipeline::with_fetcher(test_config(&temp_dir), Arc::new(ScriptedFetcher::new()))
            .unwrap();
    let mut events = pipeline.subscribe();
    pipeline.run().await.unwrap();

    let mut saw_started = false;
    let mut saw_complete = false;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::RunStarted { total } => {
                saw_started = true;
                assert_eq!(total, 2);
            }
            Event::RunComplete {
                processed,
                succeeded,
                failed,
            } => {
                saw_complete = true;
                assert_eq!(processed, 2);
                assert_eq!(succeeded + failed, processed);
            }
            _ => {}
        }
    }
    assert!(saw_started);
    assert!(saw_complete);
}

#[tokio::test]
async fn shutdown_drains_and_returns_partial_summary() {
    let temp_dir = tempdir().unwrap();
    let lines: Vec<String> = (0..20).map(|i| format!("https://a.test/{i}")).collect();
    let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    write_source(&temp_dir, &line_refs);

    let mut config = test_config(&temp_dir);
    config.workers = 2;
    config.queue_capacity = 2;

    // The gate starts closed: workers stall inside their first fetches
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = ScriptedFetcher::new().with_gate(Arc::clone(&gate));
    let pipeline = FetchPipeline::with_fetcher(config.clone(), Arc::new(fetcher)).unwrap();

    let runner = pipeline.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    // Let the pipeline spin up, then request shutdown and open the gate
    tokio::time::sleep(Duration::from_millis(100)).await;
    pipeline.shutdown();
    gate.add_permits(1000);

    let summary = timeout(RUN_DEADLINE, handle)
        .await
        .expect("interrupted run must still terminate")
        .unwrap()
        .unwrap();

    // Partial output is expected: whatever was queued before the interrupt
    // was drained, flushed, and counted
    assert!(summary.counters.processed <= 20);
    assert_eq!(
        summary.counters.succeeded + summary.counters.failed,
        summary.counters.processed
    );
    let lines = read_sink(&config.sink_path);
    assert_eq!(lines.len() as u64, summary.counters.processed);
}

#[tokio::test]
async fn sink_lines_are_durable_at_every_checkpoint() {
    let temp_dir = tempdir().unwrap();
    let lines: Vec<String> = (0..10).map(|i| format!("https://a.test/{i}")).collect();
    let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    write_source(&temp_dir, &line_refs);

    let mut config = test_config(&temp_dir);
    config.progress_interval = 3;

    let pipeline =
        FetchPipeline::with_fetcher(config.clone(), Arc::new(ScriptedFetcher::new())).unwrap();
    let mut events = pipeline.subscribe();
    pipeline.run().await.unwrap();

    // Each checkpoint promises at least that many complete lines on disk;
    // with flush-per-record the final state must hold all of them
    let mut last_checkpoint = 0;
    while let Ok(event) = events.try_recv() {
        if let Event::Progress { processed, .. } = event {
            last_checkpoint = processed;
        }
    }
    assert!(last_checkpoint >= 9);
    let lines = read_sink(&config.sink_path);
    assert_eq!(lines.len(), 10);
}
