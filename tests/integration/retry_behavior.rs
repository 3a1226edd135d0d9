//! Backoff, server hints, and the retry window, end to end through the
//! scheduler.

use std::sync::Arc;
use std::time::Duration;

use engagement_exporter::exporter::{ExportConfig, Scheduler};
use engagement_exporter::fetcher::{FetchFailure, RecordFetcher};
use engagement_exporter::FailureKind;
use serde_json::json;
use tokio::time::Instant;

use super::support::{fast_config, ids, AlwaysFailing, ScriptedFetcher};

#[tokio::test(start_paused = true)]
async fn rate_limit_hints_drive_retry_timing() {
    let fetcher = Arc::new(ScriptedFetcher::new().script(
        "42",
        vec![
            Err(FetchFailure::rate_limited(
                429,
                "throttled",
                Some(Duration::from_secs(2)),
            )),
            Err(FetchFailure::rate_limited(
                429,
                "throttled",
                Some(Duration::from_secs(2)),
            )),
            Ok(json!({"engagement": {"id": "42"}})),
        ],
    ));

    let start = Instant::now();
    let report = Scheduler::new(fast_config(), Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .with_jitter_source(Arc::new(|| 0.0))
        .run(ids(&["42"]))
        .await
        .unwrap();

    assert!(report.is_complete_success());
    assert_eq!(report.succeeded[0].attempts, 3);
    assert_eq!(fetcher.calls(), 3);
    // Two two-second waits sit between the three attempts.
    assert!(Instant::now() - start >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn client_errors_are_never_retried() {
    let fetcher = Arc::new(ScriptedFetcher::new().script(
        "9",
        vec![Err(FetchFailure::client_error(Some(403), "forbidden"))],
    ));

    let report = Scheduler::new(fast_config(), Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .run(ids(&["9"]))
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    let record = &report.failed[0];
    assert_eq!(record.kind, FailureKind::ClientError);
    assert_eq!(record.status, Some(403));
    assert_eq!(record.attempts, 1);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_stop_once_the_window_closes() {
    let fetcher = Arc::new(AlwaysFailing::new(FetchFailure::server_error(
        Some(500),
        "boom",
    )));
    let config = ExportConfig {
        retry_window: Duration::from_secs(1),
        base_delay: Duration::from_millis(600),
        max_delay: Duration::from_secs(1),
        ..fast_config()
    };

    let report = Scheduler::new(config, Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .with_jitter_source(Arc::new(|| 0.0))
        .run(ids(&["7"]))
        .await
        .unwrap();

    // Attempts at 0ms, 600ms, and 1600ms; the last lands past the window.
    assert_eq!(report.failed.len(), 1);
    let record = &report.failed[0];
    assert_eq!(record.kind, FailureKind::ServerError);
    assert_eq!(record.attempts, 3);
    assert_eq!(fetcher.calls(), 3);
    assert!(record.elapsed > Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn timeouts_back_off_then_recover() {
    let fetcher = Arc::new(ScriptedFetcher::new().script(
        "11",
        vec![
            Err(FetchFailure::timeout("deadline exceeded")),
            Ok(json!({"engagement": {"id": "11"}})),
        ],
    ));

    let start = Instant::now();
    let report = Scheduler::new(fast_config(), Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .with_jitter_source(Arc::new(|| 0.0))
        .run(ids(&["11"]))
        .await
        .unwrap();

    assert!(report.is_complete_success());
    assert_eq!(report.succeeded[0].attempts, 2);
    assert!(Instant::now() - start >= Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn retrying_one_identifier_does_not_block_the_rest() {
    let fetcher = Arc::new(ScriptedFetcher::new().script(
        "slow",
        vec![
            Err(FetchFailure::server_error(Some(503), "maintenance")),
            Ok(json!({"engagement": {"id": "slow"}})),
        ],
    ));
    let config = ExportConfig {
        concurrency: 1,
        ..fast_config()
    };

    let start = Instant::now();
    let report = Scheduler::new(config, Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .with_jitter_source(Arc::new(|| 0.0))
        .run(ids(&["slow", "a", "b", "c"]))
        .await
        .unwrap();

    assert!(report.is_complete_success());
    // The single worker runs the other identifiers while "slow" waits out
    // its backoff, so the run takes one backoff, not four.
    assert!(Instant::now() - start < Duration::from_millis(300));
    assert_eq!(fetcher.calls(), 5);
}
