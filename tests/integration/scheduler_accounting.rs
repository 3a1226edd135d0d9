//! Every identifier ends with exactly one outcome, reported in input order.

use std::sync::Arc;

use engagement_exporter::exporter::{ExportConfig, Scheduler};
use engagement_exporter::fetcher::{FetchFailure, RecordFetcher};
use engagement_exporter::FailureKind;
use serde_json::json;

use super::support::{fast_config, ids, ScriptedFetcher};

#[tokio::test(start_paused = true)]
async fn every_identifier_gets_exactly_one_outcome() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .script("3", vec![Err(FetchFailure::client_error(Some(404), "gone"))])
            .script(
                "5",
                vec![
                    Err(FetchFailure::server_error(Some(502), "bad gateway")),
                    Ok(json!({"engagement": {"id": "5"}})),
                ],
            ),
    );

    let report = Scheduler::new(fast_config(), Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .with_jitter_source(Arc::new(|| 0.0))
        .run(ids(&["1", "2", "3", "4", "5", "6"]))
        .await
        .unwrap();

    assert_eq!(report.total(), 6);
    let succeeded: Vec<_> = report.succeeded.iter().map(|r| r.id.as_str()).collect();
    let failed: Vec<_> = report.failed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(succeeded, vec!["1", "2", "4", "5", "6"]);
    assert_eq!(failed, vec!["3"]);

    let retried = report.succeeded.iter().find(|r| r.id == "5").unwrap();
    assert_eq!(retried.attempts, 2);
    assert_eq!(report.failed[0].kind, FailureKind::ClientError);
    assert_eq!(report.failed[0].attempts, 1);

    // Six identifiers, one of which needed a second attempt.
    assert_eq!(fetcher.calls(), 7);
}

#[tokio::test]
async fn empty_input_yields_an_empty_report() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let report = Scheduler::new(fast_config(), fetcher)
        .unwrap()
        .run(Vec::new())
        .await
        .unwrap();
    assert_eq!(report.total(), 0);
    assert!(report.is_complete_success());
}

#[tokio::test(start_paused = true)]
async fn limit_caps_the_identifiers_processed() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let config = ExportConfig {
        limit: Some(2),
        ..fast_config()
    };

    let report = Scheduler::new(config, Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .run(ids(&["a", "b", "c", "d", "e"]))
        .await
        .unwrap();

    assert_eq!(report.total(), 2);
    let succeeded: Vec<_> = report.succeeded.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(succeeded, vec!["a", "b"]);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn single_worker_processes_everything() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let config = ExportConfig {
        concurrency: 1,
        ..fast_config()
    };

    let report = Scheduler::new(config, Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .run(ids(&["1", "2", "3", "4"]))
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 4);
    assert_eq!(fetcher.calls(), 4);
}

#[test]
fn invalid_configuration_is_rejected_before_any_work() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let config = ExportConfig {
        concurrency: 0,
        ..fast_config()
    };
    assert!(Scheduler::new(config, fetcher).is_err());
}
