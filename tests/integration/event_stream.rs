//! The scheduler's event stream mirrors the final report.

use std::sync::Arc;
use std::time::Duration;

use engagement_exporter::exporter::{channel, ExportEvent, Scheduler};
use engagement_exporter::fetcher::{FetchFailure, RecordFetcher};
use engagement_exporter::FailureKind;
use serde_json::json;

use super::support::{fast_config, ids, ScriptedFetcher};

#[tokio::test(start_paused = true)]
async fn terminal_events_match_the_report() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .script("bad", vec![Err(FetchFailure::client_error(Some(410), "gone"))])
            .script(
                "retry",
                vec![
                    Err(FetchFailure::rate_limited(
                        429,
                        "throttled",
                        Some(Duration::from_secs(1)),
                    )),
                    Ok(json!({"engagement": {"id": "retry"}})),
                ],
            ),
    );

    let (sender, mut receiver) = channel();
    let report = Scheduler::new(fast_config(), Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .with_events(sender)
        .with_jitter_source(Arc::new(|| 0.0))
        .run(ids(&["ok", "bad", "retry"]))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }

    let fetched: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ExportEvent::Fetched { id, attempts, .. } => Some((id.clone(), *attempts)),
            _ => None,
        })
        .collect();
    let failed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ExportEvent::Failed { record } => Some(record.clone()),
            _ => None,
        })
        .collect();
    let retries: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ExportEvent::RetryScheduled {
                id, attempt, kind, delay,
            } => Some((id.clone(), *attempt, *kind, *delay)),
            _ => None,
        })
        .collect();

    // One terminal event per identifier, matching the report's tallies.
    assert_eq!(fetched.len(), report.succeeded.len());
    assert_eq!(failed.len(), report.failed.len());
    assert!(fetched.contains(&("ok".to_string(), 1)));
    assert!(fetched.contains(&("retry".to_string(), 2)));
    assert_eq!(failed[0].id, "bad");
    assert_eq!(failed[0].kind, FailureKind::ClientError);

    assert_eq!(
        retries,
        vec![(
            "retry".to_string(),
            1,
            FailureKind::RateLimited,
            Duration::from_secs(1)
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn channel_closes_when_the_run_finishes() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (sender, mut receiver) = channel();

    Scheduler::new(fast_config(), Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .with_events(sender)
        .run(ids(&["1"]))
        .await
        .unwrap();

    // Drain the single terminal event, then observe the closed channel.
    assert!(receiver.recv().await.is_some());
    assert!(receiver.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn a_dropped_receiver_does_not_break_the_run() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (sender, receiver) = channel();
    drop(receiver);

    let report = Scheduler::new(fast_config(), Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .with_events(sender)
        .run(ids(&["1", "2"]))
        .await
        .unwrap();
    assert_eq!(report.succeeded.len(), 2);
}
