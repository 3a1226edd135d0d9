//! The global request ceiling holds no matter how many workers run.

use std::sync::Arc;
use std::time::Duration;

use engagement_exporter::exporter::{ExportConfig, Scheduler};
use engagement_exporter::fetcher::RecordFetcher;
use tokio::time::Instant;

use super::support::{fast_config, ScriptedFetcher};

#[tokio::test(start_paused = true)]
async fn run_never_exceeds_the_request_rate() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let config = ExportConfig {
        concurrency: 2,
        rate_limit: 5.0,
        ..fast_config()
    };

    let start = Instant::now();
    let input: Vec<String> = (1..=10).map(|n| n.to_string()).collect();
    let report = Scheduler::new(config, Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .run(input)
        .await
        .unwrap();

    let elapsed = Instant::now() - start;
    assert_eq!(report.succeeded.len(), 10);
    // Ten admissions at 5/sec span nine 200ms gaps; the run is paced by the
    // rate ceiling, not serialized beyond it.
    assert!(elapsed >= Duration::from_millis(1800), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(2000), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn no_rolling_second_sees_more_requests_than_the_rate() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let config = ExportConfig {
        concurrency: 12,
        rate_limit: 5.0,
        ..fast_config()
    };

    let input: Vec<String> = (1..=12).map(|n| n.to_string()).collect();
    Scheduler::new(config, Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .run(input)
        .await
        .unwrap();

    let mut times = fetcher.call_times();
    times.sort();
    assert_eq!(times.len(), 12);
    for (index, window_start) in times.iter().enumerate() {
        let in_window = times[index..]
            .iter()
            .filter(|t| **t < *window_start + Duration::from_secs(1))
            .count();
        assert!(in_window <= 5, "{in_window} requests within one second");
    }
}

#[tokio::test(start_paused = true)]
async fn a_generous_rate_does_not_slow_the_run() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let config = ExportConfig {
        concurrency: 2,
        rate_limit: 1_000.0,
        ..fast_config()
    };

    let start = Instant::now();
    let input: Vec<String> = (1..=20).map(|n| n.to_string()).collect();
    Scheduler::new(config, Arc::clone(&fetcher) as Arc<dyn RecordFetcher>)
        .unwrap()
        .run(input)
        .await
        .unwrap();

    // Twenty admissions at 1ms spacing.
    assert!(Instant::now() - start <= Duration::from_millis(50));
}
