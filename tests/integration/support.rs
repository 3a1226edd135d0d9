//! Shared fixtures for the scheduler integration suites.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use engagement_exporter::exporter::ExportConfig;
use engagement_exporter::fetcher::{FetchFailure, FetchResult, RecordFetcher};
use serde_json::json;
use tokio::time::Instant;

/// Replays a per-identifier script of fetch results; identifiers without a
/// script (or with an exhausted one) succeed with a canned payload.
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<FetchResult>>>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    /// Queue the results returned for `id`, one per attempt in order.
    pub fn script(self, id: &str, steps: Vec<FetchResult>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), steps.into());
        self
    }

    /// Total fetch attempts seen across all identifiers.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Timestamps of every fetch attempt, in arrival order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordFetcher for ScriptedFetcher {
    async fn fetch_record(&self, identifier: &str) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(identifier)
            .and_then(|steps| steps.pop_front());
        scripted.unwrap_or_else(|| Ok(json!({"engagement": {"id": identifier}})))
    }
}

/// Fails every attempt with a clone of the same failure.
pub struct AlwaysFailing {
    failure: FetchFailure,
    calls: AtomicUsize,
}

impl AlwaysFailing {
    pub fn new(failure: FetchFailure) -> Self {
        Self {
            failure,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordFetcher for AlwaysFailing {
    async fn fetch_record(&self, _identifier: &str) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.failure.clone())
    }
}

/// Configuration with sub-second backoff so retry paths run quickly.
pub fn fast_config() -> ExportConfig {
    ExportConfig {
        rate_limit: 1_000.0,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(2),
        retry_window: Duration::from_secs(60),
        jitter: 0.0,
        ..ExportConfig::default()
    }
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
