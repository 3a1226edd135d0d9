//! Optional Prometheus instrumentation.
//!
//! Counters and histograms are recorded through the `metrics` facade, which
//! is a no-op until [`init_metrics`] installs the Prometheus exporter. Runs
//! without `--metrics-addr` pay nothing beyond the facade's atomic check.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use tracing::info;

use crate::FailureKind;

static METRICS_INSTALLED: Lazy<AtomicBool> = Lazy::new(|| AtomicBool::new(false));

/// Errors raised while setting up the metrics exporter.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The exporter was already installed for this process.
    #[error("metrics exporter is already installed")]
    AlreadyInstalled,

    /// The Prometheus exporter could not be built or bound.
    #[error("failed to install Prometheus exporter: {0}")]
    Exporter(#[from] metrics_exporter_prometheus::BuildError),
}

/// Install the Prometheus scrape endpoint on `addr` and register metric
/// descriptions. Call at most once per process.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    if METRICS_INSTALLED.swap(true, Ordering::SeqCst) {
        return Err(MetricsError::AlreadyInstalled);
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    info!(%addr, "Prometheus metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "export_fetch_attempts_total",
        Unit::Count,
        "Fetch attempts performed, including retries"
    );
    describe_counter!(
        "export_fetch_failures_total",
        Unit::Count,
        "Failed fetch attempts by failure class"
    );
    describe_counter!(
        "export_retries_scheduled_total",
        Unit::Count,
        "Retries queued by failure class"
    );
    describe_counter!(
        "export_outcomes_total",
        Unit::Count,
        "Identifiers reaching a terminal state by outcome"
    );
    describe_histogram!(
        "export_retry_delay_seconds",
        Unit::Seconds,
        "Backoff delays chosen for scheduled retries"
    );
}

/// Count one fetch attempt.
pub fn record_fetch_attempt() {
    counter!("export_fetch_attempts_total").increment(1);
}

/// Count one failed attempt, labeled by failure class.
pub fn record_fetch_failure(kind: FailureKind) {
    counter!("export_fetch_failures_total", "kind" => kind.as_str()).increment(1);
}

/// Count one scheduled retry and observe its chosen delay.
pub fn record_retry_scheduled(kind: FailureKind, delay: Duration) {
    counter!("export_retries_scheduled_total", "kind" => kind.as_str()).increment(1);
    histogram!("export_retry_delay_seconds").record(delay.as_secs_f64());
}

/// Count one terminal transition ("succeeded", "failed", or "cancelled").
pub fn record_terminal_outcome(outcome: &'static str) {
    counter!("export_outcomes_total", "outcome" => outcome).increment(1);
}
