//! Export run configuration and tuning constants.

use std::time::Duration;

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Hard ceiling on the worker pool size.
pub const MAX_CONCURRENCY: usize = 32;

/// Default outbound request ceiling, in requests per second.
pub const DEFAULT_RATE_LIMIT: f64 = 10.0;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default window during which a failing identifier keeps being retried.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(72 * 60 * 60);

/// Default first backoff delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(60);

/// Default ceiling on any single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8 * 60 * 60);

/// Default jitter fraction applied to computed backoff delays.
pub const DEFAULT_JITTER: f64 = 0.2;

/// Default User-Agent header for outbound requests.
pub const DEFAULT_USER_AGENT: &str = "engagement-exporter/1.0";

/// Tuning surface for one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Number of concurrent workers (1..=[`MAX_CONCURRENCY`]).
    pub concurrency: usize,
    /// Outbound request ceiling in requests per second (> 0).
    pub rate_limit: f64,
    /// Per-request deadline handed to the fetch client.
    pub request_timeout: Duration,
    /// Optional cap on how many identifiers are processed.
    pub limit: Option<usize>,
    /// Maximum elapsed time since an identifier's first attempt during which
    /// retries are still scheduled.
    pub retry_window: Duration,
    /// First backoff delay; doubles on each retry.
    pub base_delay: Duration,
    /// Ceiling on any single backoff delay.
    pub max_delay: Duration,
    /// Jitter fraction (0.0..=1.0) applied to computed delays.
    pub jitter: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            rate_limit: DEFAULT_RATE_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            limit: None,
            retry_window: DEFAULT_RETRY_WINDOW,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl ExportConfig {
    /// Validate the configuration, returning a description of the first
    /// problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(format!(
                "concurrency {} exceeds maximum {MAX_CONCURRENCY}",
                self.concurrency
            ));
        }
        if !self.rate_limit.is_finite() || self.rate_limit <= 0.0 {
            return Err(format!(
                "rate limit must be a positive number, got {}",
                self.rate_limit
            ));
        }
        if self.request_timeout.is_zero() {
            return Err("request timeout must be positive".to_string());
        }
        if self.retry_window.is_zero() {
            return Err("retry window must be positive".to_string());
        }
        if self.base_delay.is_zero() {
            return Err("base delay must be positive".to_string());
        }
        if self.max_delay < self.base_delay {
            return Err("max delay must not be below base delay".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(format!("jitter must be within 0.0..=1.0, got {}", self.jitter));
        }
        if self.limit == Some(0) {
            return Err("limit must be at least 1 when set".to_string());
        }
        Ok(())
    }
}
