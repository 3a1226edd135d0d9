//! Record fetching and failure classification.
//!
//! ## Overview
//!
//! A [`RecordFetcher`] performs exactly one network round-trip per call and
//! reports either a parsed JSON payload or a [`FetchFailure`] carrying a
//! [`FailureKind`] classification. All retry decisions live with the
//! scheduler; keeping the client single-shot keeps backoff behavior in one
//! place and makes the client trivially mockable.
//!
//! ## Components
//!
//! - [`RecordFetcher`]: the async fetch trait the scheduler drives
//! - [`HttpRecordFetcher`]: production implementation over `reqwest`
//! - [`Credential`]: opaque authentication applied to each request
//! - [`FetchFailure`]: classified failure with optional retry-after hint

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::FailureKind;

mod http;

pub use http::HttpRecordFetcher;

/// Result of a single fetch attempt.
pub type FetchResult = Result<serde_json::Value, FetchFailure>;

/// Fetches one record per call; implementations must be shareable across
/// workers.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Perform exactly one round-trip for `identifier`.
    async fn fetch_record(&self, identifier: &str) -> FetchResult;
}

/// A classified fetch failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchFailure {
    /// Failure classification driving the retry decision.
    pub kind: FailureKind,
    /// HTTP status code, when the failure came from a response.
    pub status: Option<u16>,
    /// Human-readable description (includes a body snippet when available).
    pub message: String,
    /// Server-supplied wait hint, only ever set for rate-limit failures.
    pub retry_after: Option<Duration>,
}

impl FetchFailure {
    /// A 429-style throttling failure, optionally carrying a wait hint.
    pub fn rate_limited(
        status: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self {
            kind: FailureKind::RateLimited,
            status: Some(status),
            message: message.into(),
            retry_after,
        }
    }

    /// A 5xx or transport-level transient failure.
    pub fn server_error(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ServerError,
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// A request that exceeded the configured timeout.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// A terminal 4xx-style failure; never retried.
    pub fn client_error(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ClientError,
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Whether the retry policy may schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Authentication material applied opaquely to each request.
///
/// The fetcher does not care which scheme is active; callers construct the
/// right variant once and hand it over.
#[derive(Debug, Clone)]
pub enum Credential {
    /// No authentication; requests go out bare.
    Anonymous,
    /// `Authorization: Bearer <token>` header.
    Bearer(String),
    /// API key sent as a query parameter on every request.
    QueryParam {
        /// Query parameter name (e.g. `hapikey`).
        name: String,
        /// Query parameter value.
        value: String,
    },
}

impl Credential {
    /// Build a credential from CLI-style inputs.
    ///
    /// An explicit bearer token wins. An API key value that starts with
    /// `pat-` is a private-app token and belongs in the Authorization header,
    /// not the query string, so it is promoted to a bearer credential with a
    /// warning.
    pub fn from_cli(
        auth_token: Option<&str>,
        api_key_name: &str,
        api_key_value: Option<&str>,
    ) -> Self {
        if let Some(token) = auth_token {
            return Self::Bearer(token.to_string());
        }
        match api_key_value {
            Some(value) if value.starts_with("pat-") => {
                warn!("api key value looks like a private-app token; sending it as a bearer header");
                Self::Bearer(value.to_string())
            }
            Some(value) => Self::QueryParam {
                name: api_key_name.to_string(),
                value: value.to_string(),
            },
            None => Self::Anonymous,
        }
    }

    /// Whether any authentication material is present.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// Errors raised while constructing a fetcher.
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// The URL template is missing the identifier placeholder.
    #[error("URL template must contain the {{id}} placeholder: {0}")]
    InvalidTemplate(String),

    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}
