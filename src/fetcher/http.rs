//! HTTP implementation of [`RecordFetcher`] over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, error};

use super::{Credential, FetchFailure, FetchResult, FetcherError, RecordFetcher};

/// Literal replaced with the identifier when building each request URL.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Connection establishment timeout, separate from the per-request deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest response-body excerpt carried into failure messages.
const BODY_SNIPPET_LEN: usize = 200;

/// Fetches records over HTTP, one GET per identifier.
///
/// Performs no retrying of its own; every call is a single round-trip whose
/// result is classified for the scheduler.
#[derive(Debug, Clone)]
pub struct HttpRecordFetcher {
    client: Client,
    url_template: String,
    credential: Credential,
}

impl HttpRecordFetcher {
    /// Build a fetcher for `url_template`, which must contain `{id}`.
    pub fn new(
        url_template: &str,
        credential: Credential,
        user_agent: &str,
        request_timeout: Duration,
    ) -> Result<Self, FetcherError> {
        if !url_template.contains(ID_PLACEHOLDER) {
            return Err(FetcherError::InvalidTemplate(url_template.to_string()));
        }
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            url_template: url_template.to_string(),
            credential,
        })
    }

    fn request_url(&self, identifier: &str) -> String {
        self.url_template.replace(ID_PLACEHOLDER, identifier)
    }
}

#[async_trait]
impl RecordFetcher for HttpRecordFetcher {
    async fn fetch_record(&self, identifier: &str) -> FetchResult {
        let url = self.request_url(identifier);
        debug!(identifier, url = %url, "sending fetch request");

        let mut request = self.client.get(&url);
        request = match &self.credential {
            Credential::Anonymous => request,
            Credential::Bearer(token) => request.bearer_auth(token),
            Credential::QueryParam { name, value } => {
                request.query(&[(name.as_str(), value.as_str())])
            }
        };

        match request.send().await {
            Ok(response) => classify_response(response).await,
            Err(error) => Err(classify_transport_error(&error)),
        }
    }
}

/// Map a transport-level `reqwest` error onto the failure taxonomy.
fn classify_transport_error(error: &reqwest::Error) -> FetchFailure {
    if error.is_timeout() {
        FetchFailure::timeout(format!("request timed out: {error}"))
    } else {
        FetchFailure::server_error(None, format!("transport error: {error}"))
    }
}

/// Turn an HTTP response into a payload or a classified failure.
async fn classify_response(response: Response) -> FetchResult {
    let status = response.status();

    if status.is_success() {
        return match response.json::<serde_json::Value>().await {
            Ok(payload) => Ok(payload),
            Err(error) => Err(FetchFailure::client_error(
                Some(status.as_u16()),
                format!("response body was not valid JSON: {error}"),
            )),
        };
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after_hint(response.headers());
        let body = body_snippet(response).await;
        return Err(FetchFailure::rate_limited(
            status.as_u16(),
            format!("rate limited by server: {body}"),
            retry_after,
        ));
    }

    if status.is_server_error() {
        let code = status.as_u16();
        let body = body_snippet(response).await;
        return Err(FetchFailure::server_error(
            Some(code),
            format!("server error {code}: {body}"),
        ));
    }

    if status.is_client_error() {
        let code = status.as_u16();
        if code == 401 || code == 403 {
            error!(code, "authentication rejected; check the token or API key");
        }
        let body = body_snippet(response).await;
        return Err(FetchFailure::client_error(
            Some(code),
            format!("client error {code}: {body}"),
        ));
    }

    // 1xx/3xx leaking through redirect handling; treat as transient.
    Err(FetchFailure::server_error(
        Some(status.as_u16()),
        format!("unexpected status {status}"),
    ))
}

/// Extract a server wait hint from `Retry-After` or `X-RateLimit-Reset`.
///
/// Both are interpreted as a span of seconds; HTTP-date forms of
/// `Retry-After` are ignored rather than guessed at.
fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    for name in ["retry-after", "x-ratelimit-reset"] {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        if let Ok(secs) = value.trim().parse::<f64>() {
            if secs.is_finite() && secs >= 0.0 {
                return Some(Duration::from_secs_f64(secs));
            }
        }
    }
    None
}

async fn body_snippet(response: Response) -> String {
    let mut text = response.text().await.unwrap_or_default();
    if text.len() > BODY_SNIPPET_LEN {
        let mut cut = BODY_SNIPPET_LEN;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    if text.is_empty() {
        "<empty body>".to_string()
    } else {
        text
    }
}
