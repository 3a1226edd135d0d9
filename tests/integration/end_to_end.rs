//! Full pipeline over a mock HTTP server: real fetcher, real scheduler.

use std::sync::Arc;
use std::time::Duration;

use engagement_exporter::exporter::{ExportConfig, Scheduler};
use engagement_exporter::fetcher::{Credential, HttpRecordFetcher};
use engagement_exporter::FailureKind;
use httpmock::MockServer;
use serde_json::json;

use super::support::ids;

fn http_config() -> ExportConfig {
    ExportConfig {
        concurrency: 2,
        rate_limit: 1_000.0,
        request_timeout: Duration::from_secs(5),
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(200),
        retry_window: Duration::from_secs(60),
        jitter: 0.0,
        ..ExportConfig::default()
    }
}

#[tokio::test]
async fn fetches_payloads_and_classifies_failures() {
    let server = MockServer::start();
    let ok_mock = server.mock(|when, then| {
        when.method(httpmock::Method::GET)
            .path("/engagements/101")
            .header("authorization", "Bearer test-token");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"engagement": {"id": 101, "type": "NOTE"}}));
    });
    server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/engagements/102");
        then.status(404).body("{\"status\":\"error\"}");
    });

    let fetcher = HttpRecordFetcher::new(
        &format!("{}/engagements/{{id}}", server.base_url()),
        Credential::Bearer("test-token".into()),
        "engagement-exporter-tests/1.0",
        Duration::from_secs(5),
    )
    .unwrap();

    let report = Scheduler::new(http_config(), Arc::new(fetcher))
        .unwrap()
        .run(ids(&["101", "102"]))
        .await
        .unwrap();

    ok_mock.assert();
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.succeeded[0].id, "101");
    assert_eq!(report.succeeded[0].payload["engagement"]["type"], "NOTE");

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "102");
    assert_eq!(report.failed[0].kind, FailureKind::ClientError);
    assert_eq!(report.failed[0].status, Some(404));
}

#[tokio::test]
async fn persistent_server_errors_exhaust_the_window() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/engagements/7");
        then.status(500).body("internal error");
    });

    let config = ExportConfig {
        retry_window: Duration::from_millis(350),
        ..http_config()
    };
    let fetcher = HttpRecordFetcher::new(
        &format!("{}/engagements/{{id}}", server.base_url()),
        Credential::Anonymous,
        "engagement-exporter-tests/1.0",
        Duration::from_secs(5),
    )
    .unwrap();

    let report = Scheduler::new(config, Arc::new(fetcher))
        .unwrap()
        .with_jitter_source(Arc::new(|| 0.0))
        .run(ids(&["7"]))
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    let record = &report.failed[0];
    assert_eq!(record.kind, FailureKind::ServerError);
    assert_eq!(record.status, Some(500));
    assert!(record.attempts >= 2, "attempts: {}", record.attempts);
    assert!(mock.hits() >= 2);
}
