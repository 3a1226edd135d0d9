//! `fetch` command: the real export run.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::{debug, info};

use super::{CliError, IoArgs, RunSummary};
use crate::exporter::config::MAX_CONCURRENCY;
use crate::exporter::{self, EventReceiver, ExportConfig, ExportEvent, Scheduler};
use crate::fetcher::{Credential, HttpRecordFetcher};
use crate::output::{self, JsonlWriter, OutputError};
use crate::shutdown::SharedStop;
use crate::{input, metrics, FailureKind};

/// Default engagement endpoint; `{id}` is replaced per request.
const DEFAULT_URL_TEMPLATE: &str = "https://api.hubapi.com/engagements/v1/engagements/{id}";

/// Arguments for the `fetch` command.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Input and artifact flags.
    #[command(flatten)]
    pub io: IoArgs,

    /// URL template for one engagement; use {id} as the placeholder
    #[arg(long, default_value = DEFAULT_URL_TEMPLATE)]
    pub url_template: String,

    /// Bearer token for the Authorization header
    #[arg(long)]
    pub auth_token: Option<String>,

    /// Query parameter name when the API key travels in the query string
    #[arg(long, default_value = "hapikey")]
    pub api_key_name: String,

    /// API key value; a value starting with pat- is sent as a bearer token
    #[arg(long)]
    pub api_key_value: Option<String>,

    /// Number of concurrent workers (1-32)
    #[arg(long, default_value = "8", value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Maximum requests per second across all workers
    #[arg(long, default_value = "10.0", value_parser = parse_positive_f64)]
    pub rate_limit: f64,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "15.0", value_parser = parse_positive_f64)]
    pub timeout: f64,

    /// Retry window in hours; failing identifiers are abandoned after this
    #[arg(long, default_value = "72")]
    pub retry_window_hours: u64,

    /// First backoff delay in seconds
    #[arg(long, default_value = "60")]
    pub base_delay_secs: u64,

    /// Ceiling on any single backoff delay, in seconds
    #[arg(long, default_value = "28800")]
    pub max_delay_secs: u64,

    /// User-Agent header for outbound requests
    #[arg(long, default_value = "engagement-exporter/1.0")]
    pub user_agent: String,

    /// Expose Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

/// Parse and range-check the worker count.
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Parse a strictly positive floating-point argument.
fn parse_positive_f64(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("'{s}' must be a positive number"));
    }
    Ok(value)
}

/// Artifacts gathered by the event consumer.
struct Consumed {
    /// Every persisted document, for the combined artifact.
    documents: Vec<Value>,
    /// Error documents only, for the summary artifact.
    error_documents: Vec<Value>,
}

impl FetchArgs {
    fn export_config(&self) -> ExportConfig {
        ExportConfig {
            concurrency: self.concurrency,
            rate_limit: self.rate_limit,
            request_timeout: Duration::from_secs_f64(self.timeout),
            limit: self.io.limit,
            retry_window: Duration::from_secs(self.retry_window_hours * 60 * 60),
            base_delay: Duration::from_secs(self.base_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
            ..ExportConfig::default()
        }
    }

    /// Run the export; `stop` aborts it gracefully.
    pub async fn execute(&self, stop: SharedStop) -> Result<RunSummary, CliError> {
        let started = Instant::now();

        let mut ids = input::read_identifiers(&self.io.csv)?;
        info!(count = ids.len(), csv = %self.io.csv.display(), "loaded identifiers");
        if let Some(limit) = self.io.limit {
            if ids.len() > limit {
                info!(limit, "limiting run to first identifiers");
                ids.truncate(limit);
            }
        }

        output::ensure_output_dir(&self.io.output_dir)?;
        if let Some(addr) = self.metrics_addr {
            metrics::init_metrics(addr)?;
        }

        // Identifiers with a parseable artifact are not fetched again, but
        // their stored payloads still feed the JSONL and combined outputs.
        let mut skipped_docs: Vec<(String, Value)> = Vec::new();
        let to_fetch: Vec<String> = if self.io.skip_existing {
            ids.into_iter()
                .filter(|id| match output::existing_payload(&self.io.output_dir, id) {
                    Some(payload) => {
                        debug!(id, "skipping identifier with existing artifact");
                        skipped_docs.push((id.clone(), payload));
                        false
                    }
                    None => true,
                })
                .collect()
        } else {
            ids
        };
        let skipped = skipped_docs.len();
        if skipped > 0 {
            info!(skipped, "skipped identifiers with existing artifacts");
        }

        let mut jsonl = if self.io.jsonl {
            let mut writer = JsonlWriter::create(&self.io.output_dir.join(output::JSONL_FILE))?;
            for (_, payload) in &skipped_docs {
                writer.append(payload)?;
            }
            Some(writer)
        } else {
            None
        };
        // Stored payloads lead the combined array; fetched ones follow in
        // completion order.
        let mut documents: Vec<Value> = Vec::new();
        if self.io.combined {
            documents.extend(skipped_docs.into_iter().map(|(_, payload)| payload));
        }

        let credential = Credential::from_cli(
            self.auth_token.as_deref(),
            &self.api_key_name,
            self.api_key_value.as_deref(),
        );
        let fetcher = HttpRecordFetcher::new(
            &self.url_template,
            credential,
            &self.user_agent,
            Duration::from_secs_f64(self.timeout),
        )?;

        let bar = progress_bar(to_fetch.len() as u64);
        let (sender, receiver) = exporter::channel();
        let consumer = tokio::spawn(consume_events(
            receiver,
            self.io.output_dir.clone(),
            jsonl.take(),
            self.io.combined,
            bar.clone(),
        ));

        let report = Scheduler::new(self.export_config(), Arc::new(fetcher))?
            .with_stop(stop)
            .with_events(sender)
            .run(to_fetch)
            .await?;

        bar.finish_and_clear();
        let consumed = consumer
            .await
            .map_err(|e| CliError::InvalidArgument(format!("artifact writer task failed: {e}")))??;
        documents.extend(consumed.documents);

        if self.io.combined {
            let path = output::write_combined(&self.io.output_dir, &documents)?;
            info!(count = documents.len(), path = %path.display(), "wrote combined artifact");
        }
        let total_processed = report.total() + skipped;
        if let Some(path) = output::write_error_summary(
            &self.io.output_dir,
            total_processed,
            &consumed.error_documents,
        )? {
            info!(
                errors = consumed.error_documents.len(),
                path = %path.display(),
                "wrote error summary"
            );
        }

        Ok(RunSummary {
            succeeded: report.succeeded.len(),
            failed: report.failed.len(),
            skipped,
            elapsed: started.elapsed(),
        })
    }
}

/// Persist artifacts as terminal events arrive.
async fn consume_events(
    mut receiver: EventReceiver,
    output_dir: std::path::PathBuf,
    mut jsonl: Option<JsonlWriter>,
    keep_documents: bool,
    bar: ProgressBar,
) -> Result<Consumed, OutputError> {
    let mut consumed = Consumed {
        documents: Vec::new(),
        error_documents: Vec::new(),
    };

    while let Some(event) = receiver.recv().await {
        match event {
            ExportEvent::Fetched { id, payload, .. } => {
                output::write_record(&output_dir, &id, &payload)?;
                if let Some(writer) = jsonl.as_mut() {
                    writer.append(&payload)?;
                }
                if keep_documents {
                    consumed.documents.push(payload);
                }
                bar.inc(1);
            }
            ExportEvent::Failed { record } => {
                // Cancelled identifiers carry no fetch verdict; they appear
                // in the report and summary only.
                if record.kind != FailureKind::Cancelled {
                    let document = output::error_document(&record);
                    output::write_record(&output_dir, &record.id, &document)?;
                    if let Some(writer) = jsonl.as_mut() {
                        writer.append(&document)?;
                    }
                    consumed.error_documents.push(document.clone());
                    if keep_documents {
                        consumed.documents.push(document);
                    }
                }
                bar.inc(1);
            }
            ExportEvent::RetryScheduled { id, delay, .. } => {
                bar.set_message(format!(
                    "{id} retrying in {}",
                    exporter::progress::format_duration(delay)
                ));
            }
        }
    }

    if let Some(writer) = jsonl {
        writer.close()?;
    }
    Ok(consumed)
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .expect("hardcoded template is valid")
            .progress_chars("#>-"),
    );
    bar
}
