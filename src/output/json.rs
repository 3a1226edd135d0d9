//! Per-record, JSONL, combined, and summary artifact writers.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::debug;

use super::{OutputError, COMBINED_FILE, ERROR_SUMMARY_FILE};
use crate::exporter::FailureRecord;

/// Suffix of the temporary sibling used for atomic replacement.
const PART_SUFFIX: &str = ".part";

/// Destination of one identifier's artifact inside `dir`.
///
/// Identifiers land in filenames, so path separators and drive markers are
/// flattened to underscores.
pub fn record_path(dir: &Path, id: &str) -> PathBuf {
    let stem: String = id.replace(['/', '\\', ':'], "_");
    dir.join(format!("{stem}.json"))
}

/// Serialize `value` to `path` atomically via a `.part` sibling.
fn write_json_atomic(path: &Path, value: &Value, pretty: bool) -> Result<(), OutputError> {
    let serialized = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    }
    .map_err(|source| OutputError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let mut part = path.as_os_str().to_owned();
    part.push(PART_SUFFIX);
    let part = PathBuf::from(part);

    std::fs::write(&part, serialized).map_err(|source| OutputError::io(&part, source))?;
    std::fs::rename(&part, path).map_err(|source| OutputError::io(path, source))
}

/// Write one identifier's document as a pretty-printed per-ID file.
pub fn write_record(dir: &Path, id: &str, document: &Value) -> Result<PathBuf, OutputError> {
    let path = record_path(dir, id);
    write_json_atomic(&path, document, true)?;
    debug!(id, path = %path.display(), "wrote record artifact");
    Ok(path)
}

/// Load the stored payload for `id` if a parseable per-ID file already
/// exists. A missing or corrupt file means the identifier still needs
/// fetching.
pub fn existing_payload(dir: &Path, id: &str) -> Option<Value> {
    let path = record_path(dir, id);
    let content = std::fs::read(&path).ok()?;
    serde_json::from_slice(&content).ok()
}

/// Write the combined pretty-printed array artifact.
pub fn write_combined(dir: &Path, documents: &[Value]) -> Result<PathBuf, OutputError> {
    let path = dir.join(COMBINED_FILE);
    write_json_atomic(&path, &Value::Array(documents.to_vec()), true)?;
    Ok(path)
}

/// Write the error summary, or nothing when every identifier succeeded.
pub fn write_error_summary(
    dir: &Path,
    total_processed: usize,
    errors: &[Value],
) -> Result<Option<PathBuf>, OutputError> {
    if errors.is_empty() {
        return Ok(None);
    }
    let path = dir.join(ERROR_SUMMARY_FILE);
    let summary = json!({
        "total_processed": total_processed,
        "error_count": errors.len(),
        "errors": errors,
    });
    write_json_atomic(&path, &summary, true)?;
    Ok(Some(path))
}

/// The error document persisted for a terminally failed identifier.
pub fn error_document(record: &FailureRecord) -> Value {
    json!({
        "id": record.id,
        "error": {
            "status_code": record.status,
            "failure_kind": record.kind.as_str(),
            "message": record.message,
            "attempts": record.attempts,
            "elapsed_secs": record.elapsed.as_secs_f64(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        },
    })
}

/// The offline stand-in document written by `generate` mode.
pub fn placeholder_document(id: &str) -> Value {
    json!({
        "id": id,
        "placeholder": true,
        "generated_at": chrono::Utc::now().to_rfc3339(),
    })
}

/// Appends one compact JSON document per line, flushed as results arrive so
/// an interrupted run keeps everything written so far.
#[derive(Debug)]
pub struct JsonlWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl JsonlWriter {
    /// Create (or truncate) the JSONL artifact at `path`.
    pub fn create(path: &Path) -> Result<Self, OutputError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| OutputError::io(path, source))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Append one document as a compact single line.
    pub fn append(&mut self, document: &Value) -> Result<(), OutputError> {
        serde_json::to_writer(&mut self.writer, document).map_err(|source| {
            OutputError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;
        self.writer
            .write_all(b"\n")
            .and_then(|()| self.writer.flush())
            .map_err(|source| OutputError::io(&self.path, source))
    }

    /// Flush and close the writer.
    pub fn close(mut self) -> Result<(), OutputError> {
        self.writer
            .flush()
            .map_err(|source| OutputError::io(&self.path, source))
    }
}
