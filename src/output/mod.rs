//! JSON artifact writers.
//!
//! Every artifact that replaces a file is written atomically: the content
//! goes to a `.part` sibling first, then a rename swings it into place, so a
//! crash mid-write never leaves a truncated artifact behind.

use std::path::{Path, PathBuf};

mod json;

pub use json::{
    error_document, existing_payload, placeholder_document, record_path, write_combined,
    write_error_summary, write_record, JsonlWriter,
};

/// JSONL artifact name inside the output directory.
pub const JSONL_FILE: &str = "engagements.jsonl";

/// Combined-array artifact name inside the output directory.
pub const COMBINED_FILE: &str = "engagements.json";

/// Error summary artifact name inside the output directory.
pub const ERROR_SUMMARY_FILE: &str = "error_summary.json";

/// Errors raised while writing artifacts.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// A file or directory operation failed.
    #[error("output I/O failed for {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A document could not be serialized.
    #[error("failed to serialize JSON for {path}: {source}")]
    Serialize {
        /// Destination the document was headed for.
        path: PathBuf,
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl OutputError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Create the output directory if it does not exist yet.
pub fn ensure_output_dir(dir: &Path) -> Result<(), OutputError> {
    std::fs::create_dir_all(dir).map_err(|source| OutputError::io(dir, source))
}
