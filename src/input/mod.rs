//! Identifier input sources.
//!
//! The scheduler only requires an ordered list of unique identifier strings;
//! this module produces one from the supported sources (currently a CSV
//! column).

use std::path::PathBuf;

mod csv;

pub use csv::read_identifiers;

/// Errors raised while loading identifiers.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The input file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The CSV content could not be parsed.
    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: ::csv::Error,
    },

    /// The input parsed but yielded no identifiers.
    #[error("no identifiers found in {0}")]
    Empty(PathBuf),
}
