//! CSV identifier extraction.
//!
//! Exports are driven by a CSV file with one identifier per row. The column
//! holding identifiers is located by header name when possible; headerless
//! files fall back to the first column.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::{debug, warn};

use super::InputError;

/// Header names (lowercased) recognized as the identifier column.
const ID_HEADER_NAMES: [&str; 3] = ["id", "engagement_id", "engagementid"];

/// Read the ordered, deduplicated identifier list from a CSV file.
///
/// Column selection: if any cell of the first row matches a recognized header
/// name (case-insensitive), that column is used and the first row is treated
/// as a header. Otherwise column 0 is used; the first row then counts as data
/// only when its first cell is all digits, since an unrecognized textual cell
/// is almost certainly an unnamed header.
///
/// Empty cells are skipped, values are trimmed, and duplicates are dropped
/// (first occurrence wins) so the scheduler sees each identifier exactly once.
pub fn read_identifiers(path: &Path) -> Result<Vec<String>, InputError> {
    let file = File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut records = reader.records();
    let first = match records.next() {
        Some(record) => record.map_err(|source| InputError::Csv {
            path: path.to_path_buf(),
            source,
        })?,
        None => return Err(InputError::Empty(path.to_path_buf())),
    };

    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut duplicates = 0usize;

    let column = match locate_id_column(&first) {
        Some(column) => column,
        None => {
            // No recognized header; first row is data only when it looks like
            // an identifier rather than an unnamed textual header.
            let leading = first.get(0).map(clean_cell).unwrap_or_default();
            if !leading.is_empty() && leading.chars().all(|c| c.is_ascii_digit()) {
                push_id(&mut ids, &mut seen, &mut duplicates, first.get(0));
            }
            0
        }
    };

    for record in records {
        let record = record.map_err(|source| InputError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        push_id(&mut ids, &mut seen, &mut duplicates, record.get(column));
    }

    if duplicates > 0 {
        warn!(
            duplicates,
            path = %path.display(),
            "dropped duplicate identifiers from input"
        );
    }
    if ids.is_empty() {
        return Err(InputError::Empty(path.to_path_buf()));
    }
    debug!(count = ids.len(), column, path = %path.display(), "loaded identifiers");
    Ok(ids)
}

/// Find the identifier column by header name, if the first row is a header.
fn locate_id_column(first: &csv::StringRecord) -> Option<usize> {
    first.iter().position(|cell| {
        let lowered = clean_cell(cell).to_ascii_lowercase();
        ID_HEADER_NAMES.contains(&lowered.as_str())
    })
}

/// Append one cleaned identifier, dropping empties and repeats.
fn push_id(
    ids: &mut Vec<String>,
    seen: &mut HashSet<String>,
    duplicates: &mut usize,
    raw: Option<&str>,
) {
    let Some(value) = raw.map(clean_cell).filter(|v| !v.is_empty()) else {
        return;
    };
    if seen.insert(value.clone()) {
        ids.push(value);
    } else {
        *duplicates += 1;
    }
}

/// Trim whitespace and any UTF-8 BOM carried into the first cell.
fn clean_cell(cell: &str) -> String {
    cell.trim_matches('\u{feff}').trim().to_string()
}
