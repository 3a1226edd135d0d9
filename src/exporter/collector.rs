//! Terminal outcome accounting.
//!
//! A [`ResultCollector`] is seeded with the run's identifier set and accepts
//! exactly one [`Outcome`] per identifier. Recording an unknown or
//! already-recorded identifier is a broken scheduler contract, surfaced as a
//! typed error so the run aborts instead of silently double-counting.

use std::collections::HashMap;
use std::time::Duration;

use crate::FailureKind;

/// Terminal result of one identifier. Immutable once created.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The payload was fetched.
    Success {
        /// Parsed response body.
        payload: serde_json::Value,
        /// Total fetch attempts made, including the successful one.
        attempts: u32,
        /// Wall time from the first attempt to the terminal transition.
        elapsed: Duration,
    },
    /// Retries were exhausted, the failure was terminal, or the run stopped.
    Failed(FailureRecord),
}

/// Everything known about a failed identifier.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// The identifier that failed.
    pub id: String,
    /// Classification of the final failure.
    pub kind: FailureKind,
    /// HTTP status of the final response, when there was one.
    pub status: Option<u16>,
    /// Human-readable description of the final failure.
    pub message: String,
    /// Fetch attempts made before giving up; zero for never-started work.
    pub attempts: u32,
    /// Wall time from the first attempt to the terminal transition.
    pub elapsed: Duration,
}

/// A succeeded identifier with its payload, for the final report.
#[derive(Debug, Clone)]
pub struct SuccessRecord {
    /// The identifier that succeeded.
    pub id: String,
    /// Parsed response body.
    pub payload: serde_json::Value,
    /// Total fetch attempts made, including the successful one.
    pub attempts: u32,
    /// Wall time from the first attempt to the terminal transition.
    pub elapsed: Duration,
}

/// Complete accounting of a finished run, both lists ordered by the
/// identifiers' original input positions.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Identifiers that ended `Succeeded`.
    pub succeeded: Vec<SuccessRecord>,
    /// Identifiers that ended `Failed` or `Cancelled`.
    pub failed: Vec<FailureRecord>,
}

impl RunReport {
    /// Total identifiers accounted for.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether every identifier succeeded.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Contract violations around outcome recording.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// `record` was called twice for one identifier.
    #[error("outcome already recorded for identifier {0}")]
    DuplicateRecord(String),

    /// `record` was called for an identifier outside the run's input set.
    #[error("identifier {0} is not part of this run")]
    UnknownIdentifier(String),

    /// `finalize` was called while identifiers were still unaccounted for.
    #[error("{0} identifiers have no recorded outcome")]
    Incomplete(usize),
}

/// Accumulates one terminal outcome per identifier, exactly once.
#[derive(Debug)]
pub struct ResultCollector {
    /// Input position of each identifier.
    positions: HashMap<String, usize>,
    /// Identifiers in input order.
    ids: Vec<String>,
    /// One slot per identifier, filled on its terminal transition.
    outcomes: Vec<Option<Outcome>>,
    recorded: usize,
}

impl ResultCollector {
    /// Seed the collector with the run's unique identifier set.
    pub fn new(ids: &[String]) -> Self {
        let positions = ids
            .iter()
            .enumerate()
            .map(|(index, id)| (id.clone(), index))
            .collect();
        Self {
            positions,
            ids: ids.to_vec(),
            outcomes: vec![None; ids.len()],
            recorded: 0,
        }
    }

    /// Record the terminal outcome for `id`.
    pub fn record(&mut self, id: &str, outcome: Outcome) -> Result<(), CollectorError> {
        let index = *self
            .positions
            .get(id)
            .ok_or_else(|| CollectorError::UnknownIdentifier(id.to_string()))?;
        if self.outcomes[index].is_some() {
            return Err(CollectorError::DuplicateRecord(id.to_string()));
        }
        self.outcomes[index] = Some(outcome);
        self.recorded += 1;
        Ok(())
    }

    /// Identifiers with a recorded outcome so far.
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Whether every identifier has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.recorded == self.ids.len()
    }

    /// Consume the collector into the final report.
    ///
    /// Callable only once the run is complete; an unfilled slot means the
    /// scheduler terminated early and is reported as such.
    pub fn finalize(self) -> Result<RunReport, CollectorError> {
        let missing = self.ids.len() - self.recorded;
        if missing > 0 {
            return Err(CollectorError::Incomplete(missing));
        }

        let mut report = RunReport::default();
        for (id, slot) in self.ids.into_iter().zip(self.outcomes) {
            match slot {
                Some(Outcome::Success {
                    payload,
                    attempts,
                    elapsed,
                }) => report.succeeded.push(SuccessRecord {
                    id,
                    payload,
                    attempts,
                    elapsed,
                }),
                Some(Outcome::Failed(record)) => report.failed.push(record),
                None => unreachable!("missing outcomes were counted above"),
            }
        }
        Ok(report)
    }
}
