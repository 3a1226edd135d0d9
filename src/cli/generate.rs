//! `generate` command: offline placeholder documents.

use std::time::Instant;

use clap::Args;
use tracing::{debug, info};

use super::{CliError, IoArgs, RunSummary};
use crate::input;
use crate::output::{self, JsonlWriter};

/// Arguments for the `generate` command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Input and artifact flags.
    #[command(flatten)]
    pub io: IoArgs,
}

impl GenerateArgs {
    /// Write one placeholder document per identifier.
    pub fn execute(&self) -> Result<RunSummary, CliError> {
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
        let mut jsonl = self
            .io
            .jsonl
            .then(|| JsonlWriter::create(&self.io.output_dir.join(output::JSONL_FILE)))
            .transpose()?;
        let mut documents = Vec::new();
        let mut generated = 0usize;
        let mut skipped = 0usize;

        for id in &ids {
            let existing = self
                .io
                .skip_existing
                .then(|| output::existing_payload(&self.io.output_dir, id))
                .flatten();
            let document = match existing {
                Some(existing) => {
                    debug!(id, "keeping existing artifact");
                    skipped += 1;
                    existing
                }
                None => {
                    let document = output::placeholder_document(id);
                    output::write_record(&self.io.output_dir, id, &document)?;
                    generated += 1;
                    document
                }
            };

            if let Some(writer) = jsonl.as_mut() {
                writer.append(&document)?;
            }
            if self.io.combined {
                documents.push(document);
            }
        }

        if let Some(writer) = jsonl {
            writer.close()?;
        }
        if self.io.combined {
            let path = output::write_combined(&self.io.output_dir, &documents)?;
            info!(count = documents.len(), path = %path.display(), "wrote combined artifact");
        }

        info!(generated, skipped, "placeholder generation finished");
        Ok(RunSummary {
            succeeded: generated,
            failed: 0,
            skipped,
            elapsed: started.elapsed(),
        })
    }
}
