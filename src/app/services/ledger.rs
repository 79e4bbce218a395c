//! Running batch ledger
//!
//! The per-file outcome record for a batch run. Entries accumulate in
//! completion order and the whole file is rewritten to disk after every
//! completed file, so partial results survive a crash mid-batch. Only the
//! orchestrator task writes; workers report through it.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::app::models::{LedgerEntry, LedgerStatus};
use crate::{Error, Result};

/// Append-only ledger backed by a wholesale-rewritten CSV file
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Create an empty ledger that persists to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Entries recorded so far, in completion order
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Path of the persisted ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an entry and rewrite the ledger file
    ///
    /// Rewriting the whole file per completion trades throughput for a
    /// simple durability story; batches are bounded (tens to low hundreds
    /// of files), so the O(n) rewrites stay cheap.
    pub fn record(&mut self, entry: LedgerEntry) -> Result<()> {
        debug!(
            "Ledger entry: {} -> {} ({} rows)",
            entry.file, entry.status, entry.rows
        );
        self.entries.push(entry);
        self.rewrite()
    }

    /// Rewrite the full ledger file from the in-memory entries
    pub fn rewrite(&self) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path).map_err(|e| {
            Error::csv_parsing(
                self.path.display().to_string(),
                "Failed to create ledger file",
                Some(e),
            )
        })?;

        for entry in &self.entries {
            writer.serialize(entry).map_err(|e| {
                Error::csv_parsing(
                    self.path.display().to_string(),
                    "Failed to write ledger entry",
                    Some(e),
                )
            })?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Aggregate statistics over the recorded entries
    pub fn summary(&self) -> LedgerSummary {
        let total_files = self.entries.len();
        let successful = self
            .entries
            .iter()
            .filter(|e| e.status == LedgerStatus::Success)
            .count();
        let total_rows = self.entries.iter().map(|e| e.rows).sum();
        let mean_processing_time = if total_files == 0 {
            0.0
        } else {
            self.entries.iter().map(|e| e.processing_time).sum::<f64>() / total_files as f64
        };
        let failures = self
            .entries
            .iter()
            .filter(|e| e.status != LedgerStatus::Success)
            .cloned()
            .collect();

        LedgerSummary {
            total_files,
            successful,
            total_rows,
            mean_processing_time,
            failures,
        }
    }
}

/// Aggregate batch statistics derived from the ledger
#[derive(Debug, Clone)]
pub struct LedgerSummary {
    /// Files with any recorded outcome
    pub total_files: usize,

    /// Files that produced rows
    pub successful: usize,

    /// Rows extracted across all files
    pub total_rows: usize,

    /// Mean wall-clock seconds per file
    pub mean_processing_time: f64,

    /// Entries that did not succeed, in completion order
    pub failures: Vec<LedgerEntry>,
}
