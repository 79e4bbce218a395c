//! CSV output for reconstructed tables
//!
//! One CSV per document, plus an optional combined file concatenating every
//! schema-identical per-document output. Tables are written and read through
//! [`RosterTable`] so the width invariant holds at both ends.

use std::path::Path;

use tracing::{info, warn};

use crate::app::models::RosterTable;
use crate::{Error, Result};

/// Write a table to a CSV file, header first
pub fn write_table(table: &RosterTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        Error::csv_parsing(path.display().to_string(), "Failed to create CSV file", Some(e))
    })?;

    writer.write_record(&table.columns).map_err(|e| {
        Error::csv_parsing(path.display().to_string(), "Failed to write header", Some(e))
    })?;

    for row in &table.rows {
        writer.write_record(row).map_err(|e| {
            Error::csv_parsing(path.display().to_string(), "Failed to write row", Some(e))
        })?;
    }

    writer.flush()?;
    info!("Wrote {} rows to {}", table.row_count(), path.display());
    Ok(())
}

/// Read a CSV file back into a table
pub fn read_table(path: &Path) -> Result<RosterTable> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        Error::csv_parsing(path.display().to_string(), "Failed to open CSV file", Some(e))
    })?;

    let headers = reader
        .headers()
        .map_err(|e| {
            Error::csv_parsing(path.display().to_string(), "Failed to read header", Some(e))
        })?
        .clone();

    let mut table = RosterTable::new(headers.iter().map(|h| h.to_string()).collect());
    for record in reader.records() {
        let record = record.map_err(|e| {
            Error::csv_parsing(path.display().to_string(), "Failed to read record", Some(e))
        })?;
        table
            .push_row(record.iter().map(|f| f.to_string()).collect())
            .map_err(|e| Error::csv_parsing(path.display().to_string(), e.to_string(), None))?;
    }

    Ok(table)
}

/// Concatenate per-document outputs into one combined file
///
/// Unreadable inputs are skipped with a warning; files whose schema differs
/// from the first readable one are skipped too, since silently unioning
/// mismatched columns would scramble the combined table. Returns the number
/// of files merged, 0 when nothing usable was found (no combined file is
/// written in that case).
pub fn merge_output_files(paths: &[std::path::PathBuf], output: &Path) -> Result<usize> {
    let mut combined: Option<RosterTable> = None;
    let mut merged = 0usize;

    for path in paths {
        let table = match read_table(path) {
            Ok(table) => table,
            Err(e) => {
                warn!("Skipping unreadable output {}: {}", path.display(), e);
                continue;
            }
        };

        match combined.as_mut() {
            None => {
                combined = Some(table);
                merged += 1;
            }
            Some(acc) => {
                if acc.columns != table.columns {
                    warn!(
                        "Skipping {}: schema differs from combined output",
                        path.display()
                    );
                    continue;
                }
                acc.extend_from(table)?;
                merged += 1;
            }
        }
    }

    match combined {
        Some(table) => {
            write_table(&table, output)?;
            info!(
                "Combined {} files ({} rows) into {}",
                merged,
                table.row_count(),
                output.display()
            );
            Ok(merged)
        }
        None => {
            warn!("No readable outputs to combine");
            Ok(0)
        }
    }
}
