//! Data models for roster extraction
//!
//! This module contains the core data structures for representing OCR text
//! fragments, reconstructed roster tables, extraction attempts, and the
//! per-file bookkeeping types shared by the batch orchestrator and validator.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// OCR Fragment Structures
// =============================================================================

/// A unit of recognized text with its page-normalized position
///
/// Produced by the OCR collaborator. Coordinates are in [0, 1] with the
/// origin at the top-left of the page; `x` is the left edge of the fragment,
/// `y` its top edge. Positions outside [0, 1] occur in noisy scans and are
/// handled by the column classifier, not rejected here.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TextFragment {
    /// Recognized line text
    pub text: String,

    /// Left edge, page-normalized
    pub x: f64,

    /// Top edge, page-normalized
    pub y: f64,

    /// Mean per-word recognition confidence, when the engine reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl TextFragment {
    /// Create a fragment without recognition confidence
    pub fn new(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            confidence: None,
        }
    }
}

/// One page of an OCR fragment dump
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PageFragments {
    /// 1-indexed page number within the source document
    pub page: u32,

    /// Recognized lines in reading order
    pub lines: Vec<TextFragment>,
}

// =============================================================================
// Roster Table Structure
// =============================================================================

/// A reconstructed table: ordered column names plus rows of equal width
///
/// Rows are positional; cell access by column name goes through
/// [`RosterTable::column_index`]. The width invariant is enforced on every
/// mutation so downstream CSV writing never sees ragged rows.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RosterTable {
    /// Ordered column names (the CSV header)
    pub columns: Vec<String>,

    /// Data rows; every row has exactly `columns.len()` cells
    pub rows: Vec<Vec<String>>,
}

impl RosterTable {
    /// Create an empty table with the given column schema
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create an empty table with the standard assembled-output schema
    /// (five roster columns plus derived State and Postmaster)
    pub fn with_output_schema() -> Self {
        Self::new(crate::constants::output_columns())
    }

    /// Number of data rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell value by row index and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col)).map(|s| s.as_str())
    }

    /// Append a row, enforcing the width invariant
    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::data_validation(format!(
                "Row width {} does not match table width {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append all rows of another table with an identical schema
    pub fn extend_from(&mut self, other: RosterTable) -> Result<()> {
        if self.columns != other.columns {
            return Err(Error::data_validation(format!(
                "Cannot concatenate tables with differing schemas: {:?} vs {:?}",
                self.columns, other.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }
}

// =============================================================================
// Extraction Attempt Structure
// =============================================================================

/// One parse result: a table plus a structural confidence score in [0, 1]
///
/// Confidence measures field-count agreement, not semantic correctness. A
/// zero-confidence empty attempt signals total failure for that attempt
/// without being a hard fault, so repeated attempts compare uniformly.
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    /// Best-effort reconstructed table (possibly empty)
    pub table: RosterTable,

    /// Structural confidence in [0, 1]
    pub confidence: f64,
}

impl ExtractionAttempt {
    /// Create an attempt, clamping confidence into [0, 1]
    pub fn new(table: RosterTable, confidence: f64) -> Self {
        Self {
            table,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A failed attempt: empty table, zero confidence
    pub fn failed(columns: Vec<String>) -> Self {
        Self {
            table: RosterTable::new(columns),
            confidence: 0.0,
        }
    }

    /// Whether this attempt carries any usable data
    pub fn is_usable(&self) -> bool {
        self.confidence > 0.0 && !self.table.is_empty()
    }

    /// Whether this attempt strictly improves on another
    pub fn improves_on(&self, other: Option<&ExtractionAttempt>) -> bool {
        match other {
            Some(best) => self.is_usable() && self.confidence > best.confidence,
            None => self.is_usable(),
        }
    }
}

// =============================================================================
// Ledger Structures
// =============================================================================

/// Outcome category for one processed input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// File processed and rows extracted
    Success,

    /// File processed but no rows detected (legitimate for sparse pages)
    EmptyOutput,

    /// The per-file pipeline returned an error
    Error,

    /// The worker task itself failed (panic or cancellation)
    ExecutorError,
}

impl LedgerStatus {
    /// All status values, for report aggregation
    pub fn all_values() -> [LedgerStatus; 4] {
        [
            LedgerStatus::Success,
            LedgerStatus::EmptyOutput,
            LedgerStatus::Error,
            LedgerStatus::ExecutorError,
        ]
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LedgerStatus::Success => "success",
            LedgerStatus::EmptyOutput => "empty_output",
            LedgerStatus::Error => "error",
            LedgerStatus::ExecutorError => "executor_error",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for LedgerStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "success" => Ok(LedgerStatus::Success),
            "empty_output" => Ok(LedgerStatus::EmptyOutput),
            "error" => Ok(LedgerStatus::Error),
            "executor_error" => Ok(LedgerStatus::ExecutorError),
            _ => Err(Error::data_validation(format!(
                "Invalid ledger status '{}'",
                s
            ))),
        }
    }
}

/// Per-input-file outcome, appended to the running batch ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Input file path
    pub file: String,

    /// Outcome category
    pub status: LedgerStatus,

    /// Rows extracted (0 for failures)
    pub rows: usize,

    /// Wall-clock processing time in seconds
    pub processing_time: f64,

    /// Error detail for failed files (empty in the CSV for successes)
    #[serde(default)]
    pub error: Option<String>,
}

impl LedgerEntry {
    /// Entry for a successfully processed file
    pub fn success(file: impl Into<String>, rows: usize, processing_time: f64) -> Self {
        let status = if rows == 0 {
            LedgerStatus::EmptyOutput
        } else {
            LedgerStatus::Success
        };
        Self {
            file: file.into(),
            status,
            rows,
            processing_time,
            error: None,
        }
    }

    /// Entry for a file whose pipeline failed
    pub fn failure(file: impl Into<String>, processing_time: f64, error: &Error) -> Self {
        Self {
            file: file.into(),
            status: LedgerStatus::Error,
            rows: 0,
            processing_time,
            error: Some(error.to_string()),
        }
    }

    /// Entry for a worker task that died before reporting
    pub fn executor_failure(file: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: LedgerStatus::ExecutorError,
            rows: 0,
            processing_time: 0.0,
            error: Some(detail.into()),
        }
    }
}

// =============================================================================
// Validation Report Structure
// =============================================================================

/// Structured verdict for one finished table
///
/// Derived and immutable: issues block (the table is not trustworthy),
/// warnings inform. Data-quality findings never become errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Source file or document the table came from
    pub file: String,

    /// False when any blocking issue was found
    pub valid: bool,

    /// Blocking issues, in detection order
    pub issues: Vec<String>,

    /// Non-blocking warnings, in detection order
    pub warnings: Vec<String>,

    /// Rows in the validated table
    pub row_count: usize,
}

impl ValidationReport {
    /// Create a passing report for a table with the given row count
    pub fn passing(file: impl Into<String>, row_count: usize) -> Self {
        Self {
            file: file.into(),
            valid: true,
            issues: Vec::new(),
            warnings: Vec::new(),
            row_count,
        }
    }

    /// Record a blocking issue, marking the report invalid
    pub fn add_issue(&mut self, issue: impl Into<String>) {
        self.valid = false;
        self.issues.push(issue.into());
    }

    /// Record a non-blocking warning
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> RosterTable {
        let mut table = RosterTable::new(vec!["Name".to_string(), "State".to_string()]);
        table
            .push_row(vec!["Smith, John".to_string(), "Ohio".to_string()])
            .unwrap();
        table
    }

    mod roster_table_tests {
        use super::*;

        #[test]
        fn test_push_row_enforces_width() {
            let mut table = sample_table();
            assert!(table.push_row(vec!["only one".to_string()]).is_err());
            assert_eq!(table.row_count(), 1);
        }

        #[test]
        fn test_cell_access_by_name() {
            let table = sample_table();
            assert_eq!(table.cell(0, "Name"), Some("Smith, John"));
            assert_eq!(table.cell(0, "State"), Some("Ohio"));
            assert_eq!(table.cell(0, "Missing"), None);
            assert_eq!(table.cell(5, "Name"), None);
        }

        #[test]
        fn test_extend_from_matching_schema() {
            let mut table = sample_table();
            let other = sample_table();
            table.extend_from(other).unwrap();
            assert_eq!(table.row_count(), 2);
        }

        #[test]
        fn test_extend_from_rejects_mismatched_schema() {
            let mut table = sample_table();
            let other = RosterTable::new(vec!["Name".to_string()]);
            assert!(table.extend_from(other).is_err());
        }

        #[test]
        fn test_output_schema() {
            let table = RosterTable::with_output_schema();
            assert_eq!(table.columns.len(), 7);
            assert!(table.column_index("Postmaster").is_some());
        }
    }

    mod extraction_attempt_tests {
        use super::*;

        #[test]
        fn test_confidence_clamped() {
            let attempt = ExtractionAttempt::new(sample_table(), 1.7);
            assert_eq!(attempt.confidence, 1.0);

            let attempt = ExtractionAttempt::new(sample_table(), -0.2);
            assert_eq!(attempt.confidence, 0.0);
        }

        #[test]
        fn test_failed_attempt_is_not_usable() {
            let attempt = ExtractionAttempt::failed(vec!["Name".to_string()]);
            assert!(!attempt.is_usable());
            assert_eq!(attempt.confidence, 0.0);
        }

        #[test]
        fn test_improves_on_ordering() {
            let low = ExtractionAttempt::new(sample_table(), 0.6);
            let high = ExtractionAttempt::new(sample_table(), 0.8);
            let dead = ExtractionAttempt::failed(vec!["Name".to_string()]);

            assert!(high.improves_on(Some(&low)));
            assert!(!low.improves_on(Some(&high)));
            assert!(low.improves_on(None));
            // A dead attempt never displaces anything
            assert!(!dead.improves_on(Some(&low)));
            assert!(!dead.improves_on(None));
        }
    }

    mod ledger_tests {
        use super::*;

        #[test]
        fn test_status_round_trip() {
            for status in LedgerStatus::all_values() {
                let text = status.to_string();
                assert_eq!(LedgerStatus::from_str(&text).unwrap(), status);
            }
            assert!(LedgerStatus::from_str("bogus").is_err());
        }

        #[test]
        fn test_success_entry_downgrades_to_empty_output() {
            let entry = LedgerEntry::success("a.json", 0, 1.2);
            assert_eq!(entry.status, LedgerStatus::EmptyOutput);

            let entry = LedgerEntry::success("a.json", 12, 1.2);
            assert_eq!(entry.status, LedgerStatus::Success);
        }

        #[test]
        fn test_failure_entry_carries_detail() {
            let err = Error::file_not_found("missing.json");
            let entry = LedgerEntry::failure("missing.json", 0.1, &err);
            assert_eq!(entry.status, LedgerStatus::Error);
            assert!(entry.error.unwrap().contains("missing.json"));
        }
    }

    mod validation_report_tests {
        use super::*;

        #[test]
        fn test_issue_invalidates_report() {
            let mut report = ValidationReport::passing("a.csv", 10);
            assert!(report.valid);
            report.add_warning("minor");
            assert!(report.valid);
            report.add_issue("missing column");
            assert!(!report.valid);
            assert_eq!(report.issues.len(), 1);
            assert_eq!(report.warnings.len(), 1);
        }
    }
}
