//! Table validation against schema and domain invariants
//!
//! A pure check over a finished table: schema problems and unresolved ditto
//! markers block, data-quality observations warn. Validation never fails on
//! data quality; only unreadable input is an error, and that happens in the
//! file-reading wrapper, not here.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::app::models::{RosterTable, ValidationReport};
use crate::constants::{
    self, COMPENSATION_EXAMPLE_LIMIT, DEFAULT_MAX_EMPTY_PERCENTAGE, REQUIRED_COLUMNS, STATE_COLUMN,
};
use crate::Result;

/// Values accepted in the compensation column: a dollar amount, optionally
/// with the postmaster-fee notation, or nothing at all
static COMPENSATION_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\$[\d,.]+(\s*p\.\s?m\.)?$").expect("valid compensation regex"));

/// Tunables for table validation
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    /// Columns whose absence makes the table invalid
    pub required_columns: Vec<String>,

    /// Empty-value percentage above which a column draws a threshold warning
    pub max_empty_percentage: f64,

    /// Cross-check State against "Where born" (mismatches are common and
    /// legitimate, so this only ever warns)
    pub check_state_birthplace: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            required_columns: REQUIRED_COLUMNS.iter().map(|s| s.to_string()).collect(),
            max_empty_percentage: DEFAULT_MAX_EMPTY_PERCENTAGE,
            check_state_birthplace: true,
        }
    }
}

/// Validate a finished table, producing a pass/fail verdict plus itemized
/// issues and warnings
pub fn validate_table(file: &str, table: &RosterTable, options: &ValidatorOptions) -> ValidationReport {
    let mut report = ValidationReport::passing(file, table.row_count());

    check_required_columns(table, options, &mut report);
    check_empty_values(table, options, &mut report);
    check_unresolved_dittos(table, &mut report);
    check_compensation_shape(table, &mut report);
    if options.check_state_birthplace {
        check_state_consistency(table, &mut report);
    }

    report
}

/// Read a CSV file and validate its table
///
/// Unreadable input is the one condition that errors; everything found in a
/// readable table lands in the report.
pub fn validate_csv_file(path: &Path, options: &ValidatorOptions) -> Result<ValidationReport> {
    let table = super::output::read_table(path)?;
    Ok(validate_table(&path.display().to_string(), &table, options))
}

fn check_required_columns(
    table: &RosterTable,
    options: &ValidatorOptions,
    report: &mut ValidationReport,
) {
    let missing: Vec<&str> = options
        .required_columns
        .iter()
        .filter(|required| table.column_index(required).is_none())
        .map(|s| s.as_str())
        .collect();

    if !missing.is_empty() {
        report.add_issue(format!("Missing columns: {}", missing.join(", ")));
    }
}

fn check_empty_values(
    table: &RosterTable,
    options: &ValidatorOptions,
    report: &mut ValidationReport,
) {
    if table.is_empty() {
        return;
    }

    for (idx, column) in table.columns.iter().enumerate() {
        let empty_count = table
            .rows
            .iter()
            .filter(|row| row[idx].trim().is_empty())
            .count();

        if empty_count > 0 {
            report.add_warning(format!(
                "Column '{}' has {} empty values",
                column, empty_count
            ));

            let percentage = (empty_count as f64 / table.row_count() as f64) * 100.0;
            if percentage > options.max_empty_percentage {
                report.add_warning(format!(
                    "Column '{}' exceeds the empty-value threshold ({:.1}% > {:.1}%)",
                    column, percentage, options.max_empty_percentage
                ));
            }
        }
    }
}

fn check_unresolved_dittos(table: &RosterTable, report: &mut ValidationReport) {
    for (idx, column) in table.columns.iter().enumerate() {
        let ditto_count = table
            .rows
            .iter()
            .filter(|row| constants::is_ditto_marker(&row[idx]))
            .count();

        if ditto_count > 0 {
            // Leftover markers mean the assembly pass misfired; the table
            // cannot be trusted downstream.
            report.add_issue(format!(
                "Found {} unresolved '{}' values in column '{}'",
                ditto_count,
                constants::DITTO_MARKER,
                column
            ));
        }
    }
}

fn check_compensation_shape(table: &RosterTable, report: &mut ValidationReport) {
    let Some(comp_idx) = table.column_index(constants::ROSTER_COLUMN_NAMES[4]) else {
        return;
    };

    let suspicious: Vec<&str> = table
        .rows
        .iter()
        .map(|row| row[comp_idx].trim())
        .filter(|value| !value.is_empty() && !COMPENSATION_SHAPE.is_match(value))
        .collect();

    if !suspicious.is_empty() {
        report.add_warning(format!(
            "{} rows have suspicious compensation values",
            suspicious.len()
        ));
        let examples: Vec<&str> = suspicious
            .iter()
            .take(COMPENSATION_EXAMPLE_LIMIT)
            .copied()
            .collect();
        report.add_warning(format!("Examples of suspicious values: {:?}", examples));
    }
}

fn check_state_consistency(table: &RosterTable, report: &mut ValidationReport) {
    let (Some(state_idx), Some(born_idx)) = (
        table.column_index(STATE_COLUMN),
        table.column_index(constants::ROSTER_COLUMN_NAMES[1]),
    ) else {
        return;
    };

    let mismatches = table
        .rows
        .iter()
        .filter(|row| {
            let state = row[state_idx].trim();
            let born = row[born_idx].trim();
            !state.is_empty()
                && !born.is_empty()
                && !constants::is_ditto_marker(born)
                && !state.eq_ignore_ascii_case(born)
        })
        .count();

    if mismatches > 0 {
        report.add_warning(format!(
            "{} rows have potential state/birthplace mismatches",
            mismatches
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ValidatorOptions {
        ValidatorOptions::default()
    }

    fn full_table(rows: Vec<Vec<&str>>) -> RosterTable {
        let mut table = RosterTable::with_output_schema();
        for row in rows {
            table
                .push_row(row.into_iter().map(|s| s.to_string()).collect())
                .unwrap();
        }
        table
    }

    #[test]
    fn test_clean_table_passes() {
        let table = full_table(vec![vec![
            "Smith, John",
            "Ohio",
            "Ohio",
            "Columbus",
            "$900",
            "Ohio",
            "0",
        ]]);

        let report = validate_table("clean.csv", &table, &options());
        assert!(report.valid);
        assert!(report.issues.is_empty());
        assert!(report.warnings.is_empty());
        assert_eq!(report.row_count, 1);
    }

    #[test]
    fn test_missing_required_column_is_invalid() {
        let table = RosterTable::new(vec!["Name".to_string(), "State".to_string()]);
        let report = validate_table("partial.csv", &table, &options());

        assert!(!report.valid);
        assert!(report.issues[0].contains("Missing columns"));
        assert!(report.issues[0].contains("Where born"));
    }

    #[test]
    fn test_unresolved_ditto_is_invalid() {
        let table = full_table(vec![
            vec!["Smith, John", "Ohio", "Ohio", "Columbus", "$900", "Ohio", "0"],
            vec!["Jones, Mary", "do", "Ohio", "Columbus", "$800", "Ohio", "0"],
        ]);

        let report = validate_table("ditto.csv", &table, &options());
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.contains("unresolved")));
    }

    #[test]
    fn test_empty_values_warn_only() {
        let table = full_table(vec![vec![
            "Smith, John",
            "",
            "Ohio",
            "Columbus",
            "$900",
            "Ohio",
            "0",
        ]]);

        let report = validate_table("gaps.csv", &table, &options());
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("empty values")));
        // 100% empty exceeds the default 5% threshold
        assert!(report.warnings.iter().any(|w| w.contains("threshold")));
    }

    #[test]
    fn test_suspicious_compensation_warns_with_examples() {
        let table = full_table(vec![
            vec!["Smith, John", "Ohio", "Ohio", "Columbus", "illegible", "Ohio", "0"],
            vec!["Jones, Mary", "Ohio", "Ohio", "Columbus", "$900 p.m.", "Ohio", "1"],
        ]);

        let report = validate_table("comp.csv", &table, &options());
        assert!(report.valid);
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("suspicious compensation"))
        );
        assert!(report.warnings.iter().any(|w| w.contains("illegible")));
    }

    #[test]
    fn test_state_birthplace_mismatch_warns_only() {
        let table = full_table(vec![vec![
            "Smith, John",
            "Ireland",
            "Ohio",
            "Columbus",
            "$900",
            "Ohio",
            "0",
        ]]);

        let report = validate_table("born.csv", &table, &options());
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("mismatch")));

        // The check is a policy knob
        let mut relaxed = options();
        relaxed.check_state_birthplace = false;
        let report = validate_table("born.csv", &table, &relaxed);
        assert!(!report.warnings.iter().any(|w| w.contains("mismatch")));
    }

    #[test]
    fn test_validate_csv_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        std::fs::write(
            &path,
            "Name,Where born,Whence appointed,Post-office,Compensation per annum,State,Postmaster\n\
             \"Smith, John\",Ohio,Ohio,Columbus,$900,Ohio,0\n",
        )
        .unwrap();

        let report = validate_csv_file(&path, &options()).unwrap();
        assert!(report.valid);
        assert_eq!(report.row_count, 1);
    }

    #[test]
    fn test_validate_missing_file_errors() {
        let result = validate_csv_file(Path::new("/nonexistent/roster.csv"), &options());
        assert!(result.is_err());
    }
}
