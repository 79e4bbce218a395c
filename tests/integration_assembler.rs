//! Integration tests for the OCR-path pipeline
//!
//! These tests run fragment dumps through loading, document assembly, CSV
//! output, and validation end to end, the way the batch orchestrator drives
//! them for one file.

use roster_processor::app::services::fragments::read_fragment_file;
use roster_processor::app::services::row_assembler::{assemble_document, AssemblyOptions};
use roster_processor::app::services::validator::{validate_table, ValidatorOptions};
use roster_processor::app::services::{column_layout::ColumnLayout, output};
use tempfile::TempDir;

/// A three-page register excerpt. Every printed page opens with the same
/// five-line title block; the Alabama heading appears only on page one, and
/// page three introduces Arizona mid-document.
const REGISTER_DUMP: &str = r#"{
    "document": "register_1881_vol2",
    "pages": [
        {
            "page": 1,
            "lines": [
                { "text": "OFFICIAL REGISTER", "x": 0.30, "y": 0.010 },
                { "text": "Clerks in Post-Offices.", "x": 0.28, "y": 0.020 },
                { "text": "Name", "x": 0.02, "y": 0.040 },
                { "text": "Where born", "x": 0.38, "y": 0.041 },
                { "text": "Compensation", "x": 0.80, "y": 0.042 },
                { "text": "Alabama.", "x": 0.05, "y": 0.100 },
                { "text": "Armstrong, Geo. W", "x": 0.02, "y": 0.150 },
                { "text": "Alabama", "x": 0.40, "y": 0.151 },
                { "text": "Alabama", "x": 0.50, "y": 0.152 },
                { "text": "Mobile", "x": 0.60, "y": 0.153 },
                { "text": "$1,000", "x": 0.80, "y": 0.154 },
                { "text": "Bates, Mary E", "x": 0.02, "y": 0.180 },
                { "text": "do", "x": 0.40, "y": 0.181 },
                { "text": "do", "x": 0.50, "y": 0.182 },
                { "text": "do", "x": 0.60, "y": 0.183 },
                { "text": "$900", "x": 0.80, "y": 0.184 }
            ]
        },
        {
            "page": 2,
            "lines": [
                { "text": "OFFICIAL REGISTER", "x": 0.30, "y": 0.010 },
                { "text": "Clerks in Post-Offices.", "x": 0.28, "y": 0.020 },
                { "text": "Name", "x": 0.02, "y": 0.040 },
                { "text": "Where born", "x": 0.38, "y": 0.041 },
                { "text": "Compensation", "x": 0.80, "y": 0.042 },
                { "text": "Chandler, A. B", "x": 0.02, "y": 0.080 },
                { "text": "Georgia", "x": 0.40, "y": 0.081 },
                { "text": "Alabama", "x": 0.50, "y": 0.082 },
                { "text": "Selma", "x": 0.60, "y": 0.083 },
                { "text": "$1 200", "x": 0.80, "y": 0.084 }
            ]
        },
        {
            "page": 3,
            "lines": [
                { "text": "OFFICIAL REGISTER", "x": 0.30, "y": 0.010 },
                { "text": "Clerks in Post-Offices.", "x": 0.28, "y": 0.020 },
                { "text": "Name", "x": 0.02, "y": 0.040 },
                { "text": "Where born", "x": 0.38, "y": 0.041 },
                { "text": "Compensation", "x": 0.80, "y": 0.042 },
                { "text": "Arizona.", "x": 0.05, "y": 0.120 },
                { "text": "Duffy, John", "x": 0.02, "y": 0.160 },
                { "text": "Ireland", "x": 0.40, "y": 0.161 },
                { "text": "Arizona", "x": 0.50, "y": 0.162 },
                { "text": "Tucson", "x": 0.60, "y": 0.163 },
                { "text": "$500 p.m.", "x": 0.80, "y": 0.164 }
            ]
        }
    ]
}"#;

#[test]
fn test_three_page_document_end_to_end() {
    let dir = TempDir::new().unwrap();
    let dump_path = dir.path().join("register_1881_vol2.json");
    std::fs::write(&dump_path, REGISTER_DUMP).unwrap();

    let pages = read_fragment_file(&dump_path).unwrap();
    assert_eq!(pages.len(), 3);

    let layout = ColumnLayout::default_register();
    let table = assemble_document(&pages, &layout, &AssemblyOptions::default()).unwrap();

    assert_eq!(table.row_count(), 4);

    // Page 1: dittos resolve downward within the page
    assert_eq!(table.cell(0, "Name"), Some("Armstrong, Geo. W"));
    assert_eq!(table.cell(0, "Post-office"), Some("Mobile"));
    assert_eq!(table.cell(0, "Compensation per annum"), Some("$1000"));
    assert_eq!(table.cell(0, "State"), Some("Alabama"));
    assert_eq!(table.cell(1, "Name"), Some("Bates, Mary E"));
    assert_eq!(table.cell(1, "Where born"), Some("Alabama"));
    assert_eq!(table.cell(1, "Post-office"), Some("Mobile"));
    assert_eq!(table.cell(1, "State"), Some("Alabama"));

    // Page 2 repeats no heading; the Alabama context carries over
    assert_eq!(table.cell(2, "Name"), Some("Chandler, A. B"));
    assert_eq!(table.cell(2, "State"), Some("Alabama"));
    // Split dollar amount rejoined during compensation cleaning
    assert_eq!(table.cell(2, "Compensation per annum"), Some("$1200"));

    // Page 3: the Arizona heading supersedes the carried context
    assert_eq!(table.cell(3, "Name"), Some("Duffy, John"));
    assert_eq!(table.cell(3, "State"), Some("Arizona"));
    assert_eq!(table.cell(3, "Postmaster"), Some("1"));
    assert_eq!(table.cell(3, "Compensation per annum"), Some("$500 p.m."));
}

#[test]
fn test_assembled_table_round_trips_and_validates() {
    let dir = TempDir::new().unwrap();
    let dump_path = dir.path().join("register.json");
    std::fs::write(&dump_path, REGISTER_DUMP).unwrap();

    let pages = read_fragment_file(&dump_path).unwrap();
    let layout = ColumnLayout::default_register();
    let table = assemble_document(&pages, &layout, &AssemblyOptions::default()).unwrap();

    // Write and read back through the CSV layer
    let csv_path = dir.path().join("register.csv");
    output::write_table(&table, &csv_path).unwrap();
    let read_back = output::read_table(&csv_path).unwrap();
    assert_eq!(read_back, table);

    // A fully assembled table passes validation with no blocking issues
    let report = validate_table("register.csv", &read_back, &ValidatorOptions::default());
    assert!(report.valid, "unexpected issues: {:?}", report.issues);
    assert_eq!(report.row_count, 4);
}

#[test]
fn test_heading_only_document_is_empty_not_invalid() {
    let dir = TempDir::new().unwrap();
    let dump_path = dir.path().join("sparse.json");
    std::fs::write(
        &dump_path,
        r#"{
            "pages": [
                { "page": 1, "lines": [ { "text": "Wyoming.", "x": 0.05, "y": 0.5 } ] }
            ]
        }"#,
    )
    .unwrap();

    let pages = read_fragment_file(&dump_path).unwrap();
    let layout = ColumnLayout::default_register();

    let options = AssemblyOptions {
        skip_leading_lines: 0,
        ..AssemblyOptions::default()
    };
    let table = assemble_document(&pages, &layout, &options).unwrap();

    assert!(table.is_empty());

    let report = validate_table("sparse.csv", &table, &ValidatorOptions::default());
    assert!(report.valid);
    assert_eq!(report.row_count, 0);
}
