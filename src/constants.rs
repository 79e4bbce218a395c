//! Application constants for the roster processor
//!
//! This module contains all configuration constants, default values,
//! and mappings used throughout the roster processor application.

// =============================================================================
// Roster Column Layout
// =============================================================================

/// The five printed roster columns, in page order
pub const ROSTER_COLUMN_NAMES: &[&str] = &[
    "Name",
    "Where born",
    "Whence appointed",
    "Post-office",
    "Compensation per annum",
];

/// Derived column carrying the governing section heading
pub const STATE_COLUMN: &str = "State";

/// Derived column flagging postmaster compensation ("p.m." notation)
pub const POSTMASTER_COLUMN: &str = "Postmaster";

/// Per-row confidence column appended by the manual-repair parse tier
pub const CONFIDENCE_COLUMN: &str = "extraction_confidence";

/// Default x-axis breakpoints for the five-column register layout.
///
/// Six values define five half-open intervals in page-normalized
/// coordinates. Calibrated against the 1880s register print runs; other
/// document families override these through configuration.
pub const DEFAULT_COLUMN_BOUNDARIES: &[f64] = &[0.0, 0.36, 0.47, 0.59, 0.7, 1.0];

// =============================================================================
// Row Assembly
// =============================================================================

/// Placeholder meaning "same as the cell above in this column"
pub const DITTO_MARKER: &str = "do";

/// Number of leading lines (title block, column headers) skipped per page
pub const DEFAULT_SKIP_LEADING_LINES: usize = 5;

/// Running headers repeated at the top of each printed page
pub const RUNNING_HEADER_PATTERNS: &[&str] = &["CLERKS IN POST-OFFICES"];

/// Fragments starting left of this x-position may be section headings
pub const DEFAULT_HEADING_X_THRESHOLD: f64 = 0.3;

/// Maximum vertical distance between a row's opening fragment and the cell
/// fragments grouped into it
pub const DEFAULT_ROW_GROUPING_THRESHOLD: f64 = 0.015;

/// Maximum whitespace-separated tokens in a section heading
pub const DEFAULT_HEADING_MAX_TOKENS: usize = 2;

/// Administrative regions that appear as section headings (1880s rolls)
pub const REGION_HEADING_KEYWORDS: &[&str] = &[
    "Alabama",
    "Arizona",
    "Arkansas",
    "California",
    "Colorado",
    "Connecticut",
    "Dakota",
    "Delaware",
    "Florida",
    "Georgia",
    "Idaho",
    "Illinois",
    "Indiana",
    "Iowa",
    "Kansas",
    "Kentucky",
    "Louisiana",
    "Maine",
    "Maryland",
    "Massachusetts",
    "Michigan",
    "Minnesota",
    "Mississippi",
    "Missouri",
    "Montana",
    "Nebraska",
    "Nevada",
    "New Hampshire",
    "New Jersey",
    "New Mexico",
    "New York",
    "North Carolina",
    "Ohio",
    "Oregon",
    "Pennsylvania",
    "Rhode Island",
    "South Carolina",
    "Tennessee",
    "Texas",
    "Utah",
    "Vermont",
    "Virginia",
    "Washington",
    "West Virginia",
    "Wisconsin",
    "Wyoming",
];

// =============================================================================
// Transcript Parsing Confidence Tiers
// =============================================================================

/// Confidence assigned when the strict quote-aware parse succeeds
pub const STRICT_TIER_CONFIDENCE: f64 = 1.0;

/// Confidence assigned when the relaxed sniffed-delimiter parse succeeds
pub const RELAXED_TIER_CONFIDENCE: f64 = 0.8;

/// Overall confidence for a manual-repair result with no data rows
pub const EMPTY_REPAIR_CONFIDENCE: f64 = 0.5;

/// Delimiters considered by the relaxed tier's frequency sniffer
pub const CANDIDATE_DELIMITERS: &[u8] = &[b',', b';', b'\t', b'|'];

// =============================================================================
// Extraction Attempt Policy
// =============================================================================

/// Attempts whose confidence exceeds this are accepted immediately
pub const ACCEPT_CONFIDENCE_THRESHOLD: f64 = 0.9;

/// Attempts at or below the accept threshold but above this floor trigger a
/// retry in the hope of a better draw
pub const RETRY_CONFIDENCE_FLOOR: f64 = 0.5;

/// Default number of generation-service attempts per page
pub const DEFAULT_RETRY_COUNT: usize = 3;

/// Default delay between generation-service attempts (rate-limit courtesy)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;

// =============================================================================
// Batch Processing Defaults
// =============================================================================

/// Default number of parallel workers
pub const DEFAULT_PARALLEL_WORKERS: usize = 4;

/// Upper bound on configured workers
pub const MAX_PARALLEL_WORKERS: usize = 8;

/// Default input file pattern for the OCR path (fragment dumps)
pub const FRAGMENT_FILE_PATTERN: &str = "*.json";

/// Default input file pattern for the vision path (rendered page images)
pub const PAGE_IMAGE_FILE_PATTERN: &str = "*.png";

/// Minimum number of rows expected in a well-populated table
pub const DEFAULT_MIN_ROWS: usize = 5;

// =============================================================================
// File and Directory Constants
// =============================================================================

/// Running per-file outcome ledger, rewritten after every completion
pub const LEDGER_FILENAME: &str = "processing_summary.csv";

/// Validation report written after a batch or validate run
pub const VALIDATION_REPORT_FILENAME: &str = "validation_report.csv";

/// Suffix for the file concatenating all per-document outputs
pub const COMBINED_OUTPUT_SUFFIX: &str = "_combined";

// =============================================================================
// Validation Defaults
// =============================================================================

/// Columns that must be present in a finished table
pub const REQUIRED_COLUMNS: &[&str] = &[
    "Name",
    "Where born",
    "Whence appointed",
    "Post-office",
    "Compensation per annum",
    "State",
];

/// Maximum tolerated empty values per column, as a percentage
pub const DEFAULT_MAX_EMPTY_PERCENTAGE: f64 = 5.0;

/// Number of suspicious compensation examples surfaced per warning
pub const COMPENSATION_EXAMPLE_LIMIT: usize = 3;

// =============================================================================
// Generation Service Defaults
// =============================================================================

/// Messages endpoint of the vision-capable generation service
pub const DEFAULT_SERVICE_API_BASE: &str = "https://api.anthropic.com/v1/messages";

/// Default vision model identifier
pub const DEFAULT_SERVICE_MODEL: &str = "claude-3-7-sonnet-20250219";

/// API version header value required by the service
pub const SERVICE_API_VERSION: &str = "2023-06-01";

/// Environment variable holding the service API key
pub const SERVICE_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Maximum tokens requested per transcription
pub const DEFAULT_SERVICE_MAX_TOKENS: u32 = 4_000;

// =============================================================================
// Helper Functions
// =============================================================================

/// Check whether a cell value is the ditto placeholder
///
/// The comparison is case- and surrounding-whitespace-insensitive, matching
/// how the marker is set in the scanned sources ("do", "Do ", " DO").
pub fn is_ditto_marker(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(DITTO_MARKER)
}

/// Full output schema for an assembled table (five roster columns plus
/// derived State and Postmaster)
pub fn output_columns() -> Vec<String> {
    ROSTER_COLUMN_NAMES
        .iter()
        .map(|s| s.to_string())
        .chain([STATE_COLUMN.to_string(), POSTMASTER_COLUMN.to_string()])
        .collect()
}

/// Get the expected CSV output filename for an input document
pub fn get_output_filename(document_stem: &str) -> String {
    format!("{}.csv", document_stem)
}

/// Get the combined-output filename for an input document
pub fn get_combined_filename(document_stem: &str) -> String {
    format!("{}{}.csv", document_stem, COMBINED_OUTPUT_SUFFIX)
}
