//! Confidence-scored parsing of generation-service transcripts
//!
//! The vision service returns free text that is nominally CSV but routinely
//! malformed: ragged rows, stray delimiters inside names, the occasional
//! non-comma delimiter. Rather than a binary parse/fail, this parser works
//! through three tiers of decreasing strictness and reports a numeric
//! structural confidence with the result, so callers can compare repeated
//! attempts uniformly.

use tracing::debug;

use super::normalize;
use crate::app::models::{ExtractionAttempt, RosterTable};
use crate::constants::{
    CANDIDATE_DELIMITERS, CONFIDENCE_COLUMN, EMPTY_REPAIR_CONFIDENCE, RELAXED_TIER_CONFIDENCE,
    STRICT_TIER_CONFIDENCE,
};

/// Tunables for transcript parsing
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Merge overflow fields into the final column instead of truncating.
    ///
    /// The final column is typically compensation/notes, the most
    /// information-dense one; merging there loses nothing. Truncation is
    /// available for document families where trailing fields are junk.
    pub merge_overflow_into_last: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            merge_overflow_into_last: true,
        }
    }
}

/// Three-tier transcript parser
#[derive(Debug, Clone, Default)]
pub struct TranscriptParser {
    options: ParserOptions,
}

impl TranscriptParser {
    /// Create a parser with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with explicit options
    pub fn with_options(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Parse a raw transcript into a table plus structural confidence
    ///
    /// Never fails: unusable input comes back as an empty table with
    /// confidence 0.0, which the attempt selector treats as a dead attempt
    /// rather than a hard fault.
    pub fn parse(&self, text: &str) -> ExtractionAttempt {
        // Split dollar amounts must be rejoined before any delimiter work;
        // once "$1 500" crosses a field boundary the counts are wrong for
        // every tier below.
        let normalized = normalize::rejoin_split_currency(text);

        let lines: Vec<&str> = normalized
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        if lines.is_empty() {
            debug!("Transcript contains no content lines");
            return ExtractionAttempt::failed(crate::constants::output_columns());
        }

        if let Some(table) = parse_strict(&normalized) {
            debug!("Strict tier accepted transcript ({} rows)", table.row_count());
            return ExtractionAttempt::new(table, STRICT_TIER_CONFIDENCE);
        }

        let delimiter = sniff_delimiter(lines[0]);

        if let Some(table) = parse_relaxed(&normalized, delimiter) {
            debug!(
                "Relaxed tier accepted transcript with delimiter {:?} ({} rows)",
                delimiter as char,
                table.row_count()
            );
            return ExtractionAttempt::new(table, RELAXED_TIER_CONFIDENCE);
        }

        debug!("Falling back to manual row repair");
        self.repair_rows(&lines, delimiter)
    }

    /// Manual repair tier: split without quote-awareness, fix each row's
    /// width, and score every row by field-count agreement
    fn repair_rows(&self, lines: &[&str], delimiter: u8) -> ExtractionAttempt {
        let sep = delimiter as char;
        let header: Vec<String> = lines[0].split(sep).map(|f| f.trim().to_string()).collect();
        let expected = header.len();

        // A one-field header means the service answered in prose, not a
        // table; scoring those lines by field count would accept garbage.
        if expected < 2 {
            debug!("Rejecting transcript with single-field header");
            return ExtractionAttempt::failed(crate::constants::output_columns());
        }

        let mut columns = header;
        columns.push(CONFIDENCE_COLUMN.to_string());
        let mut table = RosterTable::new(columns);

        let mut confidences = Vec::new();

        for line in &lines[1..] {
            let mut fields: Vec<String> = line.split(sep).map(|f| f.trim().to_string()).collect();
            let observed = fields.len();
            let row_confidence = (observed as f64 / expected as f64).min(1.0);

            if observed > expected {
                if self.options.merge_overflow_into_last {
                    let overflow = fields.split_off(expected - 1);
                    fields.push(overflow.join(&sep.to_string()));
                } else {
                    fields.truncate(expected);
                }
            } else if observed < expected {
                fields.resize(expected, String::new());
            }

            fields.push(format!("{:.2}", row_confidence));
            confidences.push(row_confidence);

            // Width is guaranteed by the repair above
            table
                .push_row(fields)
                .expect("repaired row matches table width");
        }

        let overall = if confidences.is_empty() {
            EMPTY_REPAIR_CONFIDENCE
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        ExtractionAttempt::new(table, overall)
    }
}

/// Strict tier: standard quote-aware CSV, uniform field counts required
///
/// Accepted only when every data row matches the header width and the header
/// has more than one field (a single-column parse of a roster transcript
/// means the delimiter was wrong, not that the table has one column).
fn parse_strict(text: &str) -> Option<RosterTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers = reader.headers().ok()?.clone();
    if headers.len() < 2 {
        return None;
    }

    let mut table = RosterTable::new(headers.iter().map(|h| h.trim().to_string()).collect());

    for record in reader.records() {
        let record = record.ok()?;
        let row: Vec<String> = record.iter().map(|f| f.trim().to_string()).collect();
        table.push_row(row).ok()?;
    }

    if table.is_empty() {
        return None;
    }

    Some(table)
}

/// Relaxed tier: delimiter inferred from the header line, quote-aware read
/// tolerant of ragged records
///
/// Accepted only when the re-parse yields uniform field counts; ragged rows
/// fall through to manual repair, the only tier allowed to change widths.
fn parse_relaxed(text: &str, delimiter: u8) -> Option<RosterTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().ok()?.clone();
    if headers.len() < 2 {
        return None;
    }
    let expected = headers.len();

    let mut table = RosterTable::new(headers.iter().map(|h| h.trim().to_string()).collect());

    for record in reader.records() {
        let record = record.ok()?;
        if record.len() != expected {
            return None;
        }
        let row: Vec<String> = record.iter().map(|f| f.trim().to_string()).collect();
        table.push_row(row).ok()?;
    }

    if table.is_empty() {
        return None;
    }

    Some(table)
}

/// Infer the delimiter by frequency over the header line
fn sniff_delimiter(header_line: &str) -> u8 {
    CANDIDATE_DELIMITERS
        .iter()
        .copied()
        .max_by_key(|d| header_line.bytes().filter(|b| b == d).count())
        .filter(|d| header_line.bytes().any(|b| b == *d))
        .unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TranscriptParser {
        TranscriptParser::new()
    }

    mod strict_tier_tests {
        use super::*;

        #[test]
        fn test_well_formed_transcript_scores_full_confidence() {
            let text = "Name,Where born,State\n\"Smith, John\",Ohio,Alabama\n";
            let attempt = parser().parse(text);

            assert_eq!(attempt.confidence, 1.0);
            assert_eq!(attempt.table.row_count(), 1);
            assert_eq!(attempt.table.cell(0, "Name"), Some("Smith, John"));
        }

        #[test]
        fn test_quoted_commas_do_not_break_field_counts() {
            let text = "Name,State\n\"Smith, John\",Ohio\n\"Jones, Mary\",Indiana\n";
            let attempt = parser().parse(text);

            assert_eq!(attempt.confidence, 1.0);
            assert_eq!(attempt.table.row_count(), 2);
        }

        #[test]
        fn test_ragged_rows_fail_strict() {
            let text = "A,B,C\n1,2,3,4,5\n";
            let attempt = parser().parse(text);
            // Fell through to manual repair
            assert!(attempt.confidence < 1.0 || attempt.table.column_index("extraction_confidence").is_some());
        }
    }

    mod relaxed_tier_tests {
        use super::*;

        #[test]
        fn test_semicolon_transcript_scores_relaxed_confidence() {
            let text = "Name;Where born;State\nSmith, John;Ohio;Alabama\nJones, Mary;Indiana;Alabama\n";
            let attempt = parser().parse(text);

            assert_eq!(attempt.confidence, RELAXED_TIER_CONFIDENCE);
            assert_eq!(attempt.table.row_count(), 2);
            assert_eq!(attempt.table.cell(0, "Name"), Some("Smith, John"));
        }

        #[test]
        fn test_sniffer_prefers_most_frequent_delimiter() {
            assert_eq!(sniff_delimiter("a,b,c"), b',');
            assert_eq!(sniff_delimiter("a;b;c"), b';');
            assert_eq!(sniff_delimiter("a\tb\tc"), b'\t');
            assert_eq!(sniff_delimiter("a|b|c,d"), b'|');
            // No candidate present at all
            assert_eq!(sniff_delimiter("plain text"), b',');
        }
    }

    mod manual_tier_tests {
        use super::*;

        #[test]
        fn test_overflow_merges_into_last_column() {
            let text = "A,B,C\n1,2,3,4,5\n";
            let attempt = parser().parse(text);

            assert_eq!(attempt.table.row_count(), 1);
            assert_eq!(attempt.table.cell(0, "A"), Some("1"));
            assert_eq!(attempt.table.cell(0, "B"), Some("2"));
            // Excess fields merge into the last column, never dropped
            assert_eq!(attempt.table.cell(0, "C"), Some("3,4,5"));
            // Effective field count equals the header count after the merge
            assert_eq!(attempt.table.cell(0, "extraction_confidence"), Some("1.00"));
            assert_eq!(attempt.confidence, 1.0);
        }

        #[test]
        fn test_short_rows_padded_and_scored() {
            let text = "A,B,C,D\n1,2\n";
            let attempt = parser().parse(text);

            assert_eq!(attempt.table.row_count(), 1);
            assert_eq!(attempt.table.cell(0, "C"), Some(""));
            assert_eq!(attempt.table.cell(0, "D"), Some(""));
            assert_eq!(attempt.table.cell(0, "extraction_confidence"), Some("0.50"));
            assert_eq!(attempt.confidence, 0.5);
        }

        #[test]
        fn test_overall_confidence_is_mean_of_rows() {
            // One perfect row, one half-width row
            let text = "A,B,C,D\n1,2,3,4\n1,2\n";
            let attempt = parser().parse(text);

            assert_eq!(attempt.table.row_count(), 2);
            assert!((attempt.confidence - 0.75).abs() < f64::EPSILON);
        }

        #[test]
        fn test_truncation_policy() {
            let parser = TranscriptParser::with_options(ParserOptions {
                merge_overflow_into_last: false,
            });
            let text = "A,B,C\n1,2,3,4,5\n";
            let attempt = parser.parse(text);

            assert_eq!(attempt.table.cell(0, "C"), Some("3"));
        }

        #[test]
        fn test_header_only_transcript() {
            let text = "Name,Where born,State\n";
            let attempt = parser().parse(text);

            assert!(attempt.table.is_empty());
            assert_eq!(attempt.confidence, EMPTY_REPAIR_CONFIDENCE);
            assert!(!attempt.is_usable());
        }
    }

    mod pre_pass_tests {
        use super::*;

        #[test]
        fn test_split_currency_rejoined_before_field_counting() {
            // Without the pre-pass "$1, 500" splits on its comma and the row
            // goes ragged; with it the row parses strictly.
            let text = "Name,Born,Compensation\nSmith,Ohio,$1, 500\n";
            let attempt = parser().parse(text);

            assert_eq!(attempt.confidence, 1.0);
            assert_eq!(attempt.table.cell(0, "Compensation"), Some("$1500"));
        }

        #[test]
        fn test_space_split_amount_normalized() {
            let text = "Name,Compensation per annum\nSmith,$1 200\n";
            let attempt = parser().parse(text);

            assert_eq!(attempt.confidence, 1.0);
            assert_eq!(
                attempt.table.cell(0, "Compensation per annum"),
                Some("$1200")
            );
        }
    }

    mod failure_tests {
        use super::*;

        #[test]
        fn test_empty_input_is_dead_attempt() {
            let attempt = parser().parse("");
            assert_eq!(attempt.confidence, 0.0);
            assert!(attempt.table.is_empty());
            assert!(!attempt.is_usable());
        }

        #[test]
        fn test_whitespace_only_input_is_dead_attempt() {
            let attempt = parser().parse("  \n \n");
            assert_eq!(attempt.confidence, 0.0);
            assert!(!attempt.is_usable());
        }

        #[test]
        fn test_prose_response_is_dead_attempt() {
            let attempt = parser().parse("I am unable to read the table\nin this image clearly\n");
            assert_eq!(attempt.confidence, 0.0);
            assert!(!attempt.is_usable());
        }
    }
}
