//! Row assembly from positioned OCR fragments
//!
//! Consumes one page's fragments in vertical order, detects section headings,
//! opens a row on every column-zero fragment, and resolves ditto placeholders
//! in a second pass. Section context threads across the pages of a document:
//! tables routinely span pages without repeating the heading, so the carrier
//! is only superseded, never reset at a page boundary.

use std::collections::HashMap;

use tracing::{debug, info};

use super::column_layout::ColumnLayout;
use super::normalize;
use crate::app::models::{PageFragments, RosterTable, TextFragment};
use crate::constants::{
    self, DEFAULT_HEADING_MAX_TOKENS, DEFAULT_HEADING_X_THRESHOLD,
    DEFAULT_ROW_GROUPING_THRESHOLD, DEFAULT_SKIP_LEADING_LINES, POSTMASTER_COLUMN,
    RUNNING_HEADER_PATTERNS, STATE_COLUMN,
};
use crate::Result;

/// Tunables for page assembly
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    /// Leading lines (title block, printed column headers) skipped per page
    pub skip_leading_lines: usize,

    /// Fragments starting left of this x-position qualify as headings
    pub heading_x_threshold: f64,

    /// Maximum whitespace-separated tokens in a heading
    pub heading_max_tokens: usize,

    /// Running headers dropped wherever they appear (matched case-insensitively)
    pub running_header_patterns: Vec<String>,

    /// Maximum vertical distance between a row's opening fragment and the
    /// cell fragments grouped into it
    pub row_grouping_threshold: f64,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            skip_leading_lines: DEFAULT_SKIP_LEADING_LINES,
            heading_x_threshold: DEFAULT_HEADING_X_THRESHOLD,
            heading_max_tokens: DEFAULT_HEADING_MAX_TOKENS,
            running_header_patterns: RUNNING_HEADER_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            row_grouping_threshold: DEFAULT_ROW_GROUPING_THRESHOLD,
        }
    }
}

/// The currently governing section heading, threaded through one document's
/// assembly pass
///
/// Modeled as an explicit parameter rather than ambient state so page
/// assembly stays pure and testable in isolation.
#[derive(Debug, Clone, Default)]
pub struct SectionContext {
    current: Option<String>,
}

impl SectionContext {
    /// Start with no governing heading
    pub fn new() -> Self {
        Self::default()
    }

    /// The active heading, if any
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Supersede the active heading
    pub fn update(&mut self, heading: String) {
        self.current = Some(heading);
    }
}

/// Most recent non-placeholder value per column, for ditto resolution
///
/// Scoped to one resolution pass; constructing a fresh cache per page keeps
/// placeholder state from leaking across unrelated documents.
#[derive(Debug, Clone, Default)]
pub struct LastValueCache {
    values: HashMap<String, String>,
}

impl LastValueCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a column with a known prior value (used when a table continues
    /// from an earlier page)
    pub fn seed(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    /// Resolve one cell: a ditto marker becomes the cached value for the
    /// column, anything else replaces the cached value
    pub fn resolve(&mut self, column: &str, value: &str) -> String {
        if constants::is_ditto_marker(value) {
            self.values.get(column).cloned().unwrap_or_default()
        } else {
            self.values.insert(column.to_string(), value.to_string());
            value.to_string()
        }
    }
}

/// Whether a fragment is a section heading rather than row data
///
/// Headings sit hard against the left margin, end with a sentence-terminal
/// mark, and carry at most two tokens ("Alabama.", "New York.").
fn is_section_heading(fragment: &TextFragment, options: &AssemblyOptions) -> bool {
    fragment.x < options.heading_x_threshold
        && fragment.text.trim().ends_with('.')
        && fragment.text.split_whitespace().count() <= options.heading_max_tokens
}

/// Whether a fragment repeats a known running header
fn is_running_header(fragment: &TextFragment, options: &AssemblyOptions) -> bool {
    let upper = fragment.text.to_uppercase();
    options
        .running_header_patterns
        .iter()
        .any(|pattern| upper.contains(&pattern.to_uppercase()))
}

/// Assemble one page of fragments into a table with the standard output
/// schema
///
/// `section` carries the governing heading into and out of the page; `cache`
/// supplies prior column values for ditto resolution. Both are explicit
/// parameters so the caller controls their scope. A page yielding zero rows
/// is a legitimate outcome (heading-only pages exist), not an error.
pub fn assemble_page(
    lines: &[TextFragment],
    layout: &ColumnLayout,
    options: &AssemblyOptions,
    section: &mut SectionContext,
    cache: &mut LastValueCache,
) -> Result<RosterTable> {
    let mut table = RosterTable::with_output_schema();
    let width = table.columns.len();
    let state_idx = table.column_index(STATE_COLUMN);

    // Vertical order decides row membership; the stable sort preserves the
    // engine's reading order for same-height fragments.
    let mut ordered: Vec<&TextFragment> = lines.iter().collect();
    ordered.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal));

    let mut open_row: Option<Vec<String>> = None;
    let mut open_row_y = 0.0f64;
    let mut skipped = 0usize;

    for (line_idx, fragment) in ordered.iter().enumerate() {
        let text = fragment.text.trim();
        if text.is_empty() {
            continue;
        }

        if line_idx < options.skip_leading_lines || is_running_header(fragment, options) {
            skipped += 1;
            continue;
        }

        if is_section_heading(fragment, options) {
            if let Some(heading) = normalize::clean_state_name(text) {
                debug!("Detected section heading: {}", heading);
                section.update(heading);
            }
            continue;
        }

        let Some(col_idx) = layout.classify(fragment.x) else {
            skipped += 1;
            debug!("Unclassified fragment at x={:.3}: {:?}", fragment.x, text);
            continue;
        };

        if col_idx == 0 {
            // The heading may interleave with a row still being assembled, so
            // the State cell takes the context at closing time, not open time.
            if let Some(row) = open_row.take() {
                table.push_row(close_row(row, section, state_idx))?;
            }
            let mut row = vec![String::new(); width];
            row[0] = text.to_string();
            open_row = Some(row);
            open_row_y = fragment.y;
        } else if let Some(row) = open_row.as_mut() {
            if (fragment.y - open_row_y).abs() > options.row_grouping_threshold {
                // Stray fragment from a line whose column-zero text the
                // engine dropped; grouping it here would corrupt the open row
                skipped += 1;
                debug!(
                    "Dropping column-{} fragment {:.3} away from open row: {:?}",
                    col_idx,
                    (fragment.y - open_row_y).abs(),
                    text
                );
            } else {
                // Last-write-wins when duplicate fragments land in one cell
                row[col_idx] = text.to_string();
            }
        } else {
            skipped += 1;
            debug!("Dropping column-{} fragment with no open row: {:?}", col_idx, text);
        }
    }

    if let Some(row) = open_row.take() {
        table.push_row(close_row(row, section, state_idx))?;
    }

    resolve_ditto_markers(&mut table, cache);
    derive_postmaster_flags(&mut table);

    info!(
        "Assembled {} rows from {} fragments ({} skipped)",
        table.row_count(),
        lines.len(),
        skipped
    );

    Ok(table)
}

/// Stamp the derived State cell with the context active at closing time
fn close_row(mut row: Vec<String>, section: &SectionContext, state_idx: Option<usize>) -> Vec<String> {
    if let (Some(idx), Some(state)) = (state_idx, section.current()) {
        row[idx] = state.to_string();
    }
    row
}

/// Resolve ditto placeholders in row order, top to bottom
///
/// Only the printed roster columns participate; the derived State and
/// Postmaster cells never carry the marker. Idempotent on tables with no
/// markers left: every non-marker value simply refreshes the cache.
pub fn resolve_ditto_markers(table: &mut RosterTable, cache: &mut LastValueCache) {
    let data_columns: Vec<(usize, String)> = constants::ROSTER_COLUMN_NAMES
        .iter()
        .filter_map(|name| table.column_index(name).map(|idx| (idx, name.to_string())))
        .collect();

    for row in table.rows.iter_mut() {
        for (idx, name) in &data_columns {
            row[*idx] = cache.resolve(name, &row[*idx]);
        }
    }
}

/// Derive the Postmaster flag from the compensation notation, then clean the
/// compensation value itself
///
/// Runs after ditto resolution so an inherited "$500 p.m." still sets the
/// flag on the inheriting row.
fn derive_postmaster_flags(table: &mut RosterTable) {
    let Some(comp_idx) = table.column_index(constants::ROSTER_COLUMN_NAMES[4]) else {
        return;
    };
    let Some(pm_idx) = table.column_index(POSTMASTER_COLUMN) else {
        return;
    };

    for row in table.rows.iter_mut() {
        let compensation = row[comp_idx].clone();
        row[pm_idx] = if normalize::has_postmaster_notation(&compensation) {
            "1".to_string()
        } else {
            "0".to_string()
        };
        row[comp_idx] = normalize::clean_compensation(&compensation);
    }
}

/// Assemble a whole document: pages in increasing page order, section context
/// threaded across page boundaries, one concatenated table out
pub fn assemble_document(
    pages: &[PageFragments],
    layout: &ColumnLayout,
    options: &AssemblyOptions,
) -> Result<RosterTable> {
    let mut ordered: Vec<&PageFragments> = pages.iter().collect();
    ordered.sort_by_key(|p| p.page);

    let mut section = SectionContext::new();
    let mut document_table = RosterTable::with_output_schema();

    for page in ordered {
        // Ditto resolution state is scoped to a single page
        let mut cache = LastValueCache::new();
        let page_table = assemble_page(&page.lines, layout, options, &mut section, &mut cache)?;
        if page_table.is_empty() {
            info!("No rows detected on page {}", page.page);
        }
        document_table.extend_from(page_table)?;
    }

    Ok(document_table)
}
