//! Column layout classification for fixed-format roster pages
//!
//! The source registers share a rigid five-column print layout, so column
//! membership is decided by a configured breakpoint list rather than general
//! table-layout inference. This trades generality for robustness on the one
//! document family the processor targets.

use crate::{Error, Result};

/// A validated five-column layout: six ascending x-axis breakpoints plus the
/// column names they delimit
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    boundaries: Vec<f64>,
    names: Vec<String>,
}

impl ColumnLayout {
    /// Create a layout from boundary breakpoints and column names
    ///
    /// `boundaries` must be strictly ascending and exactly one longer than
    /// `names`: each pair of adjacent breakpoints delimits one column.
    pub fn new(boundaries: Vec<f64>, names: Vec<String>) -> Result<Self> {
        if boundaries.len() != names.len() + 1 {
            return Err(Error::configuration(format!(
                "Expected {} column boundaries for {} columns, got {}",
                names.len() + 1,
                names.len(),
                boundaries.len()
            )));
        }

        if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::configuration(format!(
                "Column boundaries must be strictly ascending: {:?}",
                boundaries
            )));
        }

        Ok(Self { boundaries, names })
    }

    /// The standard register layout from the crate defaults
    pub fn default_register() -> Self {
        // Defaults are validated by construction, so this cannot fail
        Self::new(
            crate::constants::DEFAULT_COLUMN_BOUNDARIES.to_vec(),
            crate::constants::ROSTER_COLUMN_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .expect("default register layout is valid")
    }

    /// Number of columns in this layout
    pub fn column_count(&self) -> usize {
        self.names.len()
    }

    /// Column names in page order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name of the column at `index`
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|s| s.as_str())
    }

    /// Classify an x-coordinate into the half-open interval
    /// `[boundaries[i], boundaries[i + 1])` containing it
    ///
    /// Returns `None` for coordinates outside the covered range (OCR noise
    /// can report positions outside [0, 1]). A breakpoint value classifies
    /// into the interval it opens, not the one it closes.
    pub fn classify(&self, x: f64) -> Option<usize> {
        self.boundaries
            .windows(2)
            .position(|pair| x >= pair[0] && x < pair[1])
    }
}
