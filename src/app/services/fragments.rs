//! OCR fragment dump loading
//!
//! The OCR collaborator writes one JSON dump per document: page-grouped text
//! fragments with page-normalized geometry. This adapter only reads and
//! shape-checks the dump; everything geometric happens in the assembler.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::models::PageFragments;
use crate::{Error, Result};

/// On-disk shape of an OCR fragment dump
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FragmentDump {
    /// Source document identifier (informational)
    #[serde(default)]
    pub document: Option<String>,

    /// Pages in any order; consumers sort by page number
    pub pages: Vec<PageFragments>,
}

/// Read a fragment dump from disk
pub fn read_fragment_file(path: &Path) -> Result<Vec<PageFragments>> {
    if !path.exists() {
        return Err(Error::file_not_found(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::io(format!("Failed to read fragment dump {}", path.display()), e)
    })?;

    let dump: FragmentDump = serde_json::from_str(&content).map_err(|e| {
        Error::fragment_format(path.display().to_string(), e.to_string())
    })?;

    debug!(
        "Loaded fragment dump {}: {} pages, {} lines",
        path.display(),
        dump.pages.len(),
        dump.pages.iter().map(|p| p.lines.len()).sum::<usize>()
    );

    Ok(dump.pages)
}
