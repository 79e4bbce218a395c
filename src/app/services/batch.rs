//! Batch orchestration over many input documents
//!
//! Discovers input files, runs each through the per-document pipeline on a
//! bounded worker pool, and isolates failures to the file level: one file's
//! error becomes a ledger entry, never a batch abort. The ledger is
//! rewritten after every completion (in completion order), so partial
//! results survive a crash mid-batch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use glob::Pattern;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::fragments;
use super::ledger::{Ledger, LedgerSummary};
use super::output;
use super::page_extractor::PageExtractor;
use super::row_assembler;
use super::transcription::{PageImage, TranscriptionService, VisionClient};
use super::validator;
use crate::app::models::{LedgerEntry, RosterTable, ValidationReport};
use crate::config::Config;
use crate::constants::{
    self, FRAGMENT_FILE_PATTERN, LEDGER_FILENAME, PAGE_IMAGE_FILE_PATTERN,
    VALIDATION_REPORT_FILENAME,
};
use crate::{Error, Result};

/// Which per-document pipeline the batch drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionEngine {
    /// Geometric path: OCR fragment dumps through the row assembler
    Fragments,

    /// Generation-service path: page images through best-of-N transcription
    Vision,
}

impl ExtractionEngine {
    /// Default input file pattern for this engine
    pub fn default_pattern(&self) -> &'static str {
        match self {
            ExtractionEngine::Fragments => FRAGMENT_FILE_PATTERN,
            ExtractionEngine::Vision => PAGE_IMAGE_FILE_PATTERN,
        }
    }
}

impl std::fmt::Display for ExtractionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionEngine::Fragments => write!(f, "fragments"),
            ExtractionEngine::Vision => write!(f, "vision"),
        }
    }
}

/// Results of a completed batch run
#[derive(Debug)]
pub struct BatchOutcome {
    /// Aggregate statistics from the ledger
    pub summary: LedgerSummary,

    /// Per-file validation reports, in completion order
    pub reports: Vec<ValidationReport>,

    /// Combined CSV path, when at least one output merged
    pub combined_path: Option<PathBuf>,
}

/// Batch orchestrator
pub struct BatchProcessor {
    config: Arc<Config>,
    engine: ExtractionEngine,
}

impl BatchProcessor {
    /// Create a processor for one engine
    pub fn new(config: Arc<Config>, engine: ExtractionEngine) -> Self {
        Self { config, engine }
    }

    /// Discover input files under the configured input directory
    ///
    /// Recursive walk with the configured glob pattern matched against file
    /// names; results are sorted for a stable submission order.
    pub fn discover_files(&self) -> Result<Vec<PathBuf>> {
        let input = &self.config.processing.input_path;
        if !input.exists() {
            return Err(Error::file_not_found(input.display().to_string()));
        }

        let pattern_text = self
            .config
            .processing
            .file_pattern
            .clone()
            .unwrap_or_else(|| self.engine.default_pattern().to_string());
        let pattern = Pattern::new(&pattern_text).map_err(|e| {
            Error::configuration(format!("Invalid file pattern '{}': {}", pattern_text, e))
        })?;

        let mut files = Vec::new();
        for entry in WalkDir::new(input) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if pattern.matches(&name) {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();
        info!(
            "Found {} files matching '{}' in {}",
            files.len(),
            pattern_text,
            input.display()
        );
        Ok(files)
    }

    /// Process all discovered files on a bounded worker pool
    ///
    /// The batch always finishes (absent cancellation) and always leaves a
    /// ledger describing every completed file. Per-file errors never
    /// propagate out of this method.
    pub async fn run(
        &self,
        cancellation_token: CancellationToken,
        show_progress: bool,
    ) -> Result<BatchOutcome> {
        self.config.ensure_output_directory()?;
        let output_dir = self.config.processing.output_path.clone();

        let files = self.discover_files()?;
        let mut ledger = Ledger::new(output_dir.join(LEDGER_FILENAME));

        if files.is_empty() {
            warn!("No input files found; nothing to do");
            return Ok(BatchOutcome {
                summary: ledger.summary(),
                reports: Vec::new(),
                combined_path: None,
            });
        }

        // The vision client is shared across workers; building it up front
        // surfaces a missing API key before any work is scheduled.
        let vision_client = match self.engine {
            ExtractionEngine::Vision => Some(Arc::new(VisionClient::from_config(
                &self.config.service,
            )?)),
            ExtractionEngine::Fragments => None,
        };

        let progress = if show_progress {
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap()
                    .progress_chars("#>-"),
            );
            pb.set_message("Processing documents...");
            Some(pb)
        } else {
            None
        };

        let semaphore = Arc::new(Semaphore::new(self.config.performance.parallel_workers));
        let mut workers = JoinSet::new();
        let mut unaccounted: HashSet<PathBuf> = files.iter().cloned().collect();

        for file in &files {
            let config = Arc::clone(&self.config);
            let engine = self.engine;
            let client = vision_client.clone();
            let semaphore = Arc::clone(&semaphore);
            let token = cancellation_token.clone();
            let file = file.clone();
            let output_dir = output_dir.clone();

            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore open");
                if token.is_cancelled() {
                    return (file, None);
                }
                let outcome =
                    process_single_file(&config, engine, client, &file, &output_dir).await;
                (file, Some(outcome))
            });
        }

        let mut reports = Vec::new();
        let mut written_outputs = Vec::new();
        let mut interrupted = false;

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((file, None)) => {
                    // Worker observed cancellation before starting
                    unaccounted.remove(&file);
                    interrupted = true;
                }
                Ok((file, Some((entry, report, written)))) => {
                    unaccounted.remove(&file);
                    if let Some(pb) = &progress {
                        pb.inc(1);
                        pb.set_message(format!("{} ({})", entry.file, entry.status));
                    }
                    ledger.record(entry)?;
                    if let Some(report) = report {
                        reports.push(report);
                    }
                    if let Some(path) = written {
                        written_outputs.push(path);
                    }
                }
                Err(join_error) => {
                    warn!("Worker task failed: {}", join_error);
                }
            }

            if cancellation_token.is_cancelled() {
                interrupted = true;
            }
        }

        // A worker that died (panicked or was aborted) never reported its
        // file; the ledger record stays complete regardless.
        let mut dead_files: Vec<PathBuf> = unaccounted.into_iter().collect();
        dead_files.sort();
        for file in dead_files {
            ledger.record(LedgerEntry::executor_failure(
                file.display().to_string(),
                "worker task failed before reporting a result",
            ))?;
        }

        if let Some(pb) = &progress {
            pb.finish_with_message("Batch complete");
        }

        if interrupted {
            return Err(Error::processing_interrupted(
                "Batch cancelled before all files were processed",
            ));
        }

        write_validation_reports(&reports, &output_dir.join(VALIDATION_REPORT_FILENAME))?;

        // Combined file across every per-document output that was written
        let combined_path = if written_outputs.len() > 1 {
            written_outputs.sort();
            let path = output_dir.join(constants::get_combined_filename("batch"));
            match output::merge_output_files(&written_outputs, &path) {
                Ok(merged) if merged > 0 => Some(path),
                Ok(_) => None,
                Err(e) => {
                    warn!("Failed to write combined output: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let summary = ledger.summary();
        log_summary(&summary, files.len());

        Ok(BatchOutcome {
            summary,
            reports,
            combined_path,
        })
    }
}

/// Per-worker outcome: ledger entry, validation report for readable tables,
/// and the output path when a CSV was written
type FileOutcome = (LedgerEntry, Option<ValidationReport>, Option<PathBuf>);

/// Process one input file start to finish
///
/// All errors are absorbed into the returned ledger entry; this function
/// never panics the worker on bad input.
async fn process_single_file(
    config: &Config,
    engine: ExtractionEngine,
    client: Option<Arc<VisionClient>>,
    file: &Path,
    output_dir: &Path,
) -> FileOutcome {
    let started = Instant::now();
    let file_name = file.display().to_string();
    info!("Processing {}", file_name);

    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let output_path = output_dir.join(constants::get_output_filename(&stem));

    if output_path.exists() && !config.processing.force_overwrite {
        let entry = LedgerEntry::failure(
            file_name,
            started.elapsed().as_secs_f64(),
            &Error::io_error(format!(
                "Output file {} already exists (use --force to overwrite)",
                output_path.display()
            )),
        );
        return (entry, None, None);
    }

    let table = match extract_table(config, engine, client, file).await {
        Ok(table) => table,
        Err(e) => {
            warn!("Failed to process {}: {}", file_name, e);
            let entry = LedgerEntry::failure(file_name, started.elapsed().as_secs_f64(), &e);
            return (entry, None, None);
        }
    };

    if let Err(e) = output::write_table(&table, &output_path) {
        let entry = LedgerEntry::failure(file_name, started.elapsed().as_secs_f64(), &e);
        return (entry, None, None);
    }

    let report = validator::validate_table(&file_name, &table, &config.validator_options());
    let elapsed = started.elapsed().as_secs_f64();
    let rows = table.row_count();

    if rows == 0 {
        info!("No rows detected in {}", file_name);
    } else if rows < config.layout.min_rows {
        warn!(
            "Extracted only {} rows from {} (expected at least {})",
            rows, file_name, config.layout.min_rows
        );
    } else {
        info!("Extracted {} rows from {} in {:.2}s", rows, file_name, elapsed);
    }

    (
        LedgerEntry::success(file_name, rows, elapsed),
        Some(report),
        Some(output_path),
    )
}

/// Run the engine-appropriate pipeline for one file
pub async fn extract_table(
    config: &Config,
    engine: ExtractionEngine,
    client: Option<Arc<VisionClient>>,
    file: &Path,
) -> Result<RosterTable> {
    match engine {
        ExtractionEngine::Fragments => {
            let pages = fragments::read_fragment_file(file)?;
            let layout = config.column_layout()?;
            row_assembler::assemble_document(&pages, &layout, &config.assembly_options())
        }
        ExtractionEngine::Vision => {
            let client = client.ok_or_else(|| {
                Error::configuration("Vision engine requires a transcription client")
            })?;
            let data = std::fs::read(file)
                .map_err(|e| Error::io(format!("Failed to read image {}", file.display()), e))?;
            let image = PageImage::from_bytes(
                data,
                file.extension().and_then(|e| e.to_str()),
            );
            extract_page_table(client.as_ref(), config, &image).await
        }
    }
}

/// Best-of-N extraction for one page image, substituting a schema-correct
/// empty table when every attempt came back dead
async fn extract_page_table<S: TranscriptionService + Sync>(
    service: &S,
    config: &Config,
    image: &PageImage,
) -> Result<RosterTable> {
    let extractor = PageExtractor::with_policy(service, config.extractor_policy());
    match extractor.extract_page(image).await {
        Ok(attempt) => Ok(attempt.table),
        Err(Error::NoUsableData { attempts }) => {
            // Keep page sequencing intact downstream; the ledger will show
            // this page as empty output.
            warn!(
                "Substituting empty table after {} dead attempts",
                attempts
            );
            Ok(RosterTable::with_output_schema())
        }
        Err(e) => Err(e),
    }
}

/// Write the per-file validation reports as a CSV
pub fn write_validation_reports(reports: &[ValidationReport], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        Error::csv_parsing(path.display().to_string(), "Failed to create report", Some(e))
    })?;

    writer
        .write_record(["file", "valid", "issues", "warnings", "row_count"])
        .map_err(|e| {
            Error::csv_parsing(path.display().to_string(), "Failed to write header", Some(e))
        })?;

    for report in reports {
        writer
            .write_record([
                report.file.as_str(),
                if report.valid { "true" } else { "false" },
                &report.issues.join("; "),
                &report.warnings.join("; "),
                &report.row_count.to_string(),
            ])
            .map_err(|e| {
                Error::csv_parsing(path.display().to_string(), "Failed to write report", Some(e))
            })?;
    }

    writer.flush()?;
    Ok(())
}

/// Log the end-of-batch summary
fn log_summary(summary: &LedgerSummary, total_files: usize) {
    info!(
        "Batch processing complete: {}/{} files successful",
        summary.successful, total_files
    );
    info!("Total rows extracted: {}", summary.total_rows);
    info!(
        "Average processing time per file: {:.2}s",
        summary.mean_processing_time
    );

    if !summary.failures.is_empty() {
        warn!("Failed files: {}", summary.failures.len());
        for entry in &summary.failures {
            warn!(
                "  {} - {}: {}",
                entry.file,
                entry.status,
                entry.error.as_deref().unwrap_or("Unknown error")
            );
        }
    }
}
