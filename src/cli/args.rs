//! Command-line argument definitions for the roster processor
//!
//! This module defines the complete CLI interface using the clap derive API.

use crate::app::services::batch::ExtractionEngine;
use crate::constants::{DEFAULT_PARALLEL_WORKERS, DEFAULT_RETRY_COUNT, MAX_PARALLEL_WORKERS};
use crate::{Error, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the roster processor
///
/// Reconstructs personnel roster tables from scanned historical register
/// volumes into structured CSV files, from OCR geometry or vision-model
/// transcriptions.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "roster-processor",
    version,
    about = "Reconstruct personnel roster tables from scanned register volumes",
    long_about = "A production-ready tool that reconstructs structured personnel rolls from \
                  scanned historical register documents. Classifies positioned OCR text into \
                  fixed roster columns, resolves ditto placeholders and section headings, \
                  scores vision-model transcriptions by structural confidence, and validates \
                  the resulting tables against domain invariants."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands for the roster processor
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Process a directory of input documents into CSV tables (main command)
    Process(ProcessArgs),
    /// Extract a single document and write its table to stdout or a file
    Extract(ExtractArgs),
    /// Validate previously extracted CSV files and write a report
    Validate(ValidateArgs),
}

/// Arguments for the process command (batch extraction)
#[derive(Debug, Clone, Parser)]
pub struct ProcessArgs {
    /// Input directory containing documents to process
    ///
    /// For the fragments engine this holds OCR fragment dumps (*.json);
    /// for the vision engine, rendered page images (*.png, *.jpg).
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PATH",
        help = "Input directory containing documents to process"
    )]
    pub input_path: PathBuf,

    /// Output directory for CSV tables, the ledger, and reports
    ///
    /// Will be created if it doesn't exist. If not specified, defaults
    /// to ./output
    #[arg(
        short = 'o',
        long = "output",
        value_name = "PATH",
        help = "Output directory for generated CSV files"
    )]
    pub output_path: Option<PathBuf>,

    /// Extraction engine to drive
    ///
    /// "fragments" assembles rows from positioned OCR output; "vision"
    /// requests free-text transcriptions from the generation service and
    /// parses them with confidence scoring.
    #[arg(
        short = 'e',
        long = "engine",
        value_enum,
        default_value = "fragments",
        help = "Extraction engine (fragments or vision)"
    )]
    pub engine: EngineArg,

    /// File pattern to match within the input directory
    ///
    /// Defaults to *.json for the fragments engine and *.png for the
    /// vision engine.
    #[arg(
        short = 'p',
        long = "pattern",
        value_name = "GLOB",
        help = "File pattern to match (e.g. \"*.json\")"
    )]
    pub pattern: Option<String>,

    /// Number of parallel workers
    ///
    /// Controls how many files are processed concurrently. More workers
    /// can speed up processing but use more memory and service quota.
    #[arg(
        short = 'j',
        long = "workers",
        value_name = "COUNT",
        default_value_t = DEFAULT_PARALLEL_WORKERS,
        help = "Number of parallel workers for processing"
    )]
    pub workers: usize,

    /// Generation-service attempts per page (vision engine)
    #[arg(
        long = "retry-count",
        value_name = "COUNT",
        default_value_t = DEFAULT_RETRY_COUNT,
        help = "Extraction attempts per page before giving up"
    )]
    pub retry_count: usize,

    /// Perform a dry run without actual processing
    ///
    /// Shows what would be processed without creating any output files.
    #[arg(
        long = "dry-run",
        help = "Show what would be processed without creating output files"
    )]
    pub dry_run: bool,

    /// Force overwrite of existing output files
    #[arg(long = "force", help = "Force overwrite of existing output files")]
    pub force_overwrite: bool,

    /// Path to configuration file
    ///
    /// TOML configuration file for advanced settings (column boundaries,
    /// validation thresholds, service model). If not specified, looks for
    /// ~/.config/roster-processor/config.toml
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    pub config_file: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Output format for machine-readable results
    #[arg(
        long = "output-format",
        value_enum,
        default_value = "human",
        help = "Output format for results"
    )]
    pub output_format: OutputFormat,
}

/// Arguments for the extract command (single document)
#[derive(Debug, Clone, Parser)]
pub struct ExtractArgs {
    /// Input document (fragment dump or page image)
    #[arg(value_name = "FILE", help = "Input document to extract")]
    pub input_file: PathBuf,

    /// Output CSV path
    ///
    /// If not specified, the table is written next to the input with a
    /// .csv extension.
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help = "Output CSV path"
    )]
    pub output_file: Option<PathBuf>,

    /// Extraction engine to drive
    #[arg(
        short = 'e',
        long = "engine",
        value_enum,
        default_value = "fragments",
        help = "Extraction engine (fragments or vision)"
    )]
    pub engine: EngineArg,

    /// Generation-service attempts per page (vision engine)
    #[arg(
        long = "retry-count",
        value_name = "COUNT",
        default_value_t = DEFAULT_RETRY_COUNT,
        help = "Extraction attempts per page before giving up"
    )]
    pub retry_count: usize,

    /// Path to configuration file
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    pub config_file: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

/// Arguments for the validate command
#[derive(Debug, Clone, Parser)]
pub struct ValidateArgs {
    /// Directory containing CSV files to validate
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PATH",
        help = "Directory containing CSV files to validate"
    )]
    pub input_path: PathBuf,

    /// Path for the validation report
    #[arg(
        short = 'r',
        long = "report",
        value_name = "FILE",
        help = "Path to save the validation report (defaults to \
                validation_report.csv in the input directory)"
    )]
    pub report_path: Option<PathBuf>,

    /// Path to configuration file
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    pub config_file: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Output format for machine-readable results
    #[arg(
        long = "output-format",
        value_enum,
        default_value = "human",
        help = "Output format for results"
    )]
    pub output_format: OutputFormat,
}

/// Output format options for machine-readable results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
    /// CSV format for data analysis
    Csv,
}

/// CLI-facing extraction engine selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    /// Assemble rows from positioned OCR fragments
    Fragments,
    /// Transcribe page images through the generation service
    Vision,
}

impl From<EngineArg> for ExtractionEngine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Fragments => ExtractionEngine::Fragments,
            EngineArg::Vision => ExtractionEngine::Vision,
        }
    }
}

impl ProcessArgs {
    /// Validate the process command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        if !self.input_path.exists() {
            return Err(Error::configuration(format!(
                "Input path does not exist: {}",
                self.input_path.display()
            )));
        }

        if !self.input_path.is_dir() {
            return Err(Error::configuration(format!(
                "Input path is not a directory: {}",
                self.input_path.display()
            )));
        }

        if self.workers == 0 || self.workers > MAX_PARALLEL_WORKERS {
            return Err(Error::configuration(format!(
                "Number of workers must be between 1 and {}",
                MAX_PARALLEL_WORKERS
            )));
        }

        if self.retry_count == 0 {
            return Err(Error::configuration(
                "Retry count must be greater than 0".to_string(),
            ));
        }

        if let Some(config_file) = &self.config_file {
            if !config_file.exists() {
                return Err(Error::configuration(format!(
                    "Config file does not exist: {}",
                    config_file.display()
                )));
            }
        }

        Ok(())
    }

    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        log_level(self.quiet, self.verbose)
    }

    /// Check if we should show progress bars (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

impl ExtractArgs {
    /// Validate the extract command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        if !self.input_file.exists() {
            return Err(Error::configuration(format!(
                "Input file does not exist: {}",
                self.input_file.display()
            )));
        }

        if self.retry_count == 0 {
            return Err(Error::configuration(
                "Retry count must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        log_level(self.quiet, self.verbose)
    }
}

impl ValidateArgs {
    /// Validate the validate command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        if !self.input_path.exists() {
            return Err(Error::configuration(format!(
                "Input path does not exist: {}",
                self.input_path.display()
            )));
        }

        if !self.input_path.is_dir() {
            return Err(Error::configuration(format!(
                "Input path is not a directory: {}",
                self.input_path.display()
            )));
        }

        Ok(())
    }

    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        log_level(self.quiet, self.verbose)
    }
}

/// Shared quiet/verbose to log-level mapping
fn log_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(log_level(true, 3), "error");
        assert_eq!(log_level(false, 0), "warn");
        assert_eq!(log_level(false, 1), "info");
        assert_eq!(log_level(false, 2), "debug");
        assert_eq!(log_level(false, 5), "trace");
    }

    #[test]
    fn test_engine_arg_conversion() {
        assert_eq!(
            ExtractionEngine::from(EngineArg::Fragments),
            ExtractionEngine::Fragments
        );
        assert_eq!(
            ExtractionEngine::from(EngineArg::Vision),
            ExtractionEngine::Vision
        );
    }

    #[test]
    fn test_process_args_parse() {
        let args = Args::parse_from([
            "roster-processor",
            "process",
            "--input",
            "/tmp",
            "--engine",
            "vision",
            "-j",
            "2",
        ]);

        match args.command {
            Some(Commands::Process(process)) => {
                assert_eq!(process.input_path, PathBuf::from("/tmp"));
                assert_eq!(process.engine, EngineArg::Vision);
                assert_eq!(process.workers, 2);
                assert!(!process.dry_run);
            }
            _ => panic!("Expected process command"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let args = Args::parse_from([
            "roster-processor",
            "process",
            "--input",
            "/tmp",
            "-j",
            "0",
        ]);

        match args.command {
            Some(Commands::Process(process)) => {
                assert!(process.validate().is_err());
            }
            _ => panic!("Expected process command"),
        }
    }
}
