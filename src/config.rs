//! Configuration management and validation
//!
//! Provides the layered configuration surface for extraction runs: built-in
//! defaults, then an optional TOML file, then environment variables, then
//! CLI overrides applied by the command layer. Every sub-struct has serde
//! defaults so partial config files stay valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::services::column_layout::ColumnLayout;
use crate::app::services::page_extractor::ExtractorPolicy;
use crate::app::services::row_assembler::AssemblyOptions;
use crate::app::services::transcript_parser::ParserOptions;
use crate::app::services::validator::ValidatorOptions;
use crate::constants::{
    ACCEPT_CONFIDENCE_THRESHOLD, DEFAULT_COLUMN_BOUNDARIES, DEFAULT_HEADING_MAX_TOKENS,
    DEFAULT_HEADING_X_THRESHOLD, DEFAULT_MAX_EMPTY_PERCENTAGE, DEFAULT_MIN_ROWS,
    DEFAULT_PARALLEL_WORKERS, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY_MS,
    DEFAULT_ROW_GROUPING_THRESHOLD,
    DEFAULT_SERVICE_API_BASE, DEFAULT_SERVICE_MAX_TOKENS, DEFAULT_SERVICE_MODEL,
    DEFAULT_SKIP_LEADING_LINES, MAX_PARALLEL_WORKERS, REQUIRED_COLUMNS, RETRY_CONFIDENCE_FLOOR,
    ROSTER_COLUMN_NAMES, RUNNING_HEADER_PATTERNS, SERVICE_API_KEY_ENV,
};
use crate::{Error, Result};

/// Processing paths and batch behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Directory containing input documents
    pub input_path: PathBuf,

    /// Directory receiving CSV outputs, the ledger, and reports
    pub output_path: PathBuf,

    /// Glob pattern selecting input files (engine default when unset)
    pub file_pattern: Option<String>,

    /// Show what would be processed without writing outputs
    pub dry_run: bool,

    /// Overwrite existing per-document outputs
    pub force_overwrite: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("."),
            output_path: PathBuf::from("./output"),
            file_pattern: None,
            dry_run: false,
            force_overwrite: false,
        }
    }
}

/// Table layout and row-assembly tunables for one document family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Six x-axis breakpoints delimiting the five columns
    pub column_boundaries: Vec<f64>,

    /// Printed column names, in page order
    pub column_names: Vec<String>,

    /// Leading lines skipped per page
    pub skip_leading_lines: usize,

    /// Left-margin threshold for section headings
    pub heading_x_threshold: f64,

    /// Maximum tokens in a section heading
    pub heading_max_tokens: usize,

    /// Running headers dropped wherever they appear
    pub running_header_patterns: Vec<String>,

    /// Maximum vertical distance between a row's opening fragment and the
    /// cell fragments grouped into it
    pub row_grouping_threshold: f64,

    /// Minimum rows expected in a well-populated table
    pub min_rows: usize,

    /// Manual-repair policy: merge overflow fields into the last column
    pub merge_overflow_into_last: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            column_boundaries: DEFAULT_COLUMN_BOUNDARIES.to_vec(),
            column_names: ROSTER_COLUMN_NAMES.iter().map(|s| s.to_string()).collect(),
            skip_leading_lines: DEFAULT_SKIP_LEADING_LINES,
            heading_x_threshold: DEFAULT_HEADING_X_THRESHOLD,
            heading_max_tokens: DEFAULT_HEADING_MAX_TOKENS,
            running_header_patterns: RUNNING_HEADER_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            row_grouping_threshold: DEFAULT_ROW_GROUPING_THRESHOLD,
            min_rows: DEFAULT_MIN_ROWS,
            merge_overflow_into_last: true,
        }
    }
}

/// Generation-service connection and retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Messages endpoint URL
    pub api_base: String,

    /// Vision model identifier
    pub model: String,

    /// Maximum tokens requested per transcription
    pub max_tokens: u32,

    /// Environment variable holding the API key (the key itself never lives
    /// in a config file)
    pub api_key_env: String,

    /// Extraction attempts per page
    pub retry_count: usize,

    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_SERVICE_API_BASE.to_string(),
            model: DEFAULT_SERVICE_MODEL.to_string(),
            max_tokens: DEFAULT_SERVICE_MAX_TOKENS,
            api_key_env: SERVICE_API_KEY_ENV.to_string(),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

/// Validation thresholds and policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Columns whose absence invalidates a table
    pub required_columns: Vec<String>,

    /// Empty-value percentage drawing a threshold warning
    pub max_empty_percentage: f64,

    /// Cross-check State against "Where born"
    pub check_state_birthplace: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            required_columns: REQUIRED_COLUMNS.iter().map(|s| s.to_string()).collect(),
            max_empty_percentage: DEFAULT_MAX_EMPTY_PERCENTAGE,
            check_state_birthplace: true,
        }
    }
}

/// Concurrency settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Bounded worker pool size for batch processing
    pub parallel_workers: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            // Never default to more workers than the machine has cores
            parallel_workers: DEFAULT_PARALLEL_WORKERS.min(num_cpus::get().max(1)),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter ("error", "warn", "info", "debug", "trace")
    pub level: String,

    /// Emit timestamps and full structure (false in quiet mode)
    pub structured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: true,
        }
    }
}

/// Global configuration for roster extraction runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub processing: ProcessingConfig,
    pub layout: LayoutConfig,
    pub service: ServiceConfig,
    pub validation: ValidationConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Create a configuration with explicit paths and defaults elsewhere
    pub fn new(input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            processing: ProcessingConfig {
                input_path,
                output_path,
                ..ProcessingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Default config file location (~/.config/roster-processor/config.toml)
    pub fn default_config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("roster-processor").join("config.toml"))
            .ok_or_else(|| Error::configuration("Could not determine config directory"))
    }

    /// Load configuration with the layered approach: defaults, then config
    /// file, then environment variables
    ///
    /// CLI overrides are applied afterwards by the command layer.
    pub fn load_layered(
        input_path: Option<PathBuf>,
        output_path: Option<PathBuf>,
        config_file: Option<&Path>,
    ) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(input) = input_path {
            config.processing.input_path = input;
        }
        if let Some(output) = output_path {
            config.processing.output_path = output;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            Error::configuration(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply environment variable overrides (`ROSTER_WORKERS`,
    /// `ROSTER_MODEL`, `ROSTER_RETRY_COUNT`)
    fn apply_env_overrides(&mut self) {
        if let Ok(workers) = std::env::var("ROSTER_WORKERS") {
            if let Ok(value) = workers.parse() {
                self.performance.parallel_workers = value;
            }
        }
        if let Ok(model) = std::env::var("ROSTER_MODEL") {
            self.service.model = model;
        }
        if let Ok(retries) = std::env::var("ROSTER_RETRY_COUNT") {
            if let Ok(value) = retries.parse() {
                self.service.retry_count = value;
            }
        }
    }

    /// Validate the configuration for consistency and sane ranges
    pub fn validate(&self) -> Result<()> {
        if self.layout.column_boundaries.len() != self.layout.column_names.len() + 1 {
            return Err(Error::configuration(format!(
                "Expected {} column boundaries for {} columns, got {}",
                self.layout.column_names.len() + 1,
                self.layout.column_names.len(),
                self.layout.column_boundaries.len()
            )));
        }

        if self
            .layout
            .column_boundaries
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            return Err(Error::configuration(
                "Column boundaries must be strictly ascending",
            ));
        }

        if self.performance.parallel_workers == 0
            || self.performance.parallel_workers > MAX_PARALLEL_WORKERS
        {
            return Err(Error::configuration(format!(
                "parallel_workers must be between 1 and {}",
                MAX_PARALLEL_WORKERS
            )));
        }

        if self.service.retry_count == 0 {
            return Err(Error::configuration("retry_count must be at least 1"));
        }

        if !(0.0..=100.0).contains(&self.validation.max_empty_percentage) {
            return Err(Error::configuration(
                "max_empty_percentage must be between 0 and 100",
            ));
        }

        Ok(())
    }

    /// Create the output directory if it does not exist
    pub fn ensure_output_directory(&self) -> Result<()> {
        let output = &self.processing.output_path;
        if !output.exists() {
            std::fs::create_dir_all(output).map_err(|e| {
                Error::configuration(format!(
                    "Failed to create output directory '{}': {}",
                    output.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Bridges into service-level option types
    // -------------------------------------------------------------------------

    /// Column layout built from the configured boundaries and names
    pub fn column_layout(&self) -> Result<ColumnLayout> {
        ColumnLayout::new(
            self.layout.column_boundaries.clone(),
            self.layout.column_names.clone(),
        )
    }

    /// Row-assembly options from the layout section
    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            skip_leading_lines: self.layout.skip_leading_lines,
            heading_x_threshold: self.layout.heading_x_threshold,
            heading_max_tokens: self.layout.heading_max_tokens,
            running_header_patterns: self.layout.running_header_patterns.clone(),
            row_grouping_threshold: self.layout.row_grouping_threshold,
        }
    }

    /// Transcript parser options from the layout section
    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            merge_overflow_into_last: self.layout.merge_overflow_into_last,
        }
    }

    /// Validator options from the validation section
    pub fn validator_options(&self) -> ValidatorOptions {
        ValidatorOptions {
            required_columns: self.validation.required_columns.clone(),
            max_empty_percentage: self.validation.max_empty_percentage,
            check_state_birthplace: self.validation.check_state_birthplace,
        }
    }

    /// Best-of-N policy from the service section
    pub fn extractor_policy(&self) -> ExtractorPolicy {
        ExtractorPolicy {
            retry_count: self.service.retry_count,
            retry_delay: Duration::from_millis(self.service.retry_delay_ms),
            accept_threshold: ACCEPT_CONFIDENCE_THRESHOLD,
            retry_floor: RETRY_CONFIDENCE_FLOOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.layout.column_names.len(), 5);
        assert_eq!(config.service.retry_count, 3);
    }

    #[test]
    fn test_validate_rejects_bad_boundaries() {
        let mut config = Config::default();
        config.layout.column_boundaries = vec![0.0, 0.5, 0.4, 0.6, 0.7, 1.0];
        assert!(config.validate().is_err());

        config.layout.column_boundaries = vec![0.0, 1.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_workers() {
        let mut config = Config::default();
        config.performance.parallel_workers = 0;
        assert!(config.validate().is_err());

        config.performance.parallel_workers = MAX_PARALLEL_WORKERS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_file_overlays_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [performance]
            parallel_workers = 2

            [service]
            retry_count = 5
            "#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.performance.parallel_workers, 2);
        assert_eq!(config.service.retry_count, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.layout.column_names.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_layered_paths_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [processing]
            input_path = "/from/file"
            "#,
        )
        .unwrap();

        let config = Config::load_layered(
            Some(PathBuf::from("/from/cli")),
            None,
            Some(path.as_path()),
        )
        .unwrap();

        assert_eq!(config.processing.input_path, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_ensure_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("output");
        let config = Config::new(dir.path().to_path_buf(), output.clone());

        config.ensure_output_directory().unwrap();
        assert!(output.exists());
    }

    #[test]
    fn test_column_layout_bridge() {
        let config = Config::default();
        let layout = config.column_layout().unwrap();
        assert_eq!(layout.column_count(), 5);
        assert_eq!(layout.classify(0.4), Some(1));
    }
}
