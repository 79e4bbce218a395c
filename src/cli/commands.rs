//! Command implementations for the roster processor CLI
//!
//! This module contains the main command execution logic, progress
//! reporting, and final report generation for the CLI interface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::services::batch::{self, BatchOutcome, BatchProcessor, ExtractionEngine};
use crate::app::services::transcription::VisionClient;
use crate::app::services::{output, validator};
use crate::cli::args::{Args, Commands, ExtractArgs, OutputFormat, ProcessArgs, ValidateArgs};
use crate::config::Config;
use crate::constants::VALIDATION_REPORT_FILENAME;
use crate::{Error, Result};

/// Main command dispatcher
pub async fn run(args: Args, cancellation_token: CancellationToken) -> Result<()> {
    match args.command {
        Some(Commands::Process(process_args)) => run_process(process_args, cancellation_token).await,
        Some(Commands::Extract(extract_args)) => run_extract(extract_args).await,
        Some(Commands::Validate(validate_args)) => run_validate(validate_args),
        None => Err(Error::configuration("No command specified")),
    }
}

/// Set up structured logging based on the resolved log level
fn setup_logging(log_level: &str, quiet: bool) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("roster_processor={}", log_level)));

    if quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

// =============================================================================
// process
// =============================================================================

async fn run_process(args: ProcessArgs, cancellation_token: CancellationToken) -> Result<()> {
    let start_time = Instant::now();
    setup_logging(args.get_log_level(), args.quiet)?;

    info!("Starting roster processor");
    debug!("Command line arguments: {:?}", args);

    args.validate()?;
    let config = load_configuration(&args)?;
    debug!("Loaded configuration: {:?}", config);

    let engine: ExtractionEngine = args.engine.into();

    if args.dry_run {
        return run_dry_run(&config, engine);
    }

    let processor = BatchProcessor::new(Arc::new(config), engine);
    let outcome = processor
        .run(cancellation_token, args.show_progress())
        .await?;

    let elapsed = start_time.elapsed();
    generate_process_report(&args.output_format, &outcome, elapsed.as_secs_f64())
}

/// Load configuration using the layered approach (file -> env -> args)
fn load_configuration(args: &ProcessArgs) -> Result<Config> {
    info!("Loading configuration");

    let default_config_path = if args.config_file.is_none() {
        Config::default_config_path().ok()
    } else {
        None
    };

    let config_file = match &args.config_file {
        Some(path) => Some(path.as_path()),
        None => default_config_path
            .as_ref()
            .filter(|path| path.exists())
            .map(|path| path.as_path()),
    };

    if let Some(config_path) = config_file {
        info!("Using config file: {}", config_path.display());
    } else {
        info!("No config file found, using defaults and environment variables");
    }

    let mut config = Config::load_layered(
        Some(args.input_path.clone()),
        args.output_path.clone(),
        config_file,
    )?;

    // Apply CLI argument overrides
    if args.pattern.is_some() {
        config.processing.file_pattern = args.pattern.clone();
    }
    config.processing.dry_run = args.dry_run;
    config.processing.force_overwrite = args.force_overwrite;
    config.performance.parallel_workers = args.workers;
    config.service.retry_count = args.retry_count;
    config.logging.level = args.get_log_level().to_string();
    config.logging.structured = !args.quiet;

    config.validate()?;
    Ok(config)
}

/// Perform a dry run showing what would be processed
fn run_dry_run(config: &Config, engine: ExtractionEngine) -> Result<()> {
    info!("Performing dry run - no files will be created");

    let processor = BatchProcessor::new(Arc::new(config.clone()), engine);
    let files = processor.discover_files()?;

    for file in &files {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let output = config
            .processing
            .output_path
            .join(crate::constants::get_output_filename(&stem));
        info!("Would process {} -> {}", file.display(), output.display());
    }

    info!(
        "Dry run complete: {} files would be processed with the {} engine",
        files.len(),
        engine
    );
    Ok(())
}

/// Generate the end-of-batch report in the requested format
fn generate_process_report(
    format: &OutputFormat,
    outcome: &BatchOutcome,
    elapsed_secs: f64,
) -> Result<()> {
    match format {
        OutputFormat::Human => {
            let summary = &outcome.summary;
            println!();
            println!("{}", "Roster extraction complete".bold());
            println!(
                "  Files processed:  {} ({} successful)",
                summary.total_files,
                summary.successful.to_string().green()
            );
            println!("  Rows extracted:   {}", summary.total_rows);
            println!(
                "  Mean time/file:   {:.2}s (total {:.2}s)",
                summary.mean_processing_time, elapsed_secs
            );

            let invalid = outcome.reports.iter().filter(|r| !r.valid).count();
            if invalid > 0 {
                println!(
                    "  Validation:       {} of {} tables flagged invalid",
                    invalid.to_string().red(),
                    outcome.reports.len()
                );
            } else if !outcome.reports.is_empty() {
                println!(
                    "  Validation:       all {} tables passed",
                    outcome.reports.len()
                );
            }

            if let Some(combined) = &outcome.combined_path {
                println!("  Combined output:  {}", combined.display());
            }

            if !summary.failures.is_empty() {
                println!();
                println!("{}", "Failed files:".red().bold());
                for entry in &summary.failures {
                    println!(
                        "  {} - {}: {}",
                        entry.file,
                        entry.status,
                        entry.error.as_deref().unwrap_or("Unknown error")
                    );
                }
            }
            println!();
        }
        OutputFormat::Json => {
            let summary = &outcome.summary;
            let json = serde_json::json!({
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "total_files": summary.total_files,
                "successful": summary.successful,
                "total_rows": summary.total_rows,
                "mean_processing_time_seconds": summary.mean_processing_time,
                "elapsed_seconds": elapsed_secs,
                "combined_output": outcome.combined_path.as_ref().map(|p| p.display().to_string()),
                "failures": summary.failures.iter().map(|e| {
                    serde_json::json!({
                        "file": e.file,
                        "status": e.status.to_string(),
                        "error": e.error,
                    })
                }).collect::<Vec<_>>(),
                "reports": outcome.reports,
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap());
        }
        OutputFormat::Csv => {
            let summary = &outcome.summary;
            println!("metric,value");
            println!("total_files,{}", summary.total_files);
            println!("successful,{}", summary.successful);
            println!("total_rows,{}", summary.total_rows);
            println!(
                "mean_processing_time_seconds,{}",
                summary.mean_processing_time
            );
            println!("elapsed_seconds,{}", elapsed_secs);
        }
    }
    Ok(())
}

// =============================================================================
// extract
// =============================================================================

async fn run_extract(args: ExtractArgs) -> Result<()> {
    setup_logging(args.get_log_level(), args.quiet)?;
    args.validate()?;

    let mut config = Config::load_layered(None, None, args.config_file.as_deref())?;
    config.service.retry_count = args.retry_count;
    config.validate()?;

    let engine: ExtractionEngine = args.engine.into();
    let client = match engine {
        ExtractionEngine::Vision => Some(Arc::new(VisionClient::from_config(&config.service)?)),
        ExtractionEngine::Fragments => None,
    };

    let table = batch::extract_table(&config, engine, client, &args.input_file).await?;

    let output_path = args
        .output_file
        .clone()
        .unwrap_or_else(|| args.input_file.with_extension("csv"));
    output::write_table(&table, &output_path)?;

    let report = validator::validate_table(
        &args.input_file.display().to_string(),
        &table,
        &config.validator_options(),
    );

    println!(
        "Extracted {} rows to {}",
        table.row_count(),
        output_path.display()
    );
    if !report.valid {
        for issue in &report.issues {
            println!("{} {}", "issue:".red(), issue);
        }
    }
    for warning in &report.warnings {
        println!("{} {}", "warning:".yellow(), warning);
    }

    Ok(())
}

// =============================================================================
// validate
// =============================================================================

fn run_validate(args: ValidateArgs) -> Result<()> {
    setup_logging(args.get_log_level(), args.quiet)?;
    args.validate()?;

    let config = Config::load_layered(None, None, args.config_file.as_deref())?;
    let options = config.validator_options();

    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| args.input_path.join(VALIDATION_REPORT_FILENAME));

    // Collect candidate CSV files, excluding the report itself
    let mut csv_files: Vec<PathBuf> = std::fs::read_dir(&args.input_path)
        .map_err(|e| Error::io(format!("Failed to read {}", args.input_path.display()), e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "csv") && path != &report_path
        })
        .collect();
    csv_files.sort();

    if csv_files.is_empty() {
        warn!("No CSV files found in {}", args.input_path.display());
        return Ok(());
    }

    info!("Validating {} CSV files", csv_files.len());

    let mut reports = Vec::new();
    for path in &csv_files {
        info!("Validating {}", path.display());
        match validator::validate_csv_file(path, &options) {
            Ok(report) => reports.push(report),
            Err(e) => {
                // Unreadable input still gets a report line
                warn!("Validation error for {}: {}", path.display(), e);
                let mut report = crate::app::models::ValidationReport::passing(
                    path.display().to_string(),
                    0,
                );
                report.add_issue(format!("Error processing file: {}", e));
                reports.push(report);
            }
        }
    }

    batch::write_validation_reports(&reports, &report_path)?;
    info!("Validation report saved to {}", report_path.display());

    let valid_count = reports.iter().filter(|r| r.valid).count();
    let total_rows: usize = reports.iter().map(|r| r.row_count).sum();

    match args.output_format {
        OutputFormat::Human => {
            println!();
            println!(
                "Validation complete: {}/{} files valid, {} total rows",
                valid_count,
                reports.len(),
                total_rows
            );
            for report in reports.iter().filter(|r| !r.valid) {
                println!(
                    "  {} {}: {}",
                    "invalid".red(),
                    report.file,
                    report.issues.join("; ")
                );
            }
            println!();
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports).unwrap());
        }
        OutputFormat::Csv => {
            println!("file,valid,row_count");
            for report in &reports {
                println!("{},{},{}", report.file, report.valid, report.row_count);
            }
        }
    }

    Ok(())
}
