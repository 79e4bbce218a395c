use clap::Parser;
use roster_processor::cli::{args::Args, commands};
use std::process;
use tokio_util::sync::CancellationToken;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    // Create async runtime and run the main command logic with signal handling
    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        // Create cancellation token for coordinating graceful shutdown
        let cancellation_token = CancellationToken::new();

        // Set up graceful shutdown handling
        let shutdown_signal = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install CTRL+C signal handler");

            // Cancel all operations when Ctrl+C is received
            cancellation_token.cancel();
        };

        // Run the main command with cancellation support
        tokio::select! {
            result = commands::run(args, cancellation_token.clone()) => {
                result
            }
            _ = shutdown_signal => {
                eprintln!("\nReceived CTRL+C, shutting down gracefully...");
                Err(roster_processor::Error::processing_interrupted(
                    "Processing interrupted by user".to_string()
                ))
            }
        }
    });

    match result {
        Ok(()) => {
            // Success - results have already been reported by the command
            process::exit(0);
        }
        Err(error) => {
            // Error occurred - print to stderr and exit with error code
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("Roster Processor - Historical Register Table Extraction");
    println!("=======================================================");
    println!();
    println!("Reconstruct personnel roster tables from scanned historical register");
    println!("volumes into structured CSV files.");
    println!();
    println!("USAGE:");
    println!("    roster-processor <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    process     Process a directory of documents into CSV tables (main command)");
    println!("    extract     Extract a single document");
    println!("    validate    Validate previously extracted CSV files");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Show help information");
    println!("    -V, --version    Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    # Process OCR fragment dumps:");
    println!("    roster-processor process --input data/fragments --output data/tables");
    println!();
    println!("    # Process page images through the vision service:");
    println!("    roster-processor process --input data/pages --engine vision \\");
    println!("                             --output data/tables --retry-count 3");
    println!();
    println!("    # Validate extracted tables:");
    println!("    roster-processor validate --input data/tables");
    println!();
    println!("For detailed help on any command, use:");
    println!("    roster-processor <COMMAND> --help");
}
