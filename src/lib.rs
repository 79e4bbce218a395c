//! Roster Processor Library
//!
//! A Rust library for reconstructing personnel roster tables from scanned
//! historical register volumes into structured CSV files.
//!
//! This library provides tools for:
//! - Classifying positioned OCR text fragments into fixed roster columns
//! - Assembling rows while carrying section headings and resolving ditto marks
//! - Parsing malformed delimited transcriptions with confidence scoring
//! - Driving repeated vision-service extraction attempts and keeping the best
//! - Processing batches of documents with per-file failure isolation
//! - Validating finished tables against schema and domain invariants

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod batch;
        pub mod column_layout;
        pub mod fragments;
        pub mod ledger;
        pub mod normalize;
        pub mod output;
        pub mod page_extractor;
        pub mod row_assembler;
        pub mod transcript_parser;
        pub mod transcription;
        pub mod validator;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{ExtractionAttempt, LedgerEntry, LedgerStatus, RosterTable, TextFragment};
pub use config::Config;

/// Result type alias for the roster processor
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for roster extraction operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error
    #[error("CSV parsing error in file '{file}': {message}")]
    CsvParsing {
        file: String,
        message: String,
        #[source]
        source: Option<csv::Error>,
    },

    /// OCR fragment dump format error
    #[error("Fragment dump format error in file '{file}': {message}")]
    FragmentFormat { file: String, message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generation-service request failed
    #[error("Transcription service error: {message}")]
    ServiceRequest {
        message: String,
        /// Whether the caller may retry the request
        retryable: bool,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Generation-service retries exhausted
    #[error("Transcription service failed after {attempts} attempts: {message}")]
    ServiceExhausted { attempts: usize, message: String },

    /// Every extraction attempt produced an empty or zero-confidence table
    #[error("No usable table data after {attempts} attempts")]
    NoUsableData { attempts: usize },

    /// Data validation error
    #[error("Data validation error: {message}")]
    DataValidation { message: String },

    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Directory traversal error
    #[error("Directory traversal error: {message}")]
    DirectoryTraversal {
        message: String,
        #[source]
        source: walkdir::Error,
    },

    /// Processing interrupted
    #[error("Processing interrupted: {reason}")]
    ProcessingInterrupted { reason: String },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create an I/O error with a simple message
    pub fn io_error(message: impl Into<String>) -> Self {
        let message_str = message.into();
        Self::Io {
            message: message_str.clone(),
            source: std::io::Error::other(message_str),
        }
    }

    /// Create a CSV parsing error with context
    pub fn csv_parsing(
        file: impl Into<String>,
        message: impl Into<String>,
        source: Option<csv::Error>,
    ) -> Self {
        Self::CsvParsing {
            file: file.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a fragment dump format error
    pub fn fragment_format(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FragmentFormat {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a service request error
    pub fn service_request(message: impl Into<String>, retryable: bool) -> Self {
        Self::ServiceRequest {
            message: message.into(),
            retryable,
            source: None,
        }
    }

    /// Create a retries-exhausted error
    pub fn service_exhausted(attempts: usize, message: impl Into<String>) -> Self {
        Self::ServiceExhausted {
            attempts,
            message: message.into(),
        }
    }

    /// Create a no-usable-data error
    pub fn no_usable_data(attempts: usize) -> Self {
        Self::NoUsableData { attempts }
    }

    /// Create a data validation error
    pub fn data_validation(message: impl Into<String>) -> Self {
        Self::DataValidation {
            message: message.into(),
        }
    }

    /// Create a file not found error
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a directory traversal error
    pub fn directory_traversal(message: impl Into<String>, source: walkdir::Error) -> Self {
        Self::DirectoryTraversal {
            message: message.into(),
            source,
        }
    }

    /// Create a processing interrupted error
    pub fn processing_interrupted(reason: impl Into<String>) -> Self {
        Self::ProcessingInterrupted {
            reason: reason.into(),
        }
    }

    /// Whether this error is a transient service condition worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceRequest { retryable: true, .. })
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::CsvParsing {
            file: "unknown".to_string(),
            message: "CSV parsing failed".to_string(),
            source: Some(error),
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(error: walkdir::Error) -> Self {
        Self::DirectoryTraversal {
            message: "Directory traversal failed".to_string(),
            source: error,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        // Connection drops and timeouts are worth another attempt; builder and
        // body-decode failures are not.
        let retryable = error.is_timeout() || error.is_connect();
        Self::ServiceRequest {
            message: error.to_string(),
            retryable,
            source: Some(error),
        }
    }
}
