//! Error types for the layer CV reshape pipeline.
//!
//! - [`ParseError`] - source bytes could not be read as a table
//! - [`ReshapeError`] - table layout does not fit the configured setups
//! - [`ExportError`] - CSV export / re-read errors
//! - [`LibraryError`] - chemical library errors
//! - [`ConfigError`] - configuration errors
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP adapter errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Parse Errors
// =============================================================================

/// The source bytes cannot be parsed as tabular data.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The workbook is corrupt or not an xlsx file.
    #[error("Invalid workbook: {0}")]
    Workbook(String),

    /// The workbook contains no worksheet.
    #[error("No worksheet found in workbook")]
    NoWorksheet,

    /// The text could not be decoded.
    #[error("Failed to decode text: {0}")]
    Encoding(String),

    /// Malformed delimited text.
    #[error("Invalid delimited text: {0}")]
    Csv(String),
}

impl From<csv::Error> for ParseError {
    fn from(e: csv::Error) -> Self {
        ParseError::Csv(e.to_string())
    }
}

impl From<calamine::XlsxError> for ParseError {
    fn from(e: calamine::XlsxError) -> Self {
        ParseError::Workbook(e.to_string())
    }
}

// =============================================================================
// Reshape Errors
// =============================================================================

/// Errors raised while reshaping a wide table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReshapeError {
    /// The table has fewer columns than `2 × setups`.
    #[error("Expected at least {expected} columns (2 per setup), found {found}")]
    ColumnCountMismatch { expected: usize, found: usize },
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing or re-reading the long-format CSV.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Library Errors
// =============================================================================

/// Errors from the chemical library store.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Library IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Library CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Uploaded library has no header row.
    #[error("Library CSV has no header row")]
    NoHeaders,
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while building a [`crate::config::ReshapeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// At least one setup label is required.
    #[error("No setup labels configured")]
    NoSetups,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::process_file`]
/// and [`crate::transform::pipeline::process_bytes`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Reshape error: {0}")]
    Reshape(#[from] ReshapeError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A blocking worker panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Task(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type ParseResult<T> = Result<T, ParseError>;

pub type ReshapeResult<T> = Result<T, ReshapeError>;

pub type ExportResult<T> = Result<T, ExportError>;

pub type LibraryResult<T> = Result<T, LibraryError>;

pub type ConfigResult<T> = Result<T, ConfigError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ParseError -> PipelineError
        let parse_err = ParseError::NoWorksheet;
        let pipeline_err: PipelineError = parse_err.into();
        assert!(pipeline_err.to_string().contains("worksheet"));

        // ReshapeError -> PipelineError -> ServerError
        let reshape_err = ReshapeError::ColumnCountMismatch { expected: 8, found: 6 };
        let server_err: ServerError = PipelineError::from(reshape_err).into();
        assert!(server_err.to_string().contains("8"));
        assert!(server_err.to_string().contains("6"));
    }

    #[test]
    fn test_config_error_format() {
        let err = ConfigError::InvalidValue {
            key: "skip_rows".into(),
            message: "not a number".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("skip_rows"));
        assert!(msg.contains("not a number"));
    }
}
