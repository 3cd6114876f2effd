//! # layercv - Layer CV spreadsheet reshaping
//!
//! Turns wide layer cyclic-voltammetry spreadsheets (one voltage/current
//! column pair per experimental setup) into a long `setup,voltage,current`
//! CSV.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ xlsx / CSV  │────▶│   Parser    │────▶│   Reshape   │────▶│  Long CSV   │
//! │  (upload)   │     │ (skip rows) │     │ (2i, 2i+1)  │     │  (export)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use layercv::{process_file, export_csv, ReshapeConfig};
//!
//! let result = process_file("layer_CV.xlsx".as_ref(), &ReshapeConfig::default())?;
//! std::fs::write("transformed_layer_cv.csv", export_csv(&result.table)?)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Raw and normalized tables, setup labels
//! - [`parser`] - xlsx / delimited text parsing
//! - [`transform`] - Reshape and pipeline
//! - [`export`] - Long-format CSV export
//! - [`config`] - Layered configuration
//! - [`library`] - Chemical library store and search
//! - [`api`] - HTTP API server and log channel

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Export
pub mod export;

// Chemical library
pub mod library;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ExportError, LibraryError, ParseError, PipelineError, ReshapeError, ServerError,
};

// =============================================================================
// Re-exports - Models & config
// =============================================================================

pub use config::ReshapeConfig;
pub use models::{default_setups, Cell, NormalizedTable, RawTable, Record, SetupLabel};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes, parse_file, ParseOptions,
    ParsedSource, SourceFormat,
};

// =============================================================================
// Re-exports - Reshape & pipeline
// =============================================================================

pub use transform::{
    process_bytes, process_file, reshape, reshape_with_report, ReshapeOutput, ReshapeReport,
    SetupReport, SourceInfo,
};

// =============================================================================
// Re-exports - Export
// =============================================================================

pub use export::{export_csv, read_normalized_csv, write_csv_file};

// =============================================================================
// Re-exports - Library
// =============================================================================

pub use library::ChemicalLibrary;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
