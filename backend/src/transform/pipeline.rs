//! High-level pipeline: source file → wide table → long table.
//!
//! # Example
//!
//! ```rust,ignore
//! use layercv::{process_file, export_csv, ReshapeConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = process_file(Path::new("layer_CV.xlsx"), &ReshapeConfig::default())?;
//!     std::fs::write("transformed_layer_cv.csv", export_csv(&result.table)?)?;
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::Path;

use super::reshape::{reshape_with_report, SetupReport};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::config::ReshapeConfig;
use crate::error::PipelineResult;
use crate::models::NormalizedTable;
use crate::parser::{parse_bytes, parse_file, ParsedSource, SourceFormat};

/// Result of a complete pipeline run.
#[derive(Debug, Clone)]
pub struct ReshapeOutput {
    /// Long-format records
    pub table: NormalizedTable,
    /// Per-setup kept/dropped statistics
    pub setups: Vec<SetupReport>,
    /// Source parsing metadata
    pub source: SourceInfo,
}

impl ReshapeOutput {
    pub fn dropped_count(&self) -> usize {
        self.setups.iter().map(|s| s.dropped_rows.len()).sum()
    }
}

/// Source file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub format: SourceFormat,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
    pub headers: Vec<String>,
    pub row_count: usize,
    pub column_count: usize,
    pub skipped_rows: usize,
    /// Columns beyond the ones the setups read.
    pub ignored_columns: usize,
}

/// Reshape a file on disk.
pub fn process_file(path: &Path, config: &ReshapeConfig) -> PipelineResult<ReshapeOutput> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parsed = parse_file(path, &config.parse_options())?;
    process_parsed(parsed, config)
}

/// Reshape in-memory bytes, e.g. an upload.
///
/// `file_name` only helps format detection.
pub fn process_bytes(
    bytes: &[u8],
    file_name: Option<&str>,
    config: &ReshapeConfig,
) -> PipelineResult<ReshapeOutput> {
    log_info(format!(
        "📖 Reading {} ({} bytes)...",
        file_name.unwrap_or("upload"),
        bytes.len()
    ));
    let parsed = parse_bytes(bytes, file_name, &config.parse_options())?;
    process_parsed(parsed, config)
}

fn process_parsed(parsed: ParsedSource, config: &ReshapeConfig) -> PipelineResult<ReshapeOutput> {
    config.validate()?;
    let ParsedSource {
        table: raw,
        format,
        encoding,
        delimiter,
    } = parsed;

    log_success(format!("Format: {}", format));
    if let Some(ref enc) = encoding {
        log_success(format!("Encoding: {}", enc));
    }
    if let Some(d) = delimiter {
        log_success(format!("Delimiter: '{}'", format_delimiter(d)));
    }
    log_success(format!(
        "Skipped {} leading rows, read {} data rows × {} columns",
        config.skip_rows,
        raw.len(),
        raw.column_count()
    ));
    if raw.is_empty() {
        log_warning("No data rows; output will only contain the header");
    }

    log_info(format!("⚙️  Reshaping {} setups...", config.setups.len()));
    let report = reshape_with_report(&raw, &config.setups)?;

    for setup in &report.setups {
        log_info_indent(
            format!(
                "{} (columns {}/{}): {} kept, {} dropped",
                setup.setup,
                setup.voltage_column,
                setup.current_column,
                setup.kept,
                setup.dropped_rows.len()
            ),
            1,
        );
    }
    if report.ignored_columns > 0 {
        log_warning(format!("{} extra columns ignored", report.ignored_columns));
    }
    log_success(format!(
        "{} records ({} incomplete dropped)",
        report.table.len(),
        report.dropped_count()
    ));

    Ok(ReshapeOutput {
        source: SourceInfo {
            format,
            encoding,
            delimiter,
            row_count: raw.len(),
            column_count: raw.column_count(),
            headers: raw.headers,
            skipped_rows: config.skip_rows,
            ignored_columns: report.ignored_columns,
        },
        table: report.table,
        setups: report.setups,
    })
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, PipelineError, ReshapeError};
    use crate::export::export_csv;

    const WIDE_CSV: &str = "\
Nicotine layer CV
scan 50 mV/s
V bare,I bare,V Mx,I Mx,V Au,I Au,V nic,I nic
-0.2,1.0,-0.2,2.0,-0.2,3.0,-0.2,4.0
0.0,1.5,0.0,,0.0,3.5,0.0,4.5
0.2,1.8,0.2,2.8,0.2,3.8,0.2,4.8
";

    #[test]
    fn test_process_bytes_end_to_end() {
        let out = process_bytes(WIDE_CSV.as_bytes(), Some("layer_CV.csv"), &ReshapeConfig::default()).unwrap();

        assert_eq!(out.table.len(), 11);
        assert_eq!(out.table.for_setup("Mxene").count(), 2);
        assert_eq!(out.setups[1].dropped_rows, vec![1]);
        assert_eq!(out.dropped_count(), 1);
        assert_eq!(out.source.row_count, 3);
        assert_eq!(out.source.column_count, 8);
        assert_eq!(out.source.headers[0], "V bare");
        assert_eq!(out.source.delimiter, Some(','));
    }

    #[test]
    fn test_process_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer_CV.csv");
        std::fs::write(&path, WIDE_CSV).unwrap();

        let out = process_file(&path, &ReshapeConfig::default()).unwrap();
        assert_eq!(out.table.len(), 11);
    }

    #[test]
    fn test_blank_title_line_keeps_every_row() {
        let csv = "Nicotine layer CV\n\nV,I,V,I,V,I,V,I\n1,2,3,4,5,6,7,8\n9,10,11,12,13,14,15,16\n";
        let out = process_bytes(csv.as_bytes(), None, &ReshapeConfig::default()).unwrap();

        assert_eq!(out.source.headers, vec!["V", "I", "V", "I", "V", "I", "V", "I"]);
        assert_eq!(out.source.row_count, 2);
        assert_eq!(out.table.len(), 8);
    }

    #[test]
    fn test_undecodable_text_is_a_parse_error() {
        let bytes: &[u8] = &[0xFF, 0xFE, 0x00, 0xD8, 0x41, 0x00];
        let err = process_bytes(bytes, Some("layer_CV.csv"), &ReshapeConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(ParseError::Encoding(_))));
    }

    #[test]
    fn test_header_only_input() {
        let csv = "title\nnotes\nV,I,V,I,V,I,V,I\n";
        let out = process_bytes(csv.as_bytes(), None, &ReshapeConfig::default()).unwrap();

        assert!(out.table.is_empty());
        let text = String::from_utf8(export_csv(&out.table).unwrap()).unwrap();
        assert_eq!(text, "setup,voltage,current\n");
    }

    #[test]
    fn test_column_mismatch_surfaces() {
        let csv = "t\nn\na,b,c,d,e,f\n1,2,3,4,5,6\n";
        let err = process_bytes(csv.as_bytes(), None, &ReshapeConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Reshape(ReshapeError::ColumnCountMismatch { expected: 8, found: 6 })
        ));
    }

    #[test]
    fn test_format_delimiter() {
        assert_eq!(format_delimiter('\t'), "\\t");
        assert_eq!(format_delimiter(';'), ";");
    }
}
