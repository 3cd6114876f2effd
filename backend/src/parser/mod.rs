//! Tabular input parsing: xlsx workbooks and delimited text.
//!
//! Both sources go through the same steps:
//!
//! 1. Read every row of the first worksheet (or every text record)
//! 2. Drop the first `skip_rows` physical rows (title / metadata lines,
//!    blank lines included)
//! 3. Take the next row as column names when `has_header` is set
//! 4. Keep the rest as positional data rows
//!
//! Delimited text additionally gets encoding and delimiter detection.

use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Xlsx};

use crate::error::{ParseError, ParseResult};
use crate::models::{Cell, RawTable};

/// ZIP local file header; every xlsx starts with it.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Kind of source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Xlsx,
    Delimited,
}

impl SourceFormat {
    /// Detect the format from content, falling back to the file name.
    pub fn detect(bytes: &[u8], file_name: Option<&str>) -> Self {
        if bytes.starts_with(ZIP_MAGIC) {
            return SourceFormat::Xlsx;
        }
        let is_xlsx_name = file_name
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
        if is_xlsx_name {
            SourceFormat::Xlsx
        } else {
            SourceFormat::Delimited
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Xlsx => f.write_str("xlsx"),
            SourceFormat::Delimited => f.write_str("delimited text"),
        }
    }
}

/// How to read a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Leading rows to discard before the header.
    pub skip_rows: usize,
    /// Whether the first kept row holds column names.
    pub has_header: bool,
    /// Delimiter for text sources (auto-detect if not specified).
    pub delimiter: Option<char>,
    /// Force a source format instead of detecting it.
    pub format: Option<SourceFormat>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            skip_rows: 2,
            has_header: true,
            delimiter: None,
            format: None,
        }
    }
}

/// A parsed table with details about how it was read.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub table: RawTable,
    pub format: SourceFormat,
    /// Detected text encoding (`None` for workbooks).
    pub encoding: Option<String>,
    /// Detected or given delimiter (`None` for workbooks).
    pub delimiter: Option<char>,
}

// =============================================================================
// Entry Points
// =============================================================================

/// Parse a file, detecting its format from content and extension.
pub fn parse_file<P: AsRef<Path>>(path: P, options: &ParseOptions) -> ParseResult<ParsedSource> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path.file_name().and_then(|n| n.to_str());
    parse_bytes(&bytes, name, options)
}

/// Parse in-memory bytes (e.g. an upload).
pub fn parse_bytes(
    bytes: &[u8],
    file_name: Option<&str>,
    options: &ParseOptions,
) -> ParseResult<ParsedSource> {
    let format = options
        .format
        .unwrap_or_else(|| SourceFormat::detect(bytes, file_name));

    match format {
        SourceFormat::Xlsx => Ok(ParsedSource {
            table: parse_xlsx(bytes, options)?,
            format,
            encoding: None,
            delimiter: None,
        }),
        SourceFormat::Delimited => {
            let encoding = detect_encoding(bytes);
            let content = decode_content(bytes, &encoding)?;
            let delimiter = options
                .delimiter
                .unwrap_or_else(|| detect_delimiter(&content, options.skip_rows));
            let table = parse_delimited(&content, delimiter, options)?;
            Ok(ParsedSource {
                table,
                format,
                encoding: Some(encoding),
                delimiter: Some(delimiter),
            })
        }
    }
}

// =============================================================================
// Workbooks
// =============================================================================

/// Read the first worksheet of an xlsx workbook.
pub fn parse_xlsx(bytes: &[u8], options: &ParseOptions) -> ParseResult<RawTable> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::NoWorksheet)??;

    // The range starts at the first used cell; anchor it back to A1.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let leading = std::iter::repeat_with(Vec::new).take(row_offset);
    let rows = range.rows().map(|row| {
        std::iter::repeat(Cell::Empty)
            .take(col_offset)
            .chain(row.iter().map(cell_from_data))
            .collect::<Vec<_>>()
    });

    Ok(split_rows(leading.chain(rows).skip(options.skip_rows), options.has_header))
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::from_text(s),
        Data::Empty => Cell::Empty,
        other => Cell::Text(other.to_string()),
    }
}

// =============================================================================
// Delimited Text
// =============================================================================

/// Detect the encoding of raw bytes.
///
/// A byte order mark wins; otherwise chardet guesses.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if let Some((encoding, _)) = encoding_rs::Encoding::for_bom(bytes) {
        return encoding.name().to_lowercase();
    }

    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Malformed input, unsupported labels and NUL bytes are errors.
pub fn decode_content(bytes: &[u8], encoding: &str) -> ParseResult<String> {
    let label = encoding.to_lowercase();
    let text = match label.as_str() {
        "utf-8" | "utf8" => decode_utf8(bytes)?,
        // WHATWG maps every latin1 label to windows-1252
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            decode_with(encoding_rs::WINDOWS_1252, bytes)?
        }
        _ => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(found) => decode_with(found, bytes)?,
            None => decode_utf8(bytes).map_err(|_| {
                ParseError::Encoding(format!("unsupported encoding '{}'", encoding))
            })?,
        },
    };

    if text.contains('\0') {
        return Err(ParseError::Encoding("binary content (NUL bytes)".to_string()));
    }
    Ok(text)
}

fn decode_utf8(bytes: &[u8]) -> ParseResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ParseError::Encoding(format!("invalid utf-8: {}", e)))
}

fn decode_with(encoding: &'static encoding_rs::Encoding, bytes: &[u8]) -> ParseResult<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ParseError::Encoding(format!("malformed {} input", encoding.name())));
    }
    Ok(text.into_owned())
}

/// Detect the delimiter by counting occurrences in the first data line.
///
/// Title lines in `skip_rows` are usually free text, so counting starts
/// after them. Falls back to `,` when no candidate appears.
pub fn detect_delimiter(content: &str, skip_rows: usize) -> char {
    let line = content
        .lines()
        .skip(skip_rows)
        .find(|l| !l.trim().is_empty())
        .unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse decoded delimited text into a table.
pub fn parse_delimited(content: &str, delimiter: char, options: &ParseOptions) -> ParseResult<RawTable> {
    if !delimiter.is_ascii() {
        return Err(ParseError::Csv(format!("delimiter '{}' is not ASCII", delimiter)));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(skip_lines(content, options.skip_rows).as_bytes());

    let rows = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(Cell::from_text).collect::<Vec<_>>()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(split_rows(rows.into_iter(), options.has_header))
}

/// Drop `count` physical lines. The csv reader ignores blank lines, so
/// skipping has to happen before it sees the text.
fn skip_lines(content: &str, count: usize) -> &str {
    let mut rest = content;
    for _ in 0..count {
        match rest.find('\n') {
            Some(end) => rest = &rest[end + 1..],
            None => return "",
        }
    }
    rest
}

// =============================================================================
// Shared
// =============================================================================

/// Split already-skipped rows into header and data.
fn split_rows<I>(mut rows: I, has_header: bool) -> RawTable
where
    I: Iterator<Item = Vec<Cell>>,
{
    let headers = if has_header {
        rows.next()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    RawTable::new(headers, rows.collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(skip_rows: usize, has_header: bool) -> ParseOptions {
        ParseOptions {
            skip_rows,
            has_header,
            ..ParseOptions::default()
        }
    }

    #[test]
    fn test_skip_rows_and_header() {
        let csv = "Layer CV run 3\nscan rate 50mV/s\nV,I\n0.1,2.5\n0.2,3.5\n";
        let table = parse_delimited(csv, ',', &opts(2, true)).unwrap();

        assert_eq!(table.headers, vec!["V", "I"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0).as_number(), Some(0.1));
        assert_eq!(table.cell(1, 1).as_number(), Some(3.5));
    }

    #[test]
    fn test_no_header() {
        let csv = "0.1;2.5\n0.2;3.5";
        let table = parse_delimited(csv, ';', &opts(0, false)).unwrap();
        assert!(table.headers.is_empty());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_fewer_rows_than_skip_is_empty() {
        let table = parse_delimited("title\n", ',', &opts(2, true)).unwrap();
        assert!(table.is_empty());
        assert!(table.headers.is_empty());
    }

    #[test]
    fn test_ragged_rows_and_missing_values() {
        let csv = "a,b,c\n1,,3\n4";
        let table = parse_delimited(csv, ',', &opts(0, true)).unwrap();

        assert_eq!(table.column_count(), 3);
        assert!(table.cell(0, 1).is_empty());
        assert!(table.cell(1, 2).is_empty());
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name;value\n\"Alice; B\";\"1.5\"";
        let table = parse_delimited(csv, ';', &opts(0, true)).unwrap();

        assert_eq!(table.cell(0, 0), &Cell::Text("Alice; B".into()));
        assert_eq!(table.cell(0, 1).as_number(), Some(1.5));
    }

    #[test]
    fn test_detect_delimiter_after_title_lines() {
        let content = "Title, with comma\nnotes\na;b;c\n1;2;3";
        assert_eq!(detect_delimiter(content, 2), ';');
    }

    #[test]
    fn test_detect_delimiter_variants() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3", 0), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3", 0), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3", 0), '|');
        assert_eq!(detect_delimiter("single", 0), ',');
    }

    #[test]
    fn test_blank_line_inside_skipped_rows() {
        let csv = "Nicotine layer CV\n\nV,I\n1,2\n3,4\n";
        let table = parse_delimited(csv, ',', &opts(2, true)).unwrap();

        assert_eq!(table.headers, vec!["V", "I"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0).as_number(), Some(1.0));
    }

    #[test]
    fn test_skip_lines() {
        assert_eq!(skip_lines("a\r\n\nb\nc", 2), "b\nc");
        assert_eq!(skip_lines("a\nb", 0), "a\nb");
        assert_eq!(skip_lines("a\n", 3), "");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société ¤½" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9, 0x20, 0xA4, 0xBD];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société ¤½");
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let result = decode_content(b"V,I\n\xFF\xFE,1\n", "utf-8");
        assert!(matches!(result, Err(ParseError::Encoding(_))));
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let decoded = decode_content(b"\xEF\xBB\xBFV,I", "utf-8").unwrap();
        assert_eq!(decoded, "V,I");
    }

    #[test]
    fn test_unknown_label_requires_utf8() {
        assert_eq!(decode_content(b"V,I", "x-no-such-charset").unwrap(), "V,I");
        let result = decode_content(b"V,\xFF", "x-no-such-charset");
        assert!(matches!(result, Err(ParseError::Encoding(_))));
    }

    #[test]
    fn test_utf16_bom_and_lone_surrogate() {
        // BOM, then an unpaired high surrogate followed by 'A'
        let bytes: &[u8] = &[0xFF, 0xFE, 0x00, 0xD8, 0x41, 0x00];
        assert_eq!(detect_encoding(bytes), "utf-16le");
        let result = decode_content(bytes, "utf-16le");
        assert!(matches!(result, Err(ParseError::Encoding(_))));
    }

    #[test]
    fn test_nul_bytes_rejected() {
        let result = decode_content(b"V,I\n\x001,2", "windows-1252");
        assert!(matches!(result, Err(ParseError::Encoding(_))));
    }

    #[test]
    fn test_parse_bytes_detects_text() {
        let csv = "run\nV0,I0\n0.1,0.2\n";
        let parsed = parse_bytes(csv.as_bytes(), Some("run.csv"), &opts(1, true)).unwrap();

        assert_eq!(parsed.format, SourceFormat::Delimited);
        assert_eq!(parsed.delimiter, Some(','));
        assert_eq!(parsed.table.headers, vec!["V0", "I0"]);
        assert_eq!(parsed.table.len(), 1);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(SourceFormat::detect(b"PK\x03\x04rest", None), SourceFormat::Xlsx);
        assert_eq!(SourceFormat::detect(b"a,b", Some("data.XLSX")), SourceFormat::Xlsx);
        assert_eq!(SourceFormat::detect(b"a,b", Some("data.csv")), SourceFormat::Delimited);
    }

    #[test]
    fn test_corrupt_workbook() {
        let result = parse_bytes(b"PK\x03\x04garbage", None, &ParseOptions::default());
        assert!(matches!(result, Err(ParseError::Workbook(_))));
    }

    #[test]
    fn test_xlsx_workbook() {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Layer CV").unwrap();
        sheet.write_string(1, 0, "50 mV/s").unwrap();
        sheet.write_string(2, 0, "Potential").unwrap();
        sheet.write_string(2, 1, "Current").unwrap();
        sheet.write_number(3, 0, -0.25).unwrap();
        sheet.write_number(3, 1, 1.5).unwrap();
        sheet.write_number(4, 0, 0.25).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let parsed = parse_bytes(&bytes, None, &ParseOptions::default()).unwrap();
        assert_eq!(parsed.format, SourceFormat::Xlsx);
        assert_eq!(parsed.table.headers, vec!["Potential", "Current"]);
        assert_eq!(parsed.table.len(), 2);
        assert_eq!(parsed.table.cell(0, 0).as_number(), Some(-0.25));
        assert_eq!(parsed.table.cell(0, 1).as_number(), Some(1.5));
        assert!(parsed.table.cell(1, 1).is_empty());
    }

    #[test]
    fn test_xlsx_anchored_at_a1() {
        use rust_xlsxwriter::Workbook;

        // Used range starts at B3, so rows 1-2 and column A are empty
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(2, 1, "V").unwrap();
        sheet.write_string(2, 2, "I").unwrap();
        sheet.write_number(3, 1, 0.5).unwrap();
        sheet.write_number(3, 2, 1.5).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = parse_xlsx(&bytes, &ParseOptions::default()).unwrap();
        assert_eq!(table.headers, vec!["", "V", "I"]);
        assert_eq!(table.len(), 1);
        assert!(table.cell(0, 0).is_empty());
        assert_eq!(table.cell(0, 1).as_number(), Some(0.5));
        assert_eq!(table.cell(0, 2).as_number(), Some(1.5));
    }
}
