//! Chemical library - a CSV of chemicals/polymers and the diseases
//! associated with them.
//!
//! The library is a plain CSV on disk. Column order and extra columns are
//! preserved; only [`NAME_COLUMN`] and [`DISEASES_COLUMN`] have meaning.

use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::{LibraryError, LibraryResult};

/// Chemical name column; values are trimmed on load.
pub const NAME_COLUMN: &str = "Chemical_Name";

/// Associated disease column.
pub const DISEASES_COLUMN: &str = "Associated_Diseases";

/// In-memory copy of the library CSV.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChemicalLibrary {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ChemicalLibrary {
    /// Load the library from disk. A missing file is an empty library.
    pub fn load(path: &Path) -> LibraryResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path)?;
        Self::from_csv_bytes(&bytes)
    }

    /// Parse a library CSV (header row required).
    pub fn from_csv_bytes(bytes: &[u8]) -> LibraryResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(bytes);

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(LibraryError::NoHeaders);
        }

        let name_idx = headers.iter().position(|h| h == NAME_COLUMN);
        let mut rows = Vec::new();
        for record in reader.records() {
            let mut row: Vec<String> = record?.iter().map(String::from).collect();
            if let Some(cell) = name_idx.and_then(|i| row.get_mut(i)) {
                *cell = cell.trim().to_string();
            }
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    /// Write the library to disk, creating parent directories.
    pub fn save(&self, path: &Path) -> LibraryResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_csv()?)?;
        Ok(())
    }

    /// Serialize back to CSV bytes.
    pub fn to_csv(&self) -> LibraryResult<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| LibraryError::Io(e.into_error()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose name or associated diseases contain `term`, ignoring case.
    ///
    /// A blank term matches nothing.
    pub fn search(&self, term: &str) -> Vec<&[String]> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let columns: Vec<usize> = [NAME_COLUMN, DISEASES_COLUMN]
            .iter()
            .filter_map(|name| self.headers.iter().position(|h| h == name))
            .collect();

        self.rows
            .iter()
            .filter(|row| {
                columns.iter().any(|&i| {
                    row.get(i)
                        .is_some_and(|v| v.to_lowercase().contains(&needle))
                })
            })
            .map(Vec::as_slice)
            .collect()
    }

    /// Rows as `header -> value` maps, for JSON responses.
    pub fn rows_as_maps<'a>(&'a self, rows: &[&'a [String]]) -> Vec<serde_json::Map<String, serde_json::Value>> {
        rows.iter()
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, v)| (h.clone(), serde_json::Value::String(v.clone())))
                    .collect()
            })
            .collect()
    }
}
