//! Domain models for the reshape pipeline.
//!
//! - [`Cell`] - One spreadsheet cell (empty, number or text)
//! - [`RawTable`] - Wide input table, columns addressed by position
//! - [`SetupLabel`] - Name of an experimental configuration
//! - [`Record`] - One `(setup, voltage, current)` observation
//! - [`NormalizedTable`] - Long-format output, grouped by setup

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Raw Input
// =============================================================================

/// A single cell of the wide input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    /// Build a cell from delimited text. Blank text is [`Cell::Empty`].
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    /// Numeric value of the cell, if it has one.
    ///
    /// Text counts as numeric when it parses as a finite decimal number.
    /// `NaN`, infinities, and anything else are treated as missing.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            Cell::Number(n) => *n,
            Cell::Text(s) => s.trim().parse::<f64>().ok()?,
            Cell::Empty => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
            Cell::Empty => Ok(()),
        }
    }
}

/// Wide-format table as read from the source file.
///
/// Columns are positional. `headers`, when the source had a header row,
/// holds their names but nothing downstream relies on them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from numeric rows; `None` becomes an empty cell.
    pub fn from_numbers(rows: Vec<Vec<Option<f64>>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|v| v.map_or(Cell::Empty, Cell::Number))
                    .collect()
            })
            .collect();
        Self { headers: Vec::new(), rows }
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns: the widest of the header and every row.
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    /// Cell at `(row, column)`. Short rows read as empty.
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY)
    }
}

// =============================================================================
// Setups
// =============================================================================

/// Name of one experimental configuration.
///
/// The label at index `i` of the configured sequence owns columns `2i`
/// (voltage) and `2i + 1` (current) of the wide table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetupLabel(String);

impl SetupLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SetupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SetupLabel {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SetupLabel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The setups of the original layer CV measurement, in column order.
pub fn default_setups() -> Vec<SetupLabel> {
    ["bare", "Mxene", "Mxene + AuNPs", "Mxene + AuNPs + nic"]
        .into_iter()
        .map(SetupLabel::from)
        .collect()
}

// =============================================================================
// Long Output
// =============================================================================

/// One long-format observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub setup: SetupLabel,
    pub voltage: f64,
    pub current: f64,
}

/// Long-format table: one batch per setup, in setup order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedTable {
    pub records: Vec<Record>,
}

impl NormalizedTable {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Records belonging to one setup.
    pub fn for_setup<'a>(&'a self, setup: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| r.setup.as_str() == setup)
    }
}

impl<'a> IntoIterator for &'a NormalizedTable {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_numeric_text() {
        assert_eq!(Cell::from_text(" 0.25 ").as_number(), Some(0.25));
        assert_eq!(Cell::from_text("-1e-6").as_number(), Some(-1e-6));
        assert_eq!(Cell::Number(3.0).as_number(), Some(3.0));
    }

    #[test]
    fn test_cell_missing_values() {
        assert!(Cell::from_text("   ").is_empty());
        assert_eq!(Cell::Empty.as_number(), None);
        assert_eq!(Cell::from_text("NA").as_number(), None);
        assert_eq!(Cell::from_text("NaN").as_number(), None);
        assert_eq!(Cell::Number(f64::INFINITY).as_number(), None);
    }

    #[test]
    fn test_column_count_uses_widest_row() {
        let table = RawTable::new(
            vec!["a".into(), "b".into()],
            vec![vec![Cell::Empty; 3], vec![Cell::Empty]],
        );
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.cell(1, 2), &Cell::Empty);
        assert_eq!(table.cell(9, 0), &Cell::Empty);
    }

    #[test]
    fn test_default_setups_order() {
        let setups = default_setups();
        assert_eq!(setups.len(), 4);
        assert_eq!(setups[0].as_str(), "bare");
        assert_eq!(setups[3].as_str(), "Mxene + AuNPs + nic");
    }
}
