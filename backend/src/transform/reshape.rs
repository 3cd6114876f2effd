//! Wide-to-long reshape of layer CV tables.
//!
//! # Layout
//!
//! ```text
//! Wide input (positional)                    Long output
//! ┌──────┬──────┬──────┬──────┬───┐          ┌──────────┬─────────┬─────────┐
//! │ V0   │ I0   │ V1   │ I1   │...│          │ setup    │ voltage │ current │
//! ├──────┼──────┼──────┼──────┼───┤    →     ├──────────┼─────────┼─────────┤
//! │ -0.2 │ 1e-6 │ -0.2 │ 2e-6 │   │          │ setups[0]│ -0.2    │ 1e-6    │
//! │ -0.1 │ 3e-6 │ -0.1 │      │   │          │ setups[0]│ -0.1    │ 3e-6    │
//! └──────┴──────┴──────┴──────┴───┘          │ setups[1]│ -0.2    │ 2e-6    │
//!                                            └──────────┴─────────┴─────────┘
//! ```
//!
//! Setup `i` reads column `2i` as voltage and `2i + 1` as current.
//! Each setup produces one batch in row order; batches are joined in
//! setup order and rows missing either value are dropped.

use serde::Serialize;

use crate::error::{ReshapeError, ReshapeResult};
use crate::models::{NormalizedTable, RawTable, Record, SetupLabel};

/// Columns a table needs for `setups` setups.
pub fn required_columns(setups: usize) -> usize {
    setups * 2
}

/// Per-setup outcome of a reshape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupReport {
    pub setup: SetupLabel,
    pub voltage_column: usize,
    pub current_column: usize,
    /// Records kept for this setup.
    pub kept: usize,
    /// Data-row indices (0-based) whose record was dropped.
    pub dropped_rows: Vec<usize>,
}

/// Reshape result with per-setup statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ReshapeReport {
    pub table: NormalizedTable,
    pub setups: Vec<SetupReport>,
    /// Columns present beyond the ones the setups use.
    pub ignored_columns: usize,
}

impl ReshapeReport {
    pub fn dropped_count(&self) -> usize {
        self.setups.iter().map(|s| s.dropped_rows.len()).sum()
    }
}

/// Reshape a wide table into `(setup, voltage, current)` records.
///
/// `raw` must already have its header/metadata rows removed. Columns past
/// `2 × setups.len()` are ignored. A table without rows yields an empty
/// result.
///
/// # Errors
///
/// [`ReshapeError::ColumnCountMismatch`] when `raw` has fewer than
/// `2 × setups.len()` columns.
///
/// # Example
///
/// ```
/// use layercv::{reshape, RawTable, SetupLabel};
///
/// let raw = RawTable::from_numbers(vec![
///     vec![Some(0.1), Some(1.0), Some(0.1), None],
///     vec![Some(0.2), Some(2.0), Some(0.2), Some(4.0)],
/// ]);
/// let setups = vec![SetupLabel::from("bare"), SetupLabel::from("Mxene")];
///
/// let table = reshape(&raw, &setups).unwrap();
/// assert_eq!(table.len(), 3);
/// assert_eq!(table.records[2].setup.as_str(), "Mxene");
/// ```
pub fn reshape(raw: &RawTable, setups: &[SetupLabel]) -> ReshapeResult<NormalizedTable> {
    reshape_with_report(raw, setups).map(|report| report.table)
}

/// Same as [`reshape`], also returning which rows each setup dropped.
pub fn reshape_with_report(raw: &RawTable, setups: &[SetupLabel]) -> ReshapeResult<ReshapeReport> {
    let expected = required_columns(setups.len());
    let found = raw.column_count();
    if found < expected {
        return Err(ReshapeError::ColumnCountMismatch { expected, found });
    }

    let (batches, reports): (Vec<Vec<Record>>, Vec<SetupReport>) = setups
        .iter()
        .enumerate()
        .map(|(i, setup)| setup_batch(raw, setup, i))
        .unzip();

    Ok(ReshapeReport {
        table: NormalizedTable::new(batches.into_iter().flatten().collect()),
        setups: reports,
        ignored_columns: found - expected,
    })
}

/// Build the record batch for setup `index`.
fn setup_batch(raw: &RawTable, setup: &SetupLabel, index: usize) -> (Vec<Record>, SetupReport) {
    let voltage_column = index * 2;
    let current_column = voltage_column + 1;

    let mut records = Vec::with_capacity(raw.len());
    let mut dropped_rows = Vec::new();

    for row in 0..raw.len() {
        let voltage = raw.cell(row, voltage_column).as_number();
        let current = raw.cell(row, current_column).as_number();
        match (voltage, current) {
            (Some(voltage), Some(current)) => records.push(Record {
                setup: setup.clone(),
                voltage,
                current,
            }),
            _ => dropped_rows.push(row),
        }
    }

    let report = SetupReport {
        setup: setup.clone(),
        voltage_column,
        current_column,
        kept: records.len(),
        dropped_rows,
    };
    (records, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_setups, Cell};

    /// `rows` × 8 table where every cell is numeric and distinct.
    fn full_table(rows: usize) -> RawTable {
        RawTable::from_numbers(
            (0..rows)
                .map(|r| (0..8).map(|c| Some((r * 10 + c) as f64)).collect())
                .collect(),
        )
    }

    #[test]
    fn test_full_table_yields_setups_times_rows() {
        let setups = default_setups();
        let raw = full_table(5);
        let table = reshape(&raw, &setups).unwrap();
        assert_eq!(table.len(), setups.len() * raw.len());
    }

    #[test]
    fn test_missing_current_drops_one_record() {
        // 4 setups, 3 rows, row 2 misses the "Mxene" current (column 3)
        let mut raw = full_table(3);
        raw.rows[1][3] = Cell::Empty;

        let table = reshape(&raw, &default_setups()).unwrap();
        assert_eq!(table.len(), 11);
        assert_eq!(table.for_setup("Mxene").count(), 2);
        assert_eq!(table.for_setup("bare").count(), 3);
        assert_eq!(table.for_setup("Mxene + AuNPs").count(), 3);
    }

    #[test]
    fn test_missing_value_only_affects_its_setup() {
        let mut raw = full_table(2);
        raw.rows[0][4] = Cell::Text("n/a".into());

        let report = reshape_with_report(&raw, &default_setups()).unwrap();
        assert_eq!(report.setups[2].dropped_rows, vec![0]);
        assert!(report.setups[0].dropped_rows.is_empty());
        assert!(report.setups[3].dropped_rows.is_empty());
        assert_eq!(report.dropped_count(), 1);
    }

    #[test]
    fn test_batches_are_grouped_and_ordered() {
        let setups = default_setups();
        let table = reshape(&full_table(4), &setups).unwrap();

        let order: Vec<&str> = table.iter().map(|r| r.setup.as_str()).collect();
        for (i, setup) in setups.iter().enumerate() {
            let positions: Vec<usize> = order
                .iter()
                .enumerate()
                .filter(|(_, s)| **s == setup.as_str())
                .map(|(p, _)| p)
                .collect();
            assert_eq!(positions, (i * 4..i * 4 + 4).collect::<Vec<_>>());
        }

        // Row order within a setup follows the input.
        let voltages: Vec<f64> = table.for_setup("Mxene").map(|r| r.voltage).collect();
        assert_eq!(voltages, vec![2.0, 12.0, 22.0, 32.0]);
        let currents: Vec<f64> = table.for_setup("Mxene").map(|r| r.current).collect();
        assert_eq!(currents, vec![3.0, 13.0, 23.0, 33.0]);
    }

    #[test]
    fn test_zero_rows_is_not_an_error() {
        let raw = RawTable::new((0..8).map(|c| format!("c{}", c)).collect(), Vec::new());
        let table = reshape(&raw, &default_setups()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_too_few_columns() {
        let raw = RawTable::from_numbers(vec![vec![Some(1.0); 6]]);
        let err = reshape(&raw, &default_setups()).unwrap_err();
        assert_eq!(err, ReshapeError::ColumnCountMismatch { expected: 8, found: 6 });
    }

    #[test]
    fn test_extra_columns_ignored() {
        let raw = RawTable::from_numbers(vec![vec![Some(1.0); 11]]);
        let report = reshape_with_report(&raw, &default_setups()).unwrap();
        assert_eq!(report.table.len(), 4);
        assert_eq!(report.ignored_columns, 3);
    }

    #[test]
    fn test_alternative_setup_count() {
        let setups = vec![SetupLabel::from("a"), SetupLabel::from("b")];
        let raw = full_table(3);
        let report = reshape_with_report(&raw, &setups).unwrap();
        assert_eq!(report.table.len(), 6);
        assert_eq!(report.ignored_columns, 4);
        assert_eq!(report.setups[1].voltage_column, 2);
        assert_eq!(report.setups[1].current_column, 3);
    }

    #[test]
    fn test_numeric_text_cells_are_accepted() {
        let raw = RawTable::new(
            Vec::new(),
            vec![vec![Cell::Text("-0.5".into()), Cell::Text(" 1.5e-6 ".into())]],
        );
        let table = reshape(&raw, &[SetupLabel::from("bare")]).unwrap();
        assert_eq!(table.records[0].voltage, -0.5);
        assert_eq!(table.records[0].current, 1.5e-6);
    }
}
