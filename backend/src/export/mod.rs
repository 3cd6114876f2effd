//! Long-format CSV export.
//!
//! Output is `setup,voltage,current` with `\n` line endings and no
//! trailing blank line. An empty table still gets its header row.

use std::path::Path;

use crate::error::ExportResult;
use crate::models::{NormalizedTable, Record};

/// Header of the exported CSV.
pub const CSV_HEADER: [&str; 3] = ["setup", "voltage", "current"];

/// Default file name offered for downloads.
pub const DEFAULT_FILE_NAME: &str = "transformed_layer_cv.csv";

/// Serialize a normalized table as CSV bytes.
pub fn export_csv(table: &NormalizedTable) -> ExportResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for record in table {
        writer.serialize(record)?;
    }

    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Export a table straight to a file.
pub fn write_csv_file(table: &NormalizedTable, path: &Path) -> ExportResult<()> {
    let bytes = export_csv(table)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Read back a CSV produced by [`export_csv`].
pub fn read_normalized_csv(bytes: &[u8]) -> ExportResult<NormalizedTable> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let records = reader
        .deserialize::<Record>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NormalizedTable::new(records))
}
