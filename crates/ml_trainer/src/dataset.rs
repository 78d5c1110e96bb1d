//! Tabular training dataset I/O
//!
//! CSV with header `item_name,category,quantity,target`, one row per record
//! in the order given.

use calorie_ml_core::record::Record;
use std::io::{Read, Write};
use std::path::Path;

use crate::errors::DatasetError;

/// Header row of the tabular export.
pub const CSV_HEADER: [&str; 4] = ["item_name", "category", "quantity", "target"];

/// Write records as CSV. The header is written even for an empty slice.
pub fn write_records_csv<W: Write>(records: &[Record], writer: W) -> Result<(), DatasetError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv.write_record(CSV_HEADER)?;
    for record in records {
        csv.serialize(record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Render records as CSV bytes.
pub fn records_to_csv(records: &[Record]) -> Result<Vec<u8>, DatasetError> {
    let mut buffer = Vec::new();
    write_records_csv(records, &mut buffer)?;
    Ok(buffer)
}

/// Parse and validate records from CSV.
pub fn read_records_csv<R: Read>(reader: R) -> Result<Vec<Record>, DatasetError> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (idx, row) in csv.deserialize::<Record>().enumerate() {
        // Header is line 1
        let row_number = idx + 2;
        let record = row?;

        if record.item_name.trim().is_empty() || record.category.trim().is_empty() {
            return Err(DatasetError::InvalidRow {
                row: row_number,
                reason: "item_name and category must be non-empty".into(),
            });
        }
        if !(record.quantity.is_finite() && record.quantity > 0.0) {
            return Err(DatasetError::InvalidRow {
                row: row_number,
                reason: format!("quantity must be > 0, got {}", record.quantity),
            });
        }
        if !(record.target.is_finite() && record.target >= 0.0) {
            return Err(DatasetError::InvalidRow {
                row: row_number,
                reason: format!("target must be >= 0, got {}", record.target),
            });
        }

        records.push(record);
    }

    if records.is_empty() {
        return Err(DatasetError::Empty);
    }

    Ok(records)
}

/// Load records from a CSV file.
pub fn load_records_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Record>, DatasetError> {
    let file = std::fs::File::open(path.as_ref())?;
    read_records_csv(std::io::BufReader::new(file))
}
