// src/dataset.rs
//
// The export file, in memory. Columns keep their input order; the derived
// columns are appended once at the end. The same structure doubles as the
// checkpoint: a save is a full rewrite of every row.

use std::collections::HashMap;
use std::path::Path;

use crate::config::consts::REQUIRED_COLUMNS;
use crate::error::EnhanceError;

/// Columns this tool adds to the export.
pub const DERIVED_COLUMNS: [&str; 3] = ["read_dates", "genres", "n_ratings"];

/// One book row, keyed by column name. Unknown columns read as empty.
#[derive(Clone, Debug, Default)]
pub struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        self.fields.insert(column.to_string(), value.into());
    }
}

#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl Dataset {
    /// Append the derived columns that are not already present. Idempotent.
    pub fn ensure_derived_columns(&mut self) {
        for derived in DERIVED_COLUMNS {
            if !self.columns.iter().any(|c| c == derived) {
                self.columns.push(derived.to_string());
            }
        }
    }
}

/// Read and validate an export file. Missing required columns or malformed
/// rows fail here, before any network activity.
pub fn read_export(path: &Path) -> Result<Dataset, EnhanceError> {
    let mut reader = csv::ReaderBuilder::new().from_path(path).map_err(|e| {
        EnhanceError::DatasetFormat(format!("cannot open {}: {e}", path.display()))
    })?;

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| EnhanceError::DatasetFormat(format!("cannot read header row: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !columns.iter().any(|c| c == *required))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(EnhanceError::DatasetFormat(format!(
            "{} is missing required columns: {}",
            path.display(),
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result
            .map_err(|e| EnhanceError::DatasetFormat(format!("malformed row: {e}")))?;
        let mut row = Record::default();
        for (column, value) in columns.iter().zip(record.iter()) {
            row.set(column, value);
        }
        rows.push(row);
    }

    Ok(Dataset { columns, rows })
}

/// Rewrite the whole dataset to `path`. Minimal quoting, header first.
pub fn write_export(dataset: &Dataset, path: &Path) -> Result<(), EnhanceError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_path(path)
        .map_err(|e| {
            EnhanceError::DatasetFormat(format!("cannot write {}: {e}", path.display()))
        })?;

    writer
        .write_record(&dataset.columns)
        .map_err(|e| EnhanceError::DatasetFormat(format!("writing header: {e}")))?;
    for row in &dataset.rows {
        writer
            .write_record(dataset.columns.iter().map(|c| row.get(c)))
            .map_err(|e| EnhanceError::DatasetFormat(format!("writing row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| EnhanceError::DatasetFormat(format!("flushing {}: {e}", path.display())))?;
    Ok(())
}
