//! CSV input shared by the trainer and batch scoring

use crate::errors::{CoreError, Result};
use crate::features::RawRecord;
use serde_json::Value;
use std::io::Read;

/// A parsed CSV file: header plus one raw record per data row
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Header names absent from this table, in the order given
    pub fn missing_columns<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        required
            .into_iter()
            .filter(|c| !self.headers.iter().any(|h| h == c))
            .map(str::to_string)
            .collect()
    }

    /// Actual header matching `name` ignoring ASCII case
    pub fn find_column(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

/// Read a headed CSV into string cells; empty cells become `null`
pub fn read_table<R: Read>(reader: R) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CoreError::ValidationFailed("CSV has no header".into()));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(h, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (h.clone(), value)
            })
            .collect();
        records.push(record);
    }

    Ok(Table { headers, records })
}
