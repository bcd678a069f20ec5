//! CSV reader built on Polars
//!
//! Schema inference is switched off so every column arrives as text;
//! flag parsing happens in the shared row mapper.

use std::io::Cursor;

use polars::prelude::*;

use super::RawTable;
use crate::error::{Result, SaintfestError};

pub fn read_csv(bytes: &[u8]) -> Result<RawTable> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(SaintfestError::Import("CSV file is empty".to_string()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()
        .map_err(|e| SaintfestError::Import(format!("Failed to parse CSV: {}", e)))?;

    dataframe_to_table(&df)
}

fn dataframe_to_table(df: &DataFrame) -> Result<RawTable> {
    let mut headers = Vec::with_capacity(df.width());
    let mut columns = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        headers.push(column.name().to_string());
        let values = column
            .str()
            .map_err(|e| SaintfestError::Import(format!("Column '{}' is not text: {}", column.name(), e)))?;
        columns.push(values);
    }

    let rows = (0..df.height())
        .map(|idx| {
            columns
                .iter()
                .map(|col| col.get(idx).unwrap_or("").to_string())
                .collect()
        })
        .collect();

    Ok(RawTable { headers, rows })
}
