//! Excel / OpenDocument reader (first worksheet, first row as headers)

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use super::RawTable;
use crate::error::{Result, SaintfestError};

pub fn read_workbook(bytes: &[u8]) -> Result<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SaintfestError::Import(format!("Failed to open workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SaintfestError::Import("workbook has no worksheets".to_string()))?
        .map_err(|e| SaintfestError::Import(format!("Failed to read first worksheet: {}", e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(cell_to_string).collect(),
        None => return Err(SaintfestError::Import("worksheet is empty".to_string())),
    };

    let rows = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Ok(RawTable { headers, rows })
}

/// Render a cell the way it reads in the spreadsheet. Whole floats drop their
/// fraction so `1.0` flags and years come through as `1` and `1582`.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Bool(b) => b.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}
