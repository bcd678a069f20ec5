//! Saint import from spreadsheets
//!
//! Both readers produce a [`RawTable`] of text cells; header mapping,
//! boolean parsing and upserts are shared.

pub mod csv;
pub mod excel;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SaintfestError};
use crate::model::saint::normalize_key;
use crate::model::{NewSaint, SaintCategory};
use crate::store::{Store, UpsertOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportFormat {
    Csv,
    Excel,
}

impl ImportFormat {
    pub fn from_extension(path: &str) -> Option<Self> {
        let ext = std::path::Path::new(path)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(ImportFormat::Csv),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(ImportFormat::Excel),
            _ => None,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match mime.as_str() {
            "text/csv" | "text/plain" | "application/csv" => Some(ImportFormat::Csv),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(ImportFormat::Excel),
            _ => None,
        }
    }
}

impl std::str::FromStr for ImportFormat {
    type Err = SaintfestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ImportFormat::Csv),
            "excel" | "xlsx" | "xls" | "ods" => Ok(ImportFormat::Excel),
            other => Err(SaintfestError::Invalid(format!("unknown import format '{}'", other))),
        }
    }
}

/// Header row plus data rows, every cell as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportIssue {
    /// 1-based line in the source file, header included.
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub issues: Vec<ImportIssue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    FeastDay,
    Patronage,
    Biography,
    ImageUrl,
    Born,
    Died,
    Canonized,
    Category(SaintCategory),
    Ignored,
}

fn classify_header(header: &str) -> Field {
    match normalize_key(header).as_str() {
        "name" | "saint" | "saint_name" => Field::Name,
        "feast_day" | "feast" | "feastday" => Field::FeastDay,
        "patronage" | "patron_of" | "patron" => Field::Patronage,
        "biography" | "bio" | "description" => Field::Biography,
        "image_url" | "image" | "photo" | "photo_url" => Field::ImageUrl,
        "born" | "birth" => Field::Born,
        "died" | "death" => Field::Died,
        "canonized" | "canonised" => Field::Canonized,
        _ => SaintCategory::from_header(header)
            .map(Field::Category)
            .unwrap_or(Field::Ignored),
    }
}

/// Spreadsheet truthiness. `None` when the cell is not a recognised value.
pub fn parse_flag(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "x" | "t" => Some(true),
        "false" | "no" | "n" | "0" | "" | "f" => Some(false),
        _ => None,
    }
}

/// Turn a table into saints, collecting per-row problems.
pub fn parse_saints(table: &RawTable) -> Result<(Vec<(usize, NewSaint)>, Vec<ImportIssue>)> {
    let fields: Vec<Field> = table.headers.iter().map(|h| classify_header(h)).collect();
    if !fields.contains(&Field::Name) {
        return Err(SaintfestError::Import(
            "no name column (expected 'name', 'saint' or 'saint_name')".to_string(),
        ));
    }

    let mut saints = Vec::with_capacity(table.rows.len());
    let mut issues = Vec::new();

    for (index, row) in table.rows.iter().enumerate() {
        let line = index + 2;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut saint = NewSaint::default();
        for (field, cell) in fields.iter().zip(row.iter()) {
            let text = || Some(cell.clone());
            match field {
                Field::Name => saint.name = cell.clone(),
                Field::FeastDay => saint.feast_day = text(),
                Field::Patronage => saint.patronage = text(),
                Field::Biography => saint.biography = text(),
                Field::ImageUrl => saint.image_url = text(),
                Field::Born => saint.born = text(),
                Field::Died => saint.died = text(),
                Field::Canonized => saint.canonized = text(),
                Field::Category(category) => match parse_flag(cell) {
                    Some(true) => {
                        saint.categories.insert(*category);
                    }
                    Some(false) => {}
                    None => issues.push(ImportIssue {
                        row: line,
                        message: format!("'{}' is not a yes/no value for {}", cell.trim(), category),
                    }),
                },
                Field::Ignored => {}
            }
        }

        match saint.validated() {
            Ok(saint) => saints.push((line, saint)),
            Err(e) => issues.push(ImportIssue {
                row: line,
                message: format!("skipped: {}", e),
            }),
        }
    }

    Ok((saints, issues))
}

pub fn read_table(format: ImportFormat, bytes: &[u8]) -> Result<RawTable> {
    match format {
        ImportFormat::Csv => csv::read_csv(bytes),
        ImportFormat::Excel => excel::read_workbook(bytes),
    }
}

/// Parse `bytes` and upsert every valid saint.
pub fn import_saints(store: &Store, format: ImportFormat, bytes: &[u8]) -> Result<ImportReport> {
    let table = read_table(format, bytes)?;
    let (saints, issues) = parse_saints(&table)?;

    let mut report = ImportReport {
        issues,
        ..Default::default()
    };

    for (line, saint) in saints {
        match store.upsert_saint(&saint) {
            Ok(UpsertOutcome::Created(_)) => report.created += 1,
            Ok(UpsertOutcome::Updated(_)) => report.updated += 1,
            Err(e) => report.issues.push(ImportIssue {
                row: line,
                message: format!("not saved: {}", e),
            }),
        }
    }
    report.issues.sort_by_key(|i| i.row);

    tracing::info!(
        "Imported saints ({:?}): {} created, {} updated, {} issues",
        format,
        report.created,
        report.updated,
        report.issues.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ImportFormat::from_extension("saints.CSV"), Some(ImportFormat::Csv));
        assert_eq!(ImportFormat::from_extension("/tmp/saints.xlsx"), Some(ImportFormat::Excel));
        assert_eq!(ImportFormat::from_extension("saints.pdf"), None);
        assert_eq!(ImportFormat::from_content_type("text/csv; charset=utf-8"), Some(ImportFormat::Csv));
        assert_eq!(
            ImportFormat::from_content_type("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
            Some(ImportFormat::Excel)
        );
        assert_eq!("xlsx".parse::<ImportFormat>().unwrap(), ImportFormat::Excel);
        assert!("json".parse::<ImportFormat>().is_err());
    }

    #[test]
    fn test_parse_flag() {
        for yes in ["TRUE", "yes", "Y", "1", "x", " true "] {
            assert_eq!(parse_flag(yes), Some(true), "{}", yes);
        }
        for no in ["FALSE", "no", "0", "", "  "] {
            assert_eq!(parse_flag(no), Some(false), "{}", no);
        }
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_header_aliases() {
        assert_eq!(classify_header("Saint Name"), Field::Name);
        assert_eq!(classify_header("Feast Day"), Field::FeastDay);
        assert_eq!(classify_header("patron-of"), Field::Patronage);
        assert_eq!(classify_header("Is Martyr"), Field::Category(SaintCategory::Martyr));
        assert_eq!(classify_header("Notes"), Field::Ignored);
    }

    #[test]
    fn test_parse_saints_rows() {
        let t = table(
            &["Name", "Feast Day", "Martyr", "Bishop", "Notes"],
            &[
                &["Ignatius of Antioch", "October 17", "TRUE", "yes", "letters"],
                &["", "", "", "", ""],
                &["", "May 1", "no", "no", ""],
                &["Catherine of Siena", "April 29", "perhaps", "0", ""],
            ],
        );
        let (saints, issues) = parse_saints(&t).unwrap();

        assert_eq!(saints.len(), 2);
        let (line, ignatius) = &saints[0];
        assert_eq!(*line, 2);
        assert_eq!(ignatius.feast_day.as_deref(), Some("October 17"));
        assert!(ignatius.categories.contains(&SaintCategory::Martyr));
        assert!(ignatius.categories.contains(&SaintCategory::Bishop));

        let (line, catherine) = &saints[1];
        assert_eq!(*line, 5);
        assert!(catherine.categories.is_empty());

        // blank row 3 is ignored; row 4 has no name; row 5 has a bad flag
        let rows: Vec<usize> = issues.iter().map(|i| i.row).collect();
        assert_eq!(rows, vec![4, 5]);
    }

    #[test]
    fn test_parse_saints_requires_name_column() {
        let t = table(&["Feast", "Martyr"], &[&["May 1", "yes"]]);
        assert!(matches!(parse_saints(&t), Err(SaintfestError::Import(_))));
    }

    #[test]
    fn test_import_upserts() {
        let store = Store::open_in_memory().unwrap();
        let csv = "name,martyr,mystic\nJoan of Arc,yes,yes\nJohn of the Cross,no,yes\n";
        let report = import_saints(&store, ImportFormat::Csv, csv.as_bytes()).unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.updated, 0);

        let again = "Name,Feast Day\nJoan of Arc,May 30\n";
        let report = import_saints(&store, ImportFormat::Csv, again.as_bytes()).unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 1);

        let joan = store.get_saint_by_slug("joan-of-arc").unwrap().unwrap();
        assert_eq!(joan.feast_day.as_deref(), Some("May 30"));
    }
}
