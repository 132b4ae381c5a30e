use calamine::{Data, DataType, Reader, open_workbook_auto_from_rs};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

use crate::error::LoadError;
use crate::table::{CellValue, Row, Table, UnreadableRow, normalize_headers};

/// Spreadsheet formats the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// Any workbook calamine can open (xlsx, xlsm, xlsb, xls, ods)
    Workbook,
    Csv,
}

impl SheetFormat {
    /// Detect the format from a file name or path
    ///
    /// # Examples
    /// ```
    /// use sheetmap::loader::SheetFormat;
    ///
    /// assert_eq!(SheetFormat::from_path("data.XLSX").unwrap(), SheetFormat::Workbook);
    /// assert_eq!(SheetFormat::from_path("rows.csv").unwrap(), SheetFormat::Csv);
    /// assert!(SheetFormat::from_path("notes.txt").is_err());
    /// ```
    pub fn from_path(filepath: impl AsRef<Path>) -> Result<Self, LoadError> {
        let extension = filepath
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") | Some("ods") => {
                Ok(SheetFormat::Workbook)
            }
            Some("csv") => Ok(SheetFormat::Csv),
            Some(ext) => Err(LoadError::UnsupportedFormat(ext.to_string())),
            None => Err(LoadError::UnsupportedFormat("(no extension)".to_string())),
        }
    }
}

/// Read a spreadsheet held in memory.
///
/// `sheet` picks a worksheet by name; the first sheet is used when it is
/// `None`. CSV input ignores it.
pub fn read_table(bytes: &[u8], format: SheetFormat, sheet: Option<&str>) -> Result<Table, LoadError> {
    let table = match format {
        SheetFormat::Workbook => from_excel(bytes, sheet)?,
        SheetFormat::Csv => from_csv(bytes)?,
    };
    info!(
        columns = table.headers.len(),
        rows = table.row_count(),
        "spreadsheet loaded"
    );
    Ok(table)
}

/// Read a spreadsheet from disk, choosing the reader by file extension
///
/// # Examples
/// ```no_run
/// use sheetmap::loader::load_spreadsheet;
///
/// match load_spreadsheet("data.xlsx", None) {
///     Ok(table) => println!("Loaded {} rows", table.row_count()),
///     Err(e) => eprintln!("Error loading file: {}", e),
/// }
/// ```
pub fn load_spreadsheet(filepath: impl AsRef<Path>, sheet: Option<&str>) -> Result<Table, LoadError> {
    let path = filepath.as_ref();
    let format = SheetFormat::from_path(path)?;
    let bytes = fs::read(path)?;
    read_table(&bytes, format, sheet)
}

/// Load a workbook (xlsx, xls, xlsb, ods) from memory
pub fn from_excel(bytes: &[u8], sheet: Option<&str>) -> Result<Table, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let names = workbook.sheet_names();
    let position = match sheet {
        Some(name) => names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| LoadError::SheetNotFound(name.to_string()))?,
        None if names.is_empty() => return Err(LoadError::EmptySheet),
        None => 0,
    };
    debug!(sheet = %names[position], "reading worksheet");

    let range = workbook
        .worksheet_range_at(position)
        .ok_or_else(|| LoadError::SheetNotFound(names[position].clone()))??;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or(LoadError::EmptySheet)?;
    let headers = normalize_headers(header_row.iter().map(header_text).collect());

    let mut table = Table {
        headers,
        rows: Vec::new(),
    };

    for cells in rows {
        let values: Vec<CellValue> = cells.iter().map(cell_value).collect();
        if values.iter().all(CellValue::is_empty) {
            continue;
        }

        let mut row = Row::new(table.rows.len());
        for (header, value) in table.headers.iter().zip(values) {
            if !matches!(value, CellValue::Empty) {
                row.cells.insert(header.clone(), value);
            }
        }
        table.rows.push(Ok(row));
    }

    Ok(table)
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) => CellValue::DateTime(dt),
            None => CellValue::String(cell.to_string()),
        },
        Data::DurationIso(d) => CellValue::String(d.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

/// Load CSV text from memory. The first record is the header.
pub fn from_csv(bytes: &[u8]) -> Result<Table, LoadError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = reader.records();
    let header_record = records.next().ok_or(LoadError::EmptySheet)??;
    let headers = normalize_headers(header_record.iter().map(String::from).collect());

    let mut table = Table {
        headers,
        rows: Vec::new(),
    };

    for record in records {
        let index = table.rows.len();
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                table.rows.push(Err(UnreadableRow {
                    index,
                    reason: e.to_string(),
                }));
                continue;
            }
        };

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        if record.len() > table.headers.len() {
            table.rows.push(Err(UnreadableRow {
                index,
                reason: format!(
                    "{} fields but the header has {} columns",
                    record.len(),
                    table.headers.len()
                ),
            }));
            continue;
        }

        let mut row = Row::new(index);
        for (header, field) in table.headers.iter().zip(record.iter()) {
            if !field.is_empty() {
                row.cells.insert(header.clone(), csv_value(field));
            }
        }
        table.rows.push(Ok(row));
    }

    Ok(table)
}

// Numbers are typed the way a data frame would type them; everything else stays text.
fn csv_value(field: &str) -> CellValue {
    if let Ok(i) = field.parse::<i64>() {
        return CellValue::Int(i);
    }
    match field.parse::<f64>() {
        Ok(f) if f.is_finite() => CellValue::Float(f),
        _ => CellValue::String(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_rows_are_typed_and_indexed() {
        let table = from_csv(b"Name,Age,Score\nAlice,30,9.5\n,,\nBob,,x\n").unwrap();

        assert_eq!(table.headers, vec!["Name", "Age", "Score"]);
        assert_eq!(table.row_count(), 2);

        let bob = table.rows[1].as_ref().unwrap();
        assert_eq!(bob.index, 1);
        assert_eq!(bob.get("Name"), Some(&CellValue::String("Bob".into())));
        assert_eq!(bob.get("Age"), None);

        let alice = table.rows[0].as_ref().unwrap();
        assert_eq!(alice.get("Age"), Some(&CellValue::Int(30)));
        assert_eq!(alice.get("Score"), Some(&CellValue::Float(9.5)));
    }

    #[test]
    fn csv_overlong_rows_are_unreadable() {
        let table = from_csv(b"A,B\n1,2\n1,2,3\n4\n").unwrap();
        assert_eq!(table.row_count(), 3);
        assert!(table.rows[0].is_ok());
        assert_eq!(table.rows[1].as_ref().unwrap_err().index, 1);
        assert_eq!(table.rows[2].as_ref().unwrap().get("A"), Some(&CellValue::Int(4)));
    }

    #[test]
    fn empty_csv_has_no_header() {
        assert!(matches!(from_csv(b""), Err(LoadError::EmptySheet)));
    }

    #[test]
    fn csv_header_bom_is_dropped() {
        let table = from_csv(b"\xEF\xBB\xBFName\nAlice\n").unwrap();
        assert_eq!(table.headers, vec!["Name"]);
    }
}
