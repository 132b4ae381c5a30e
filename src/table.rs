//! In-memory spreadsheet tables: a header row and the data rows beneath it.

use chrono::NaiveDateTime;
use serde_json::{Number, Value};
use std::collections::HashMap;

/// A single cell value as read from the spreadsheet
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    /// Spreadsheet error value such as `#DIV/0!`
    Error(String),
}

impl CellValue {
    /// Empty cells and whitespace-only strings count as missing
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// JSON value written at a key path. `Empty` maps to `null`; callers
    /// apply the missing-cell policy before getting here.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Empty => Value::Null,
            CellValue::String(s) => Value::String(s.clone()),
            CellValue::Int(i) => Value::from(*i),
            CellValue::Float(f) => float_to_json(*f),
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::DateTime(dt) => Value::String(format_datetime(dt)),
            CellValue::Error(e) => Value::String(e.clone()),
        }
    }

    /// Text substituted for a placeholder
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Float(f) => match float_to_json(*f) {
                Value::String(s) => s,
                other => other.to_string(),
            },
            CellValue::DateTime(dt) => format_datetime(dt),
            CellValue::Error(e) => e.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Bool(b) => b.to_string(),
        }
    }
}

// Whole floats come back from Excel for integer columns; emit them as integers.
fn float_to_json(f: f64) -> Value {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        return Value::from(f as i64);
    }
    Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(f.to_string()))
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.time() == chrono::NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// One data row, keyed by column identifier
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// Zero-based index among the data rows
    pub index: usize,
    pub cells: HashMap<String, CellValue>,
}

impl Row {
    pub fn new(index: usize) -> Self {
        Row {
            index,
            cells: HashMap::new(),
        }
    }

    /// Builder-style insert, mostly for tests and callers constructing rows by hand
    pub fn with(mut self, column: impl Into<String>, value: CellValue) -> Self {
        self.cells.insert(column.into(), value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }
}

/// A data row the reader could not make sense of
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableRow {
    pub index: usize,
    pub reason: String,
}

/// Header plus rows. Unreadable rows keep their slot so row indices stay stable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Result<Row, UnreadableRow>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Make header names unique and non-blank, the way pandas names data frame
/// columns: blanks become `Unnamed: {i}`, repeats get `.1`, `.2`, ...
pub fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::with_capacity(raw.len());
    let mut counts: HashMap<String, usize> = HashMap::new();

    for (i, name) in raw.into_iter().enumerate() {
        let name = name.trim();
        let base = if name.is_empty() {
            format!("Unnamed: {i}")
        } else {
            name.to_string()
        };

        let mut candidate = base.clone();
        while headers.contains(&candidate) {
            let n = counts.entry(base.clone()).or_insert(0);
            *n += 1;
            candidate = format!("{base}.{n}");
        }
        headers.push(candidate);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn whole_floats_become_integers() {
        assert_eq!(CellValue::Float(30.0).to_json(), json!(30));
        assert_eq!(CellValue::Float(1.5).to_json(), json!(1.5));
        assert_eq!(CellValue::Float(f64::NAN).to_json(), json!("NaN"));
        assert_eq!(CellValue::Float(30.0).to_text(), "30");
    }

    #[test]
    fn dates_render_as_iso_8601() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let midnight = CellValue::DateTime(day.and_hms_opt(0, 0, 0).unwrap());
        let afternoon = CellValue::DateTime(day.and_hms_opt(14, 5, 0).unwrap());
        assert_eq!(midnight.to_json(), json!("2024-03-09"));
        assert_eq!(afternoon.to_text(), "2024-03-09T14:05:00");
    }

    #[test]
    fn blank_strings_are_empty() {
        assert!(CellValue::String("  ".into()).is_empty());
        assert!(!CellValue::Int(0).is_empty());
    }

    #[test]
    fn headers_follow_pandas_naming() {
        let raw = vec!["Name", " ", "Name", "Age", "Name", "Name.1"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            normalize_headers(raw),
            vec!["Name", "Unnamed: 1", "Name.1", "Age", "Name.2", "Name.1.1"]
        );
    }
}
