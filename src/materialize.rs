//! Applying an assignment plan to spreadsheet rows.
//!
//! Each row yields a fresh copy of the template with the mapped cells written
//! in. Rows are processed lazily and independently: a row that cannot be
//! materialized produces a [`MaterializationError`] in its place and the rest
//! of the batch carries on.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::MaterializationError;
use crate::mapping::{AssignmentPlan, Target};
use crate::table::{CellValue, Row, UnreadableRow};
use crate::template::{KeyPath, fill_placeholders, lookup_mut};

lazy_static! {
    static ref UNSAFE_NAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
}

const MAX_NAME_LEN: usize = 120;

/// What to write when a mapped cell is empty or absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCellPolicy {
    /// Write an empty string
    #[default]
    EmptyString,
    /// Write `null` at key paths; placeholders become empty text
    Null,
    /// Leave the template's value in place
    KeepTemplate,
    /// Skip the row and report it
    Error,
}

/// One generated JSON document
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDocument {
    /// Zero-based data row index this document came from
    pub row: usize,
    /// Suggested archive entry name, before collision handling
    pub name: String,
    pub value: Value,
}

/// Applies a plan to rows
#[derive(Debug, Clone)]
pub struct Materializer<'a> {
    plan: &'a AssignmentPlan,
    missing_cell: MissingCellPolicy,
    name_column: Option<&'a str>,
}

impl<'a> Materializer<'a> {
    pub fn new(plan: &'a AssignmentPlan) -> Self {
        Materializer {
            plan,
            missing_cell: MissingCellPolicy::default(),
            name_column: None,
        }
    }

    pub fn missing_cell(mut self, policy: MissingCellPolicy) -> Self {
        self.missing_cell = policy;
        self
    }

    /// Name entries after this column's value instead of the row index
    pub fn name_column(mut self, column: Option<&'a str>) -> Self {
        self.name_column = column;
        self
    }

    /// Lazily materialize `rows`, in order
    pub fn run<I>(self, rows: I) -> impl Iterator<Item = Result<OutputDocument, MaterializationError>> + 'a
    where
        I: IntoIterator<Item = Result<Row, UnreadableRow>>,
        I::IntoIter: 'a,
    {
        rows.into_iter().map(move |row| {
            let result = row
                .map_err(|unreadable| MaterializationError::MalformedRow {
                    row: unreadable.index,
                    reason: unreadable.reason,
                })
                .and_then(|row| self.materialize_row(&row));
            if let Err(e) = &result {
                warn!(row = e.row(), "skipping row: {}", e);
            }
            result
        })
    }

    /// Build the document for a single row
    pub fn materialize_row(&self, row: &Row) -> Result<OutputDocument, MaterializationError> {
        let mut document = self.plan.template().skeleton();
        let mut written: Vec<&KeyPath> = Vec::new();
        let mut replacements: Vec<(&str, String)> = Vec::new();

        for (column, target) in self.plan.assignments() {
            let cell = self.read_cell(row, column)?;
            match target {
                Target::KeyPath(path) => {
                    let value = match cell {
                        Some(cell) => cell.to_json(),
                        None => match self.missing_cell {
                            MissingCellPolicy::EmptyString => Value::String(String::new()),
                            MissingCellPolicy::Null => Value::Null,
                            _ => continue,
                        },
                    };
                    if let Some(slot) = lookup_mut(&mut document, path) {
                        *slot = value;
                        written.push(path);
                    }
                }
                Target::Placeholder(token) => {
                    let text = match cell {
                        Some(cell) => cell.to_text(),
                        None if self.missing_cell == MissingCellPolicy::KeepTemplate => continue,
                        None => String::new(),
                    };
                    replacements.push((token.as_str(), text));
                }
            }
        }

        // Leaves written from cells keep the cell value verbatim.
        if !replacements.is_empty() {
            fill_placeholders(&mut document, &replacements, &written);
        }

        Ok(OutputDocument {
            row: row.index,
            name: self.entry_name(row),
            value: document,
        })
    }

    // `Ok(None)` means the cell is missing and the policy allows it.
    fn read_cell<'r>(&self, row: &'r Row, column: &str) -> Result<Option<&'r CellValue>, MaterializationError> {
        match row.get(column) {
            Some(CellValue::Error(e)) => Err(MaterializationError::MalformedRow {
                row: row.index,
                reason: format!("column '{column}' holds error value {e}"),
            }),
            Some(cell) if !cell.is_empty() => Ok(Some(cell)),
            _ if self.missing_cell == MissingCellPolicy::Error => Err(MaterializationError::MissingCell {
                row: row.index,
                column: column.to_string(),
            }),
            _ => Ok(None),
        }
    }

    fn entry_name(&self, row: &Row) -> String {
        self.name_column
            .and_then(|column| row.get(column))
            .map(|cell| sanitize_name(&cell.to_text()))
            .filter(|name| !name.is_empty())
            .map(|name| format!("{name}.json"))
            .unwrap_or_else(|| default_entry_name(row.index))
    }
}

/// `output_{row}.json`
pub fn default_entry_name(row: usize) -> String {
    format!("output_{row}.json")
}

fn sanitize_name(raw: &str) -> String {
    let cleaned = UNSAFE_NAME_CHARS.replace_all(raw.trim(), "_");
    cleaned
        .trim_start_matches('.')
        .chars()
        .take(MAX_NAME_LEN)
        .collect()
}

/// Materialize `rows` with the default options
pub fn materialize<'a, I>(
    rows: I,
    plan: &'a AssignmentPlan,
) -> impl Iterator<Item = Result<OutputDocument, MaterializationError>> + 'a
where
    I: IntoIterator<Item = Result<Row, UnreadableRow>>,
    I::IntoIter: 'a,
{
    Materializer::new(plan).run(rows)
}
