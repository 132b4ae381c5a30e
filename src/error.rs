//! Error types for template loading, mapping validation and conversion

use thiserror::Error;

/// Errors raised while parsing a JSON template
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The template is not valid JSON
    #[error("Failed to parse template: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while reading a spreadsheet into a table
#[derive(Error, Debug)]
pub enum LoadError {
    /// File extension is not one of the supported spreadsheet formats
    #[error("Unsupported spreadsheet format: {0}")]
    UnsupportedFormat(String),

    /// The workbook could not be opened
    #[error("Failed to open workbook: {0}")]
    Workbook(#[from] calamine::Error),

    /// The CSV header could not be read
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    /// Requested sheet does not exist in the workbook
    #[error("Sheet '{0}' not found in workbook")]
    SheetNotFound(String),

    /// The workbook has no sheets, or the chosen sheet has no header row
    #[error("Spreadsheet has no header row")]
    EmptySheet,

    /// Reading the spreadsheet from disk failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal mapping problems detected before any row is processed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No mapping pairs were supplied
    #[error("Mapping is empty: map at least one column to a template key")]
    EmptyMapping,

    /// A mapping entry has a blank column identifier
    #[error("Mapping entry {position} has an empty column name")]
    EmptyColumn {
        /// Zero-based position in the mapping
        position: usize,
    },

    /// A key path could not be parsed
    #[error("Invalid key path '{0}'")]
    InvalidKeyPath(String),

    /// A key path does not address a leaf of the template
    #[error("Key path '{0}' does not exist in the template")]
    UnknownKeyPath(String),

    /// A placeholder token does not occur anywhere in the template
    #[error("Placeholder '{0}' does not occur in the template")]
    UnknownPlaceholder(String),

    /// Two mapping entries write to the same target
    #[error("Target '{0}' is mapped more than once")]
    DuplicateKeyPath(String),

    /// A mapped column is not in the spreadsheet header
    #[error("Column '{0}' is not in the spreadsheet header")]
    UnknownColumn(String),
}

/// Per-row failures. The row is skipped and the error lands in the summary.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaterializationError {
    /// The row could not be read, or a mapped cell holds an error value
    #[error("Row {row} is malformed: {reason}")]
    MalformedRow {
        /// Zero-based data row index
        row: usize,
        /// What was wrong with it
        reason: String,
    },

    /// A mapped cell is empty and the missing-cell policy is `error`
    #[error("Row {row} has no value for column '{column}'")]
    MissingCell {
        /// Zero-based data row index
        row: usize,
        /// Column with the missing value
        column: String,
    },
}

impl MaterializationError {
    /// Zero-based data row index the error refers to
    pub fn row(&self) -> usize {
        match self {
            MaterializationError::MalformedRow { row, .. }
            | MaterializationError::MissingCell { row, .. } => *row,
        }
    }
}

/// Errors raised while packaging output documents
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to serialize document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Any fatal error of a conversion request
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Spreadsheet(#[from] LoadError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}
