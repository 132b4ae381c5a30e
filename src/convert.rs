//! The whole conversion: template → plan → documents → archive.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::archive;
use crate::error::{ConvertError, MaterializationError, ValidationError};
use crate::loader::{SheetFormat, read_table};
use crate::mapping::{MappingEntry, resolve};
use crate::materialize::{Materializer, MissingCellPolicy, OutputDocument};
use crate::table::Table;
use crate::template::Template;

/// Knobs for one conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub missing_cell: MissingCellPolicy,
    /// Column whose value names each archive entry
    pub name_column: Option<String>,
    /// Worksheet to read; the first one when unset
    pub sheet: Option<String>,
    /// Indent the generated JSON
    pub pretty: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            missing_cell: MissingCellPolicy::default(),
            name_column: None,
            sheet: None,
            pretty: true,
        }
    }
}

/// What happened to the rows of one conversion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionSummary {
    pub total_rows: usize,
    pub produced: usize,
    pub skipped: Vec<MaterializationError>,
}

impl ConversionSummary {
    /// Human-readable messages for the skipped rows
    pub fn messages(&self) -> Vec<String> {
        self.skipped.iter().map(ToString::to_string).collect()
    }
}

/// Archive bytes plus the summary shown next to the download
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub archive: Vec<u8>,
    pub summary: ConversionSummary,
}

/// Documents produced from one table, plus what happened to its rows
#[derive(Debug, Clone)]
pub struct ConvertedRows {
    pub documents: Vec<OutputDocument>,
    pub summary: ConversionSummary,
}

/// Resolve `mapping`, check it against the table header and materialize every
/// row. Rows that fail are left out of `documents` and listed in the summary.
pub fn convert_table(
    template: &Template,
    table: Table,
    mapping: &[MappingEntry],
    options: &ConvertOptions,
) -> Result<ConvertedRows, ValidationError> {
    let plan = resolve(template, mapping)?;
    plan.check_columns(&table.headers)?;

    let total_rows = table.row_count();
    let mut skipped = Vec::new();
    let documents: Vec<OutputDocument> = Materializer::new(&plan)
        .missing_cell(options.missing_cell)
        .name_column(options.name_column.as_deref())
        .run(table.rows)
        .filter_map(|result| result.map_err(|e| skipped.push(e)).ok())
        .collect();

    let summary = ConversionSummary {
        total_rows,
        produced: documents.len(),
        skipped,
    };
    info!(
        total = summary.total_rows,
        produced = summary.produced,
        skipped = summary.skipped.len(),
        "conversion finished"
    );

    Ok(ConvertedRows { documents, summary })
}

/// Run a full conversion on in-memory inputs.
///
/// Template, spreadsheet and mapping problems are fatal and reported before
/// any row is processed. Rows that fail individually are left out of the
/// archive and listed in the summary.
pub fn convert(
    template_bytes: &[u8],
    spreadsheet_bytes: &[u8],
    format: SheetFormat,
    mapping: &[MappingEntry],
    options: &ConvertOptions,
) -> Result<ConversionOutput, ConvertError> {
    let template = Template::from_slice(template_bytes)?;
    let table = read_table(spreadsheet_bytes, format, options.sheet.as_deref())?;

    let ConvertedRows { documents, summary } = convert_table(&template, table, mapping, options)?;
    let archive = archive::package(documents, options.pretty)?;

    Ok(ConversionOutput { archive, summary })
}
