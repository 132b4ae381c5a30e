/*!
# sheetmap

Turn spreadsheet rows into JSON documents shaped by a template.

## Overview

A conversion takes three inputs:

- a JSON **template** whose leaves define the output shape;
- a **spreadsheet** (xlsx, xlsm, xlsb, xls, ods or csv) with a header row;
- a **column mapping** pairing spreadsheet columns with template targets.

Each data row produces one document: a copy of the template with the mapped
cells written in. All documents are packed into one ZIP archive, named
`output_{row}.json` unless a naming column is chosen.

## Targets

A target is either a key path or a placeholder:

- `profile.age` replaces the template leaf at that path with the typed cell
  value (numbers stay numbers, dates become ISO-8601 strings);
- `%Name%` replaces every occurrence of the token inside template strings and
  keys with the cell's text.

## Failure handling

- Template, spreadsheet and mapping problems are fatal and reported before any
  row is processed ([`error::ValidationError`] and friends).
- A row that cannot be materialized is skipped and listed in the
  [`convert::ConversionSummary`] ([`error::MaterializationError`]).
- Empty cells follow an explicit [`materialize::MissingCellPolicy`]; the
  default writes an empty string.

## Modules

- **template**: template parsing, key paths, placeholders
- **table**: header and row model, cell values
- **loader**: spreadsheet readers (calamine, csv)
- **mapping**: mapping validation and suggestions
- **materialize**: row to document
- **archive**: ZIP and directory output
- **convert**: the end-to-end pipeline
- **app**: web front end (feature `web`)

## Example

```
use sheetmap::convert::{ConvertOptions, convert};
use sheetmap::loader::SheetFormat;
use sheetmap::mapping::MappingEntry;

let output = convert(
    br#"{"name": "", "age": 0}"#,
    b"Name,Age\nAlice,30\n",
    SheetFormat::Csv,
    &[MappingEntry::new("Name", "name"), MappingEntry::new("Age", "age")],
    &ConvertOptions::default(),
)
.unwrap();
assert_eq!(output.summary.produced, 1);
```
*/

#[cfg(feature = "web")]
pub mod app;
pub mod archive;
pub mod convert;
pub mod error;
pub mod loader;
pub mod logging;
pub mod mapping;
pub mod materialize;
pub mod table;
pub mod template;

/// Re-export the types most callers need
pub use convert::{ConversionOutput, ConversionSummary, ConvertOptions, ConvertedRows, convert, convert_table};
pub use error::{ConvertError, MaterializationError, ValidationError};
pub use mapping::{AssignmentPlan, ColumnMapping, MappingEntry, resolve, suggest_mapping};
pub use materialize::{MissingCellPolicy, OutputDocument, materialize};
pub use template::{KeyPath, Template};
