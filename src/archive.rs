//! Packaging output documents into a ZIP archive or a directory.

use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::ArchiveError;
use crate::materialize::OutputDocument;

/// File name offered for the downloaded archive
pub const ARCHIVE_FILE_NAME: &str = "output_json.zip";

/// Serialize one document: two-space indented when `pretty`, compact otherwise.
/// Non-ASCII text is written as UTF-8, not escaped.
pub fn render_document(value: &Value, pretty: bool) -> Result<Vec<u8>, ArchiveError> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    Ok(bytes)
}

/// Hands out unique entry names. A repeated name gets `_{row}` before the extension.
#[derive(Debug, Default)]
struct EntryNames {
    used: HashSet<String>,
}

impl EntryNames {
    fn claim(&mut self, document: &OutputDocument) -> String {
        if self.used.insert(document.name.clone()) {
            return document.name.clone();
        }

        let stem = document.name.strip_suffix(".json").unwrap_or(&document.name);
        let mut candidate = format!("{stem}_{}.json", document.row);
        let mut attempt = 1;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{stem}_{}_{attempt}.json", document.row);
            attempt += 1;
        }
        candidate
    }
}

/// Write documents into an in-memory ZIP archive.
///
/// Entries carry a fixed timestamp, so the same documents always produce the
/// same bytes.
pub fn package<I>(documents: I, pretty: bool) -> Result<Vec<u8>, ArchiveError>
where
    I: IntoIterator<Item = OutputDocument>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut names = EntryNames::default();
    for document in documents {
        let name = names.claim(&document);
        debug!(entry = %name, row = document.row, "adding archive entry");
        writer.start_file(name.as_str(), options)?;
        writer.write_all(&render_document(&document.value, pretty)?)?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Write documents as plain files under `dir`, creating it if needed.
/// Returns the names written, in order.
pub fn write_directory<I>(documents: I, dir: impl AsRef<Path>, pretty: bool) -> Result<Vec<String>, ArchiveError>
where
    I: IntoIterator<Item = OutputDocument>,
{
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut names = EntryNames::default();
    let mut written = Vec::new();
    for document in documents {
        let name = names.claim(&document);
        fs::write(dir.join(&name), render_document(&document.value, pretty)?)?;
        written.push(name);
    }
    Ok(written)
}
