use rust_xlsxwriter::Workbook;
use serde_json::json;
use sheetmap::convert::{ConvertOptions, convert};
use sheetmap::error::LoadError;
use sheetmap::loader::{SheetFormat, load_spreadsheet, read_table};
use sheetmap::mapping::MappingEntry;
use sheetmap::table::CellValue;
use std::fs;
use std::io::{Cursor, Read};
use zip::ZipArchive;

// Two sheets: "People" with a blank row in the middle, then "Other"
fn people_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();

    let people = workbook.add_worksheet();
    people.set_name("People").unwrap();
    people.write_string(0, 0, "Name").unwrap();
    people.write_string(0, 1, "Age").unwrap();
    people.write_string(0, 2, "Active").unwrap();
    people.write_string(1, 0, "Alice").unwrap();
    people.write_number(1, 1, 30).unwrap();
    people.write_boolean(1, 2, true).unwrap();
    people.write_string(3, 0, "Bob").unwrap();
    people.write_number(3, 1, 41.5).unwrap();

    let other = workbook.add_worksheet();
    other.set_name("Other").unwrap();
    other.write_string(0, 0, "Code").unwrap();
    other.write_string(1, 0, "X1").unwrap();

    workbook.save_to_buffer().unwrap()
}

#[test]
fn reads_the_first_sheet_by_default() {
    let table = read_table(&people_workbook(), SheetFormat::Workbook, None).unwrap();

    assert_eq!(table.headers, vec!["Name", "Age", "Active"]);
    // The blank row between Alice and Bob is dropped
    assert_eq!(table.row_count(), 2);

    let alice = table.rows[0].as_ref().unwrap();
    assert_eq!(alice.get("Name"), Some(&CellValue::String("Alice".into())));
    assert_eq!(alice.get("Age").map(CellValue::to_json), Some(json!(30)));
    assert_eq!(alice.get("Active"), Some(&CellValue::Bool(true)));

    let bob = table.rows[1].as_ref().unwrap();
    assert_eq!(bob.index, 1);
    assert_eq!(bob.get("Active"), None);
    assert_eq!(bob.get("Age").map(CellValue::to_json), Some(json!(41.5)));
}

#[test]
fn reads_a_named_sheet() {
    let table = read_table(&people_workbook(), SheetFormat::Workbook, Some("Other")).unwrap();
    assert_eq!(table.headers, vec!["Code"]);
    assert_eq!(table.row_count(), 1);
}

#[test]
fn unknown_sheet_is_an_error() {
    let result = read_table(&people_workbook(), SheetFormat::Workbook, Some("Missing"));
    assert!(matches!(result, Err(LoadError::SheetNotFound(ref name)) if name == "Missing"));
}

#[test]
fn garbage_is_not_a_workbook() {
    let result = read_table(b"definitely not a zip file", SheetFormat::Workbook, None);
    assert!(matches!(result, Err(LoadError::Workbook(_))));
}

#[test]
fn converts_a_workbook_end_to_end() {
    let output = convert(
        br#"{"name": "", "age": 0, "active": false}"#,
        &people_workbook(),
        SheetFormat::Workbook,
        &[
            MappingEntry::new("Name", "name"),
            MappingEntry::new("Age", "age"),
            MappingEntry::new("Active", "active"),
        ],
        &ConvertOptions::default(),
    )
    .unwrap();

    assert_eq!(output.summary.produced, 2);

    let mut archive = ZipArchive::new(Cursor::new(output.archive)).unwrap();
    let mut body = String::new();
    archive
        .by_name("output_1.json")
        .unwrap()
        .read_to_string(&mut body)
        .unwrap();
    let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(doc, json!({"name": "Bob", "age": 41.5, "active": ""}));
}

#[test]
fn loads_files_by_extension() {
    let dir = tempfile::tempdir().unwrap();

    let xlsx = dir.path().join("people.xlsx");
    fs::write(&xlsx, people_workbook()).unwrap();
    assert_eq!(load_spreadsheet(&xlsx, None).unwrap().row_count(), 2);

    let csv = dir.path().join("people.CSV");
    fs::write(&csv, "Name\nAlice\nBob\nCarol\n").unwrap();
    assert_eq!(load_spreadsheet(&csv, None).unwrap().row_count(), 3);

    let txt = dir.path().join("people.txt");
    fs::write(&txt, "Name\n").unwrap();
    assert!(matches!(
        load_spreadsheet(&txt, None),
        Err(LoadError::UnsupportedFormat(ref ext)) if ext == "txt"
    ));
}
