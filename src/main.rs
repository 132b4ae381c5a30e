use clap::{Parser, ValueEnum};
use sheetmap::archive;
use sheetmap::loader::load_spreadsheet;
use sheetmap::logging::init_logging;
use sheetmap::convert::{ConvertOptions, ConvertedRows, convert_table};
use sheetmap::mapping::{MappingEntry, suggest_mapping};
use sheetmap::materialize::MissingCellPolicy;
use sheetmap::template::Template;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Convert spreadsheet rows into JSON documents shaped by a template
#[derive(Parser, Debug)]
#[command(name = "sheetmap", version)]
struct Cli {
    /// JSON template file
    #[arg(short, long)]
    template: PathBuf,

    /// Spreadsheet (xlsx, xlsm, xlsb, xls, ods, csv)
    #[arg(short, long)]
    spreadsheet: PathBuf,

    /// Column mapping as COLUMN=TARGET; TARGET is a key path or a %placeholder%
    #[arg(short, long = "map", value_name = "COLUMN=TARGET", value_parser = parse_mapping)]
    mappings: Vec<MappingEntry>,

    /// Fill in suggested targets for columns not mapped explicitly
    #[arg(long)]
    suggest: bool,

    /// Worksheet name (defaults to the first sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// Column whose value names each output file
    #[arg(long)]
    name_column: Option<String>,

    /// What to write for empty cells
    #[arg(long, value_enum, default_value_t = Missing::Empty)]
    missing: Missing,

    /// Write compact JSON instead of indented
    #[arg(long)]
    compact: bool,

    /// ZIP archive to write
    #[arg(short, long, conflicts_with = "out_dir", required_unless_present = "out_dir")]
    output: Option<PathBuf>,

    /// Directory to write one JSON file per row into
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Errors only
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Missing {
    Empty,
    Null,
    Keep,
    Error,
}

impl From<Missing> for MissingCellPolicy {
    fn from(value: Missing) -> Self {
        match value {
            Missing::Empty => MissingCellPolicy::EmptyString,
            Missing::Null => MissingCellPolicy::Null,
            Missing::Keep => MissingCellPolicy::KeepTemplate,
            Missing::Error => MissingCellPolicy::Error,
        }
    }
}

fn parse_mapping(text: &str) -> Result<MappingEntry, String> {
    let (column, target) = text
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=TARGET, got '{text}'"))?;
    Ok(MappingEntry::new(column.trim(), target.trim()))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let template = Template::from_slice(&fs::read(&cli.template)?)?;
    let table = load_spreadsheet(&cli.spreadsheet, cli.sheet.as_deref())?;

    let mut mapping = cli.mappings.clone();
    if cli.suggest {
        for entry in suggest_mapping(&template, &table.headers) {
            if !mapping.iter().any(|m| m.column == entry.column) {
                info!(column = %entry.column, target = %entry.target, "using suggested mapping");
                mapping.push(entry);
            }
        }
    }

    let options = ConvertOptions {
        missing_cell: cli.missing.into(),
        name_column: cli.name_column.clone(),
        sheet: cli.sheet.clone(),
        pretty: !cli.compact,
    };
    let ConvertedRows { documents, summary } = convert_table(&template, table, &mapping, &options)?;

    if let Some(dir) = &cli.out_dir {
        let written = archive::write_directory(documents, dir, options.pretty)?;
        info!("Wrote {} files to {}", written.len(), dir.display());
    } else if let Some(path) = &cli.output {
        fs::write(path, archive::package(documents, options.pretty)?)?;
        info!("Wrote archive {}", path.display());
    } else {
        return Err("either --output or --out-dir is required".into());
    }

    for message in summary.messages() {
        eprintln!("skipped: {message}");
    }
    println!(
        "{} rows: {} converted, {} skipped",
        summary.total_rows,
        summary.produced,
        summary.skipped.len()
    );

    Ok(())
}
