pub mod cli;
pub mod detect;
pub mod error;
pub mod field;
pub mod grid;
pub mod io_utils;
pub mod layout;
pub mod matcher;
pub mod normalize;
pub mod pipeline;
mod preview;
pub mod profile;
mod reconcile;
pub mod report;
pub mod source;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use encoding_rs::UTF_8;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, InputOptions},
    detect::Detector,
    pipeline::{LedgerInput, Reconciler},
    profile::Profile,
    report::{column_letter, describe_layout},
    source::{CsvWorkbook, GridSource},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("ledger_recon", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Reconcile(args) => reconcile::execute(&args),
        Commands::Detect(args) => handle_detect(&args),
        Commands::Sheets(args) => handle_sheets(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Profile(args) => handle_profile(&args),
    }
}

/// The profile at `path`, or the built-in defaults.
pub(crate) fn load_profile(path: Option<&Path>) -> Result<Profile> {
    match path {
        Some(path) => {
            let profile =
                Profile::load(path).with_context(|| format!("Loading profile from {path:?}"))?;
            info!("Using profile {path:?}");
            Ok(profile)
        }
        None => Ok(Profile::default()),
    }
}

pub(crate) fn open_workbook(path: &Path, options: &InputOptions) -> Result<CsvWorkbook> {
    let encoding = io_utils::resolve_encoding(options.input_encoding.as_deref())?;
    if let Some(delimiter) = options.delimiter {
        debug!("Reading {path:?} with delimiter '{}'", printable_delimiter(delimiter));
    }
    CsvWorkbook::open(path, options.delimiter, encoding)
}

fn handle_detect(args: &cli::DetectArgs) -> Result<()> {
    let profile = load_profile(args.input_options.profile.as_deref())?;
    let workbook = open_workbook(&args.input, &args.input_options)?;
    let mut input = LedgerInput::new(&workbook);
    input.sheet_hint = args.sheet.clone();
    let (_, layout) = Reconciler::new(&profile)
        .resolve_layout(args.side.into(), &input)
        .with_context(|| format!("Detecting the layout of {:?}", args.input))?;

    if args.json {
        let json = serde_json::to_string_pretty(&layout).context("Serializing layout as JSON")?;
        println!("{json}");
        return Ok(());
    }

    println!("{}", describe_layout(&layout, &profile.labels()));
    let headers = ["Field", "Label", "Column", "Score"]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    let rows = field::Field::ALL
        .into_iter()
        .map(|field| {
            let column = layout.columns.column(field);
            vec![
                field.name().to_string(),
                profile.label(field).to_string(),
                format!("{} ({column})", column_letter(column)),
                layout.scores.get(field).to_string(),
            ]
        })
        .collect::<Vec<_>>();
    print!("{}", table::render_table(&headers, &rows));
    Ok(())
}

fn handle_sheets(args: &cli::SheetsArgs) -> Result<()> {
    let profile = load_profile(args.input_options.profile.as_deref())?;
    let workbook = open_workbook(&args.input, &args.input_options)?;
    let detector = Detector::new(&profile);
    let mut rows = Vec::new();
    for name in workbook.sheet_names()? {
        let grid = workbook.load_sheet(&name)?;
        rows.push(vec![
            name,
            grid.height().to_string(),
            detector.score_sheet(&grid).to_string(),
        ]);
    }
    let headers = ["Sheet", "Rows", "Score"]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    print!(
        "{}",
        table::render_aligned(
            &headers,
            &rows,
            &[table::Align::Left, table::Align::Right, table::Align::Right]
        )
    );
    info!("Listed {} sheet(s) of {:?}", rows.len(), args.input);
    Ok(())
}

fn handle_profile(args: &cli::ProfileArgs) -> Result<()> {
    let profile = load_profile(args.profile.as_deref())?;
    let yaml = profile.to_yaml()?;
    io_utils::write_output(args.output.as_deref(), &yaml, UTF_8)
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
