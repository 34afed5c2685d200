use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    error::Side,
    field::{Field, parse_field_list},
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Reconcile two ledgers whose columns are unlabeled or inconsistently named",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Match every primary ledger row against the reference ledger and report differences
    Reconcile(ReconcileArgs),
    /// Show the detected column layout and start row of a ledger
    Detect(DetectArgs),
    /// List the sheets of a workbook with their ledger scores
    Sheets(SheetsArgs),
    /// Preview the first rows of a ledger projected onto the logical fields
    Preview(PreviewArgs),
    /// Print the effective profile as YAML
    Profile(ProfileArgs),
}

#[derive(Debug, Args, Clone)]
pub struct InputOptions {
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// YAML profile with aliases, fallbacks and matching options
    #[arg(long)]
    pub profile: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Primary ledger: a CSV/TSV file or a directory of them (one sheet per file)
    #[arg(short = 'p', long = "primary")]
    pub primary: PathBuf,
    /// Reference ledger: a CSV/TSV file or a directory of them
    #[arg(short = 'r', long = "reference")]
    pub reference: PathBuf,
    /// Sheet of the primary workbook to read
    #[arg(long = "primary-sheet")]
    pub primary_sheet: Option<String>,
    /// Sheet of the reference workbook to read
    #[arg(long = "reference-sheet")]
    pub reference_sheet: Option<String>,
    /// Seven 0-based column indexes for the primary ledger, in field order
    #[arg(long = "primary-columns", value_delimiter = ',', num_args = 1..)]
    pub primary_columns: Option<Vec<usize>>,
    /// Seven 0-based column indexes for the reference ledger, in field order
    #[arg(long = "reference-columns", value_delimiter = ',', num_args = 1..)]
    pub reference_columns: Option<Vec<usize>>,
    /// 0-based row where primary data starts
    #[arg(long = "primary-start-row")]
    pub primary_start_row: Option<usize>,
    /// 0-based row where reference data starts
    #[arg(long = "reference-start-row")]
    pub reference_start_row: Option<usize>,
    /// Field used to join the ledgers (name or 0-based field index)
    #[arg(long = "key")]
    pub key: Option<Field>,
    /// Comma-separated fields to compare
    // Spelled `::std::vec::Vec` so clap parses the flag as one value.
    #[arg(long = "compare", value_parser = parse_fields)]
    pub compare: Option<::std::vec::Vec<Field>>,
    /// Compare free text and join keys without regard to case
    #[arg(long = "case-insensitive")]
    pub case_insensitive: bool,
    #[command(flatten)]
    pub input: InputOptions,
    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Output file (stdout if omitted or '-')
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Character encoding of the report (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Only list rows that are not a full match
    #[arg(long = "mismatches-only")]
    pub mismatches_only: bool,
    /// Do not re-detect the reference layout when nothing was found
    #[arg(long = "no-retry")]
    pub no_retry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LedgerSide {
    Primary,
    Reference,
}

impl From<LedgerSide> for Side {
    fn from(side: LedgerSide) -> Self {
        match side {
            LedgerSide::Primary => Side::Primary,
            LedgerSide::Reference => Side::Reference,
        }
    }
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Ledger file or workbook directory
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Sheet to read
    #[arg(long)]
    pub sheet: Option<String>,
    /// Which ledger's fallbacks and required fields to apply
    #[arg(long, value_enum, default_value_t = LedgerSide::Primary)]
    pub side: LedgerSide,
    /// Print the layout as JSON
    #[arg(long)]
    pub json: bool,
    #[command(flatten)]
    pub input_options: InputOptions,
}

#[derive(Debug, Args)]
pub struct SheetsArgs {
    /// Ledger file or workbook directory
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub input_options: InputOptions,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Ledger file or workbook directory
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Sheet to read
    #[arg(long)]
    pub sheet: Option<String>,
    /// Which ledger's fallbacks and required fields to apply
    #[arg(long, value_enum, default_value_t = LedgerSide::Primary)]
    pub side: LedgerSide,
    /// Explicit column indexes, in field order
    #[arg(long = "columns", value_delimiter = ',', num_args = 1..)]
    pub columns: Option<Vec<usize>>,
    /// 0-based row where data starts
    #[arg(long = "start-row")]
    pub start_row: Option<usize>,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    #[command(flatten)]
    pub input_options: InputOptions,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    /// Profile to load and print; the built-in defaults when omitted
    #[arg(long)]
    pub profile: Option<PathBuf>,
    /// Write the profile to a file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

fn parse_fields(value: &str) -> Result<Vec<Field>, String> {
    let fields = parse_field_list(value).map_err(|err| err.to_string())?;
    if fields.is_empty() {
        return Err("At least one field is required".to_string());
    }
    Ok(fields)
}
