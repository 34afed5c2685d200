//! I/O helpers for reading ledger grids and writing reports.
//!
//! - **Delimiter resolution**: extension-based (`.tsv` → tab, otherwise
//!   comma) with manual override.
//! - **Encoding**: input decoding and output transcoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **Grids**: CSV files are read without a header contract and with ragged
//!   rows allowed; the detector decides where headers and data are.
//! - **stdout**: an output path of `-` (or none) writes to standard output.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::grid::Grid;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const TABULAR_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    match path.and_then(|p| p.extension()).and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

/// Whether `path` has an extension that can be read as a sheet.
pub fn is_tabular_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TABULAR_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reads every record of a delimited stream into a grid.
///
/// Blank lines come back as empty rows, so grid row `n` is the record that
/// starts on line `n + 1` of a file without multi-line fields.
pub fn read_grid_from<R: Read>(
    mut reader: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Grid> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).context("Reading input")?;
    let mut csv_reader = open_csv_reader(bytes.as_slice(), delimiter);
    let mut record = csv::ByteRecord::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    loop {
        let start = usize::try_from(csv_reader.position().byte()).unwrap_or(bytes.len());
        let more = csv_reader
            .read_byte_record(&mut record)
            .with_context(|| format!("Reading row {}", rows.len() + 1))?;
        if !more {
            break;
        }
        let blank_lines = count_skipped_lines(&bytes, start);
        rows.extend(std::iter::repeat_with(Vec::new).take(blank_lines));
        let decoded = decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", rows.len() + 1))?;
        rows.push(decoded);
    }
    Ok(Grid::new(rows))
}

/// Empty lines the parser discards between `start` and the next record.
/// CRLF, LF and a lone CR each end one line; an LF completing the previous
/// record's CRLF is not a line of its own.
fn count_skipped_lines(bytes: &[u8], start: usize) -> usize {
    let mut rest = bytes.get(start..).unwrap_or_default();
    let after_cr = start
        .checked_sub(1)
        .and_then(|idx| bytes.get(idx))
        .is_some_and(|byte| *byte == b'\r');
    if after_cr && rest.first() == Some(&b'\n') {
        rest = &rest[1..];
    }
    let run = rest
        .iter()
        .take_while(|byte| matches!(byte, b'\r' | b'\n'))
        .count();
    let run = &rest[..run];
    let mut lines = 0;
    let mut idx = 0;
    while idx < run.len() {
        idx += if run[idx..].starts_with(b"\r\n") { 2 } else { 1 };
        lines += 1;
    }
    lines
}

pub fn read_grid(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Grid> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    read_grid_from(BufReader::new(file), delimiter, encoding)
        .with_context(|| format!("Reading {path:?}"))
}

/// Writes `contents` transcoded to `encoding`, to a file or to stdout.
pub fn write_output(path: Option<&Path>, contents: &str, encoding: &'static Encoding) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout().lock()),
    };
    let (encoded, _, had_errors) = encoding.encode(contents);
    if had_errors {
        return Err(anyhow!(
            "Output contains characters that cannot be encoded as {}",
            encoding.name()
        ));
    }
    writer.write_all(&encoded).context("Writing output")?;
    writer.flush().context("Flushing output")
}
