//! Grid sources: where ledgers come from and how a sheet is chosen.
//!
//! A [`CsvWorkbook`] is either one delimited file (a single sheet named after
//! the file stem) or a directory whose delimited files are its sheets.
//! [`load`] resolves a sheet hint against any [`GridSource`]: exact name first,
//! then a whitespace- and case-insensitive containment match, then the sheet
//! that looks most like a ledger.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::Encoding;
use log::{debug, info, warn};

use crate::{detect::Detector, error::ReconError, grid::Grid, io_utils};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedGrid {
    pub grid: Grid,
    pub sheet: String,
}

pub trait GridSource {
    /// Display name used in logs and errors.
    fn name(&self) -> String;
    fn sheet_names(&self) -> Result<Vec<String>>;
    fn load_sheet(&self, sheet: &str) -> Result<Grid>;
}

/// Loads the sheet that best answers `sheet_hint`.
pub fn load(
    source: &dyn GridSource,
    sheet_hint: Option<&str>,
    detector: &Detector<'_>,
) -> Result<LoadedGrid> {
    let names = source.sheet_names()?;
    if names.is_empty() {
        return Err(ReconError::EmptyWorkbook(source.name()).into());
    }

    if let Some(hint) = sheet_hint.map(str::trim).filter(|h| !h.is_empty()) {
        if let Some(sheet) = match_sheet_name(&names, hint) {
            info!("Using sheet '{sheet}' of {} for hint '{hint}'", source.name());
            return load_named(source, sheet);
        }
        warn!(
            "Sheet '{hint}' not found in {}; choosing the most ledger-like sheet",
            source.name()
        );
    }

    if names.len() == 1 {
        return load_named(source, &names[0]);
    }

    let mut best: Option<(LoadedGrid, u32)> = None;
    for name in &names {
        let grid = source.load_sheet(name)?;
        let score = detector.score_sheet(&grid);
        debug!("Sheet '{name}' scored {score}");
        if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
            best = Some((
                LoadedGrid {
                    grid,
                    sheet: name.clone(),
                },
                score,
            ));
        }
    }
    let (loaded, score) = best.ok_or_else(|| ReconError::EmptyWorkbook(source.name()))?;
    info!(
        "Selected sheet '{}' of {} (score {score})",
        loaded.sheet,
        source.name()
    );
    Ok(loaded)
}

fn load_named(source: &dyn GridSource, sheet: &str) -> Result<LoadedGrid> {
    let grid = source
        .load_sheet(sheet)
        .with_context(|| format!("Loading sheet '{sheet}' of {}", source.name()))?;
    Ok(LoadedGrid {
        grid,
        sheet: sheet.to_string(),
    })
}

fn compact_sheet_name(name: &str) -> String {
    name.chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Exact name, else the first name that contains or is contained in the hint.
pub fn match_sheet_name<'a>(names: &'a [String], hint: &str) -> Option<&'a str> {
    if let Some(exact) = names.iter().find(|name| name.as_str() == hint) {
        return Some(exact);
    }
    let wanted = compact_sheet_name(hint);
    if wanted.is_empty() {
        return None;
    }
    names
        .iter()
        .find(|name| {
            let current = compact_sheet_name(name);
            !current.is_empty() && (current.contains(&wanted) || wanted.contains(&current))
        })
        .map(String::as_str)
}

/// A CSV/TSV file, or a directory of them, read as a workbook.
#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    path: PathBuf,
    sheets: Vec<(String, PathBuf)>,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
}

impl CsvWorkbook {
    pub fn open(path: &Path, delimiter: Option<u8>, encoding: &'static Encoding) -> Result<Self> {
        let metadata = fs::metadata(path).with_context(|| format!("Opening ledger {path:?}"))?;
        let sheets = if metadata.is_dir() {
            let mut files = fs::read_dir(path)
                .with_context(|| format!("Listing workbook directory {path:?}"))?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<std::io::Result<Vec<_>>>()
                .with_context(|| format!("Listing workbook directory {path:?}"))?;
            files.retain(|file| file.is_file() && io_utils::is_tabular_path(file));
            files.sort();
            files
                .into_iter()
                .map(|file| (sheet_name_for(&file), file))
                .collect()
        } else {
            vec![(sheet_name_for(path), path.to_path_buf())]
        };
        Ok(Self {
            path: path.to_path_buf(),
            sheets,
            delimiter,
            encoding,
        })
    }
}

fn sheet_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl GridSource for CsvWorkbook {
    fn name(&self) -> String {
        format!("{:?}", self.path)
    }

    fn sheet_names(&self) -> Result<Vec<String>> {
        Ok(self.sheets.iter().map(|(name, _)| name.clone()).collect())
    }

    fn load_sheet(&self, sheet: &str) -> Result<Grid> {
        let (_, file) = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet)
            .ok_or_else(|| anyhow!("Sheet '{sheet}' does not exist in {:?}", self.path))?;
        let delimiter = io_utils::resolve_input_delimiter(file, self.delimiter);
        io_utils::read_grid(file, delimiter, self.encoding)
    }
}

/// Sheets held in memory, for callers that already have grids.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    name: String,
    sheets: Vec<(String, Grid)>,
}

impl MemoryWorkbook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheets: Vec::new(),
        }
    }

    pub fn with_sheet(mut self, name: impl Into<String>, grid: Grid) -> Self {
        self.sheets.push((name.into(), grid));
        self
    }
}

impl GridSource for MemoryWorkbook {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn sheet_names(&self) -> Result<Vec<String>> {
        Ok(self.sheets.iter().map(|(name, _)| name.clone()).collect())
    }

    fn load_sheet(&self, sheet: &str) -> Result<Grid> {
        self.sheets
            .iter()
            .find(|(name, _)| name == sheet)
            .map(|(_, grid)| grid.clone())
            .ok_or_else(|| anyhow!("Sheet '{sheet}' does not exist in {}", self.name))
    }
}
