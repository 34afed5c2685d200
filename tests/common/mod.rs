#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Header row shared by the sample ledgers, with a title row above it.
pub const LEDGER_HEADER: &str = "No.,Customer Name,Finance,Model Code,VIN,Sale Price,COM F/N,COM";

/// Builds a ledger CSV: a title line, the shared header, then `rows`.
pub fn ledger_csv(rows: &[&str]) -> String {
    let mut text = format!("Monthly sales ledger\n{LEDGER_HEADER}\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }
}
