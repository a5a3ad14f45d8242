//! Run directory discovery.
//!
//! The only place the core lists a directory. Per-run metadata (run date,
//! experiment name) is derived lazily from the directory itself.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{Result, RungenError};

/// Sample sheet file written by the instrument into each run directory.
pub const SAMPLE_SHEET: &str = "SampleSheet.csv";

const EXPERIMENT_NAME_KEY: &str = "Experiment Name";

/// One instrument run on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    path: PathBuf,
    run_id: String,
}

impl RunDirectory {
    /// Wrap an existing directory path. The run id is its basename.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let run_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, run_id }
    }

    /// Absolute path of the run directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory basename.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run date from the leading `YYMMDD` of the run id, interpreted as `20YY`.
    pub fn run_date(&self) -> Result<NaiveDate> {
        let malformed = || RungenError::MalformedRunDate {
            run_id: self.run_id.clone(),
        };
        let digits = self.run_id.get(..6).ok_or_else(malformed)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        NaiveDate::parse_from_str(&format!("20{digits}"), "%Y%m%d").map_err(|_| malformed())
    }

    /// Experiment name from the run's sample sheet.
    ///
    /// Returns `Ok(None)` when the sample sheet or its `Experiment Name` line
    /// is absent; an unreadable sample sheet is an error.
    pub fn experiment_name(&self) -> Result<Option<String>> {
        let path = self.path.join(SAMPLE_SHEET);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|source| RungenError::SampleSheet {
            run_id: self.run_id.clone(),
            path: path.clone(),
            source,
        })?;
        Ok(parse_experiment_name(&content))
    }
}

/// Extract the experiment name from sample sheet text.
///
/// Uses the first line containing `Experiment Name`; the value is the last
/// comma-delimited field once trailing commas are stripped.
pub fn parse_experiment_name(sample_sheet: &str) -> Option<String> {
    let line = sample_sheet
        .lines()
        .find(|line| line.contains(EXPERIMENT_NAME_KEY))?;
    let value = line
        .trim_end()
        .trim_end_matches(',')
        .rsplit(',')
        .next()?
        .trim();
    if value.is_empty() || value == EXPERIMENT_NAME_KEY {
        None
    } else {
        Some(value.to_string())
    }
}

/// List the immediate subdirectories of `parent`, sorted by basename.
///
/// Non-directory entries are skipped. A missing or unreadable parent is fatal.
pub fn list_run_directories(parent: &Path) -> Result<Vec<RunDirectory>> {
    let scan_err = |source| RungenError::Scan {
        path: parent.to_path_buf(),
        source,
    };
    let parent_abs = std::path::absolute(parent).map_err(scan_err)?;

    let mut runs = Vec::new();
    for entry in fs::read_dir(&parent_abs).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        let path = entry.path();
        if path.is_dir() {
            runs.push(RunDirectory::new(path));
        }
    }
    runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
    Ok(runs)
}
