//! Per-run source files and destination naming for the symlink flow.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RungenError};
use crate::source::RunDirectory;

/// FASTQ location inside a MiSeq run directory.
pub const FASTQ_SUBDIR: [&str; 3] = ["Data", "Intensities", "BaseCalls"];

pub const FASTQ_SUFFIX: &str = ".fastq.gz";

/// Marker the consumer writes once every link for a run exists.
pub const SYMLINK_COMPLETE_MARKER: &str = "COMPLETE";

/// `<run>/Data/Intensities/BaseCalls/*.fastq.gz`, sorted by file name.
///
/// A run without the subdirectory has no source files. A subdirectory that
/// exists but cannot be listed is a per-run `SourceFiles` error.
pub fn list_fastqs(run: &RunDirectory) -> Result<Vec<PathBuf>> {
    let dir = FASTQ_SUBDIR
        .iter()
        .fold(run.path().to_path_buf(), |acc, part| acc.join(part));

    let source_err = |source| RungenError::SourceFiles {
        run_id: run.run_id().to_string(),
        path: dir.clone(),
        source,
    };

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(source_err(e)),
    };

    let mut fastqs = Vec::new();
    for entry in entries {
        let path = entry.map_err(source_err)?.path();
        let is_fastq = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(FASTQ_SUFFIX) && !n.starts_with('.'));
        if is_fastq && path.is_file() {
            fastqs.push(path);
        }
    }
    fastqs.sort();
    Ok(fastqs)
}

/// How link destinations are named.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RenameRule {
    /// Link into the invocation directory under the source's own name.
    #[default]
    Keep,
    /// `<sample>_S<n>_L<lane>_R<read>_001.fastq.gz` becomes `<sample>_R<read>.fastq.gz`.
    SampleAndRead,
}

impl RenameRule {
    /// Destination argument for a link to `source`.
    pub fn destination(&self, source: &Path) -> String {
        match self {
            RenameRule::Keep => ".".to_string(),
            RenameRule::SampleAndRead => {
                let name = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                sample_and_read(&name).unwrap_or(name)
            }
        }
    }
}

fn sample_and_read(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(FASTQ_SUFFIX)?;
    let tokens: Vec<&str> = stem.split('_').collect();
    let n = tokens.len();
    if n < 5 {
        return None;
    }
    let (sample, tail) = tokens.split_at(n - 4);
    let [sample_number, lane, read, _chunk] = tail else {
        return None;
    };
    let well_formed = sample_number.starts_with('S')
        && lane.starts_with('L')
        && read.starts_with('R')
        && !sample.iter().all(|t| t.is_empty());
    if !well_formed {
        return None;
    }
    Some(format!("{}_{}{}", sample.join("_"), read, FASTQ_SUFFIX))
}
