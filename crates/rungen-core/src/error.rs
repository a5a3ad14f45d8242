//! Error taxonomy for run-directory generators.

use std::path::PathBuf;

/// Errors produced while scanning, selecting, building, or emitting.
#[derive(Debug, thiserror::Error)]
pub enum RungenError {
    /// Missing or malformed template/settings. Fatal before any message is emitted.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The parent directory could not be listed.
    #[error("failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run {run_id}: cannot parse a YYMMDD run date from the first six characters of the directory name")]
    MalformedRunDate { run_id: String },

    #[error("run {run_id}: failed to read sample sheet {path}: {source}")]
    SampleSheet {
        run_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run {run_id}: failed to list source files in {path}: {source}")]
    SourceFiles {
        run_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A per-run failure escalated under `RunErrorPolicy::Abort`.
    #[error("aborting on run {run_id}: {source}")]
    RunEvaluation {
        run_id: String,
        #[source]
        source: Box<RungenError>,
    },

    #[error("failed to write message: {0}")]
    Emit(#[source] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RungenError {
    /// Whether this error belongs to a single run rather than the whole invocation.
    pub fn is_per_run(&self) -> bool {
        matches!(
            self,
            RungenError::MalformedRunDate { .. }
                | RungenError::SampleSheet { .. }
                | RungenError::SourceFiles { .. }
        )
    }
}

/// Result type for generator operations.
pub type Result<T> = std::result::Result<T, RungenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = RungenError::Config("template has no command name".to_string());
        assert!(err.to_string().contains("invalid configuration"));
        assert!(err.to_string().contains("no command name"));
    }

    #[test]
    fn test_malformed_date_names_run() {
        let err = RungenError::MalformedRunDate {
            run_id: "21AB01_M00001".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("21AB01_M00001"));
        assert!(msg.contains("YYMMDD"));
        assert!(err.is_per_run());
    }

    #[test]
    fn test_run_evaluation_wraps_source() {
        let err = RungenError::RunEvaluation {
            run_id: "run-a".to_string(),
            source: Box::new(RungenError::MalformedRunDate {
                run_id: "run-a".to_string(),
            }),
        };
        assert!(err.to_string().contains("aborting on run run-a"));
        assert!(!err.is_per_run());
    }

    #[test]
    fn test_scan_error_is_fatal() {
        let err = RungenError::Scan {
            path: PathBuf::from("/nope"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(!err.is_per_run());
        assert!(err.to_string().contains("/nope"));
    }
}
