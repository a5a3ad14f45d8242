//! Ready-made generator settings for the standard dispatch flows.
//!
//! | Preset                 | Invocation dir              | Idempotency marker                      | Sentinel |
//! |------------------------|-----------------------------|-----------------------------------------|----------|
//! | `generic-nextflow`     | template / `--output-dir`   | none                                    | none     |
//! | `routine-sequence-qc`  | run dir                     | `<run>/RoutineQC`                       | none     |
//! | `irida-upload`         | run dir                     | `<run>/IRIDAUploaderLogs/upload_complete.json` | same marker |
//! | `routine-irida-upload` | run dir                     | `<run>/irida-uploader.log`              | none     |
//! | `symlink-fastq`        | `<output parent>/<run>`     | `<output parent>/<run>/COMPLETE`        | same marker |
//! | `symlink-fastq` (`--output-dir`) | `<output dir>`    | `<output dir>/<run>.COMPLETE`           | same marker |
//!
//! Every preset requires a recognised run id and accepts a date window.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::builder::{default_cache_root, CacheRewrite, FlagNames, InvocationDir, RewriteOptions};
use crate::criteria::{
    CriteriaSet, Criterion, DateWindow, OutputMarker, RunErrorPolicy, COPY_COMPLETE,
    UPLOAD_COMPLETE,
};
use crate::error::{Result, RungenError};
use crate::generator::{Flow, GeneratorSettings, SentinelMarker};
use crate::symlink::{RenameRule, SYMLINK_COMPLETE_MARKER};

const ROUTINE_QC_DIR: &str = "RoutineQC";
const IRIDA_LOG_DIR: &str = "IRIDAUploaderLogs";
const IRIDA_UPLOADER_LOG: &str = "irida-uploader.log";
const ANALYSIS_LOGS: &str = "rapid_analysis_logs";
const UPLOAD_ANALYSIS_LOGS: &str = "RAPIDAnalysisLogs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    GenericNextflow,
    RoutineSequenceQc,
    IridaUpload,
    RoutineIridaUpload,
    SymlinkFastq,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::GenericNextflow,
        Preset::RoutineSequenceQc,
        Preset::IridaUpload,
        Preset::RoutineIridaUpload,
        Preset::SymlinkFastq,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::GenericNextflow => "generic-nextflow",
            Preset::RoutineSequenceQc => "routine-sequence-qc",
            Preset::IridaUpload => "irida-upload",
            Preset::RoutineIridaUpload => "routine-irida-upload",
            Preset::SymlinkFastq => "symlink-fastq",
        }
    }

    /// Build settings for this preset.
    pub fn settings(&self, opts: PresetOptions) -> Result<GeneratorSettings> {
        let cache_root = opts.cache_root.clone().unwrap_or_else(default_cache_root);
        let base = CriteriaSet::new().include(Criterion::run_id_format());

        let mut settings = GeneratorSettings {
            criteria: base.clone(),
            output_root: None,
            invocation: InvocationDir::RunDirectory,
            rewrites: RewriteOptions::default(),
            flags: FlagNames::default(),
            log_dir: ANALYSIS_LOGS.to_string(),
            cache_root,
            flow: Flow::Pipeline { sentinel: None },
            on_run_error: opts.on_run_error,
        };

        match self {
            Preset::GenericNextflow => {
                settings.criteria =
                    base.include(Criterion::upload_complete(&[COPY_COMPLETE, UPLOAD_COMPLETE]));
                settings.invocation = match &opts.output_dir {
                    Some(dir) => InvocationDir::Fixed(dir.clone()),
                    None => InvocationDir::Template,
                };
            }
            Preset::RoutineSequenceQc => {
                settings.criteria = base
                    .include(Criterion::upload_complete(&[COPY_COMPLETE]))
                    .exclude(Criterion::already_processed_in_run(ROUTINE_QC_DIR));
                settings.rewrites = RewriteOptions {
                    run_dir: true,
                    output_stage: Some(ROUTINE_QC_DIR.to_string()),
                    ..RewriteOptions::default()
                };
            }
            Preset::IridaUpload => {
                let marker = PathBuf::from(IRIDA_LOG_DIR).join(UPLOAD_COMPLETE);
                settings.criteria = base
                    .include(Criterion::upload_complete(&[COPY_COMPLETE, UPLOAD_COMPLETE]))
                    .exclude(Criterion::already_processed_in_run(marker.clone()));
                settings.rewrites = RewriteOptions {
                    cache: CacheRewrite::Force,
                    run_dir: true,
                    output_stage: Some(IRIDA_LOG_DIR.to_string()),
                    ..RewriteOptions::default()
                };
                settings.log_dir = UPLOAD_ANALYSIS_LOGS.to_string();
                settings.flow = Flow::Pipeline {
                    sentinel: Some(SentinelMarker::InRun(marker)),
                };
            }
            Preset::RoutineIridaUpload => {
                settings.criteria = base
                    .include(Criterion::upload_complete(&[COPY_COMPLETE]))
                    .exclude(Criterion::already_processed_in_run(IRIDA_UPLOADER_LOG));
                settings.rewrites = RewriteOptions {
                    cache: CacheRewrite::Force,
                    run_dir: true,
                    ..RewriteOptions::default()
                };
            }
            Preset::SymlinkFastq => {
                let criteria = base.include(Criterion::upload_complete(&[COPY_COMPLETE]));
                let marker = match (&opts.output_parent_dir, &opts.output_dir) {
                    (Some(parent), _) => {
                        settings.criteria = criteria
                            .exclude(Criterion::already_processed_in_output(SYMLINK_COMPLETE_MARKER));
                        settings.output_root = Some(parent.clone());
                        settings.invocation = InvocationDir::PerRun(parent.clone());
                        SentinelMarker::InInvocation(PathBuf::from(SYMLINK_COMPLETE_MARKER))
                    }
                    (None, Some(dir)) => {
                        let suffix = format!(".{SYMLINK_COMPLETE_MARKER}");
                        settings.criteria = criteria.exclude(Criterion::AlreadyProcessed {
                            marker: OutputMarker::RunFile {
                                dir: dir.clone(),
                                suffix: suffix.clone(),
                            },
                        });
                        settings.invocation = InvocationDir::Fixed(dir.clone());
                        SentinelMarker::RunFile {
                            dir: dir.clone(),
                            suffix,
                        }
                    }
                    (None, None) => {
                        return Err(RungenError::Config(
                            "symlink-fastq needs --output-parent-dir or --output-dir".to_string(),
                        ));
                    }
                };
                settings.flow = Flow::Symlink {
                    rename: opts.rename,
                    marker,
                };
            }
        }

        settings.criteria = settings.criteria.exclude_outside(opts.window);
        Ok(settings)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = RungenError;

    fn from_str(s: &str) -> Result<Self> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Preset::ALL.iter().map(Preset::name).collect();
                RungenError::Config(format!(
                    "unknown preset '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Caller-supplied knobs shared by all presets.
#[derive(Debug, Clone, Default)]
pub struct PresetOptions {
    pub window: DateWindow,
    pub output_parent_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub rename: RenameRule,
    /// Defaults to `$HOME/.conda/envs`.
    pub cache_root: Option<PathBuf>,
    pub on_run_error: RunErrorPolicy,
}
