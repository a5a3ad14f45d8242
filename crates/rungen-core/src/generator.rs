//! One generator invocation: scan, select, build, emit.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::builder::{FlagNames, InvocationDir, MessageBuilder, RewriteOptions, RunBuild};
use crate::correlation::{IdSource, RandomIds};
use crate::criteria::{
    CriteriaEngine, CriteriaSet, OutputMarker, RunErrorPolicy, RunFailure, SelectedRun,
};
use crate::emitter::Emitter;
use crate::error::{Result, RungenError};
use crate::message::Message;
use crate::obs::{self, RunSpan};
use crate::source::{list_run_directories, RunDirectory};
use crate::symlink::{list_fastqs, RenameRule};
use crate::template::CommandTemplate;

/// Location of a sentinel's completion marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "base", content = "path", rename_all = "snake_case")]
pub enum SentinelMarker {
    /// Relative to the run directory.
    InRun(PathBuf),
    /// Relative to the run's invocation directory.
    InInvocation(PathBuf),
    /// `<dir>/<run id><suffix>`, for runs sharing one invocation directory.
    RunFile { dir: PathBuf, suffix: String },
}

impl SentinelMarker {
    /// Marker path for `run` invoked from `invocation_dir`.
    pub fn resolve(&self, run: &RunDirectory, invocation_dir: &Path) -> PathBuf {
        match self {
            SentinelMarker::InRun(rel) => run.path().join(rel),
            SentinelMarker::InInvocation(rel) => invocation_dir.join(rel),
            SentinelMarker::RunFile { dir, suffix } => {
                OutputMarker::run_file_path(dir, run.run_id(), suffix)
            }
        }
    }
}

/// What each selected run turns into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum Flow {
    /// One pipeline command per run, optionally followed by a sentinel.
    Pipeline { sentinel: Option<SentinelMarker> },
    /// `mkdir` when needed, one link per FASTQ, then one sentinel on `marker`.
    Symlink {
        rename: RenameRule,
        marker: SentinelMarker,
    },
}

/// Everything a generator needs besides the template.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub criteria: CriteriaSet,
    /// Base for output-relative "already processed" markers.
    pub output_root: Option<PathBuf>,
    pub invocation: InvocationDir,
    /// Rewrites enabled regardless of the template's flags.
    pub rewrites: RewriteOptions,
    pub flags: FlagNames,
    /// Log directory under the invocation directory for trace/report files.
    pub log_dir: String,
    pub cache_root: PathBuf,
    pub flow: Flow,
    pub on_run_error: RunErrorPolicy,
}

/// Summary of one invocation.
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub candidates: usize,
    /// Run ids whose messages were emitted, in order.
    pub selected: Vec<String>,
    pub rejected: usize,
    pub skipped: Vec<RunFailure>,
    pub messages: usize,
}

type Clock = Box<dyn Fn() -> NaiveDateTime>;

/// Drives one invocation over a parent directory.
pub struct Generator {
    engine: CriteriaEngine,
    builder: MessageBuilder,
    invocation: InvocationDir,
    flow: Flow,
    on_run_error: RunErrorPolicy,
    /// Template-supplied correlation id, consumed by the first emitted run.
    preset_correlation: Option<String>,
    ids: Box<dyn IdSource>,
    clock: Clock,
}

impl Generator {
    /// Validate the template and settings. Configuration errors surface here,
    /// before any directory is scanned.
    pub fn new(settings: GeneratorSettings, template: CommandTemplate) -> Result<Self> {
        let rewrites = RewriteOptions::from_template(&template, &settings.flags)
            .union(&settings.rewrites);
        let builder = MessageBuilder::new(
            template,
            rewrites,
            settings.flags,
            settings.log_dir,
            settings.cache_root,
        )?;
        if matches!(settings.flow, Flow::Symlink { .. })
            && builder.template().base_command.is_none()
        {
            return Err(RungenError::Config(
                "symlink flow needs a base_command template (e.g. ln -s)".to_string(),
            ));
        }
        let engine = CriteriaEngine::new(settings.criteria, settings.output_root)?;
        let preset_correlation = builder.template().correlation_id.clone();

        Ok(Self {
            engine,
            builder,
            invocation: settings.invocation,
            flow: settings.flow,
            on_run_error: settings.on_run_error,
            preset_correlation,
            ids: Box::new(RandomIds),
            clock: Box::new(|| Local::now().naive_local()),
        })
    }

    /// Replace the identifier source.
    pub fn with_ids(mut self, ids: impl IdSource + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Replace the clock used for creation timestamps.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Scan `parent`, select eligible runs, and emit their messages.
    ///
    /// Selection completes before anything is emitted, so scan errors and
    /// per-run errors under [`RunErrorPolicy::Abort`] leave the output empty.
    /// Each run's messages are built in full before the first is written.
    pub fn run<W: Write>(
        &mut self,
        parent: &Path,
        emitter: &mut Emitter<W>,
    ) -> Result<GenerationReport> {
        let candidates = list_run_directories(parent)?;
        obs::emit_scan_completed(parent, candidates.len());

        let selection = self.engine.select(&candidates, self.on_run_error)?;
        let mut report = GenerationReport {
            candidates: candidates.len(),
            rejected: selection.rejected.len(),
            skipped: selection.failed,
            ..GenerationReport::default()
        };

        for selected in &selection.accepted {
            let run_id = selected.run.run_id();
            match self.messages_for(selected) {
                Ok((correlation_id, messages)) => {
                    let _span = RunSpan::enter(run_id, &correlation_id);
                    for message in &messages {
                        emitter.emit(message)?;
                    }
                    if self.preset_correlation.as_deref() == Some(correlation_id.as_str()) {
                        self.preset_correlation = None;
                    }
                    obs::emit_run_selected(run_id, &correlation_id, messages.len());
                    report.messages += messages.len();
                    report.selected.push(run_id.to_string());
                }
                Err(error) if error.is_per_run() => match self.on_run_error {
                    RunErrorPolicy::Skip => {
                        obs::emit_run_skipped(run_id, &error);
                        report.skipped.push(RunFailure {
                            run_id: run_id.to_string(),
                            error,
                        });
                    }
                    RunErrorPolicy::Abort => {
                        return Err(RungenError::RunEvaluation {
                            run_id: run_id.to_string(),
                            source: Box::new(error),
                        });
                    }
                },
                Err(error) => return Err(error),
            }
        }

        obs::emit_generation_finished(
            report.candidates,
            report.selected.len(),
            report.skipped.len(),
            report.messages,
        );
        Ok(report)
    }

    fn messages_for(&mut self, selected: &SelectedRun) -> Result<(String, Vec<Message>)> {
        let run = &selected.run;
        let correlation_id = match &self.preset_correlation {
            Some(preset) => preset.clone(),
            None => self.ids.new_correlation(),
        };
        let invocation_dir = self.invocation.resolve(run, self.builder.template());
        let ctx = RunBuild {
            run,
            invocation_dir: &invocation_dir,
            correlation_id: Some(&correlation_id),
            created: (self.clock)(),
        };
        let ids = self.ids.as_mut();

        let mut messages: Vec<Message> = Vec::new();
        match &self.flow {
            Flow::Pipeline { sentinel } => {
                messages.push(self.builder.build(&ctx, ids).into());
                if let Some(marker) = sentinel {
                    let marker_path = marker.resolve(run, &invocation_dir);
                    messages.push(self.builder.sentinel(&correlation_id, &marker_path, ids).into());
                }
            }
            Flow::Symlink { rename, marker } => {
                let fastqs = list_fastqs(run)?;
                if !invocation_dir.exists() {
                    messages.push(self.builder.build_mkdir(&ctx, ids).into());
                }
                for fastq in &fastqs {
                    let destination = rename.destination(fastq);
                    messages.push(self.builder.build_link(&ctx, fastq, &destination, ids).into());
                }
                let marker_path = marker.resolve(run, &invocation_dir);
                messages.push(self.builder.sentinel(&correlation_id, &marker_path, ids).into());
            }
        }

        Ok((correlation_id, messages))
    }
}
