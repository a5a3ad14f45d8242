//! Per-run command messages derived from a shared template.
//!
//! Rewrites are selected by an explicit [`RewriteOptions`] value. Templates
//! written for the older convention, where a flag's mere presence enabled its
//! rewrite, are supported through [`RewriteOptions::from_template`].

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::correlation::IdSource;
use crate::error::Result;
use crate::message::{CommandMessage, SentinelContext, SentinelMessage};
use crate::source::RunDirectory;
use crate::template::{is_blank, CommandTemplate};

/// `timestamp_created` format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Timestamp format embedded in trace and report file names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H%M%S";

/// Flag names the rewrites target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlagNames {
    pub trace: String,
    pub report: String,
    pub work_dir: String,
    pub cache: String,
    pub run_dir: String,
    pub output_dir: String,
}

impl Default for FlagNames {
    fn default() -> Self {
        Self {
            trace: "-with-trace".to_string(),
            report: "-with-report".to_string(),
            work_dir: "-work-dir".to_string(),
            cache: "--cache".to_string(),
            run_dir: "--run_dir".to_string(),
            output_dir: "--outdir".to_string(),
        }
    }
}

/// Cache flag handling.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CacheRewrite {
    #[default]
    Off,
    /// Fill in the cache root only when the template leaves the flag blank.
    FillIfEmpty,
    /// Always set the cache root.
    Force,
}

/// Which rewrites apply to each command message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewriteOptions {
    pub trace: bool,
    pub report: bool,
    pub work_dir: bool,
    pub cache: CacheRewrite,
    pub run_dir: bool,
    /// Stage directory name; output goes to `<run>/<stage>`.
    pub output_stage: Option<String>,
}

impl RewriteOptions {
    /// Options implied by which flags the template declares.
    pub fn from_template(template: &CommandTemplate, flags: &FlagNames) -> Self {
        Self {
            trace: template.has_flag(&flags.trace),
            report: template.has_flag(&flags.report),
            work_dir: template.has_flag(&flags.work_dir),
            cache: if template.has_flag(&flags.cache) {
                CacheRewrite::FillIfEmpty
            } else {
                CacheRewrite::Off
            },
            run_dir: false,
            output_stage: None,
        }
    }

    /// Enable everything enabled in either `self` or `other`.
    pub fn union(self, other: &RewriteOptions) -> Self {
        Self {
            trace: self.trace || other.trace,
            report: self.report || other.report,
            work_dir: self.work_dir || other.work_dir,
            cache: self.cache.max(other.cache),
            run_dir: self.run_dir || other.run_dir,
            output_stage: self.output_stage.or_else(|| other.output_stage.clone()),
        }
    }
}

/// Where each run's commands are invoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum InvocationDir {
    /// The template's `command_invocation_directory`, or `.` when unset.
    Template,
    /// One directory for every run.
    Fixed(PathBuf),
    /// The run directory itself.
    RunDirectory,
    /// `<parent>/<run id>`.
    PerRun(PathBuf),
}

impl InvocationDir {
    pub fn resolve(&self, run: &RunDirectory, template: &CommandTemplate) -> PathBuf {
        match self {
            InvocationDir::Template => PathBuf::from(
                template
                    .command_invocation_directory
                    .as_deref()
                    .unwrap_or("."),
            ),
            InvocationDir::Fixed(dir) => dir.clone(),
            InvocationDir::RunDirectory => run.path().to_path_buf(),
            InvocationDir::PerRun(parent) => parent.join(run.run_id()),
        }
    }
}

/// Per-run inputs shared by every message built for that run.
#[derive(Debug, Clone, Copy)]
pub struct RunBuild<'a> {
    pub run: &'a RunDirectory,
    /// Already resolved; path rewrites derive from it.
    pub invocation_dir: &'a Path,
    pub correlation_id: Option<&'a str>,
    pub created: NaiveDateTime,
}

/// Builds command and sentinel messages from a validated template.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    template: CommandTemplate,
    command_name: String,
    options: RewriteOptions,
    flags: FlagNames,
    log_dir: String,
    cache_root: PathBuf,
}

impl MessageBuilder {
    /// Fails when the template names no command.
    pub fn new(
        template: CommandTemplate,
        options: RewriteOptions,
        flags: FlagNames,
        log_dir: impl Into<String>,
        cache_root: PathBuf,
    ) -> Result<Self> {
        let command_name = template.command_name()?.to_string();
        Ok(Self {
            template,
            command_name,
            options,
            flags,
            log_dir: log_dir.into(),
            cache_root,
        })
    }

    pub fn template(&self) -> &CommandTemplate {
        &self.template
    }

    /// Command name with `/` replaced, safe inside file names.
    pub fn pipeline_slug(&self) -> String {
        self.command_name.replace('/', "_")
    }

    /// The run's pipeline command with every enabled rewrite applied.
    pub fn build(&self, ctx: &RunBuild<'_>, ids: &mut dyn IdSource) -> CommandMessage {
        let message_id = ids.new_message_id();
        let mut flagged = self.template.flagged_arguments.clone();
        self.rewrite(&mut flagged, ctx, &message_id);

        CommandMessage {
            message_id,
            correlation_id: ctx.correlation_id.map(str::to_string),
            command_invocation_directory: path_string(ctx.invocation_dir),
            base_command: self.template.base_command.clone(),
            flags: self.template.flags.clone(),
            positional_arguments: self.template.positional_arguments.clone(),
            positional_arguments_before_flagged_arguments: self
                .template
                .positional_arguments_before_flagged_arguments
                .clone(),
            flagged_arguments: flagged,
            timestamp_created: ctx.created.format(TIMESTAMP_FORMAT).to_string(),
            extra: self.template.extra.clone(),
        }
    }

    /// `mkdir -p <invocation dir>`, invoked from `.`.
    pub fn build_mkdir(&self, ctx: &RunBuild<'_>, ids: &mut dyn IdSource) -> CommandMessage {
        CommandMessage {
            message_id: ids.new_message_id(),
            correlation_id: ctx.correlation_id.map(str::to_string),
            command_invocation_directory: ".".to_string(),
            base_command: Some("mkdir".to_string()),
            flags: vec!["-p".to_string()],
            positional_arguments: vec![path_string(ctx.invocation_dir)],
            positional_arguments_before_flagged_arguments: Vec::new(),
            flagged_arguments: Map::new(),
            timestamp_created: ctx.created.format(TIMESTAMP_FORMAT).to_string(),
            extra: Map::new(),
        }
    }

    /// The template command with `[source, destination]` as positional arguments.
    pub fn build_link(
        &self,
        ctx: &RunBuild<'_>,
        source: &Path,
        destination: &str,
        ids: &mut dyn IdSource,
    ) -> CommandMessage {
        let mut message = self.build(ctx, ids);
        message.positional_arguments = vec![path_string(source), destination.to_string()];
        message
    }

    /// Sentinel completing `correlation_id` once `marker` exists.
    pub fn sentinel(
        &self,
        correlation_id: &str,
        marker: &Path,
        ids: &mut dyn IdSource,
    ) -> SentinelMessage {
        SentinelMessage {
            message_id: ids.new_message_id(),
            correlation_id: correlation_id.to_string(),
            context: SentinelContext {
                completion_marker_file: path_string(marker),
            },
        }
    }

    fn rewrite(&self, flagged: &mut Map<String, Value>, ctx: &RunBuild<'_>, message_id: &str) {
        let opts = &self.options;
        let run_tag = format!("{}.{}", self.pipeline_slug(), message_id);
        let stamp = ctx.created.format(FILE_TIMESTAMP_FORMAT);
        let log_root = ctx.invocation_dir.join(&self.log_dir);

        if opts.trace {
            let path = log_root
                .join("nextflow_traces")
                .join(format!("{stamp}.{run_tag}.trace.txt"));
            set(flagged, &self.flags.trace, &path);
        }

        if opts.report {
            let path = log_root
                .join("nextflow_reports")
                .join(format!("{stamp}.{run_tag}.report.html"));
            set(flagged, &self.flags.report, &path);
        }

        if opts.work_dir {
            let path = ctx.invocation_dir.join(format!("work.{run_tag}"));
            set(flagged, &self.flags.work_dir, &path);
        }

        let fill_cache = match opts.cache {
            CacheRewrite::Off => false,
            CacheRewrite::FillIfEmpty => flagged.get(&self.flags.cache).map_or(true, is_blank),
            CacheRewrite::Force => true,
        };
        if fill_cache {
            set(flagged, &self.flags.cache, &self.cache_root);
        }

        if opts.run_dir {
            set(flagged, &self.flags.run_dir, ctx.run.path());
        }

        if let Some(stage) = &opts.output_stage {
            set(flagged, &self.flags.output_dir, &ctx.run.path().join(stage));
        }
    }
}

fn set(flagged: &mut Map<String, Value>, flag: &str, path: &Path) {
    flagged.insert(flag.to_string(), Value::String(path_string(path)));
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `$HOME/.conda/envs`, or `.conda/envs` when no home directory is known.
pub fn default_cache_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".conda")
        .join("envs")
}
