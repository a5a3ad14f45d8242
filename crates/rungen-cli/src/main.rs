//! Rungen - run-directory dispatch message generator
//!
//! The `rungen` command scans a parent directory of sequencing runs and writes
//! one JSON command message per line on stdout for every eligible run.
//!
//! ## Presets
//!
//! - `generic-nextflow`: run a pipeline template once per completed run
//! - `routine-sequence-qc`: routine QC into `<run>/RoutineQC`
//! - `irida-upload`: upload with a completion sentinel
//! - `routine-irida-upload`: upload guarded by the uploader log
//! - `symlink-fastq`: link each run's FASTQ files into an output directory

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use tracing::{info, Level};

use rungen_core::{
    CommandTemplate, DateWindow, Emitter, GenerationReport, Generator, Preset, PresetOptions,
    RenameRule, RunErrorPolicy,
};

#[derive(Parser, Debug)]
#[command(name = "rungen")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate dispatch messages for completed sequencing runs", long_about = None)]
struct Cli {
    /// Generator preset (generic-nextflow, routine-sequence-qc, irida-upload,
    /// routine-irida-upload, symlink-fastq)
    #[arg(long)]
    preset: Preset,

    /// Parent directory containing run directories
    #[arg(short = 'i', long)]
    input_parent_dir: PathBuf,

    /// Command template (JSON)
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Parent directory for per-run output directories
    #[arg(short = 'o', long, conflicts_with = "output_dir")]
    output_parent_dir: Option<PathBuf>,

    /// Single output directory shared by every run
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Only runs dated on or after this day (YYYY-MM-DD)
    #[arg(long, short = 's', visible_alias = "starting-from")]
    after: Option<NaiveDate>,

    /// Only runs dated strictly before this day (YYYY-MM-DD)
    #[arg(long)]
    before: Option<NaiveDate>,

    /// What to do when a single run cannot be evaluated (skip or abort)
    #[arg(long, default_value = "skip")]
    on_run_error: RunErrorPolicy,

    /// How symlink destinations are named
    #[arg(long, value_enum, default_value_t = RenameArg::Keep)]
    rename: RenameArg,

    /// Conda environment cache root (default: $HOME/.conda/envs)
    #[arg(long, env = "RUNGEN_CACHE_ROOT")]
    cache_root: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RenameArg {
    Keep,
    SampleAndRead,
}

impl From<RenameArg> for RenameRule {
    fn from(arg: RenameArg) -> Self {
        match arg {
            RenameArg::Keep => RenameRule::Keep,
            RenameArg::SampleAndRead => RenameRule::SampleAndRead,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    rungen_core::init_tracing(cli.json, level);

    let mut emitter = Emitter::stdout();
    let report = cmd_generate(&cli, &mut emitter)?;
    info!(
        version = rungen_core::VERSION,
        preset = %cli.preset,
        candidates = report.candidates,
        selected = report.selected.len(),
        rejected = report.rejected,
        skipped = report.skipped.len(),
        messages = report.messages,
        "Generation complete"
    );
    Ok(())
}

fn cmd_generate<W: Write>(cli: &Cli, emitter: &mut Emitter<W>) -> Result<GenerationReport> {
    let template_json = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read template {}", cli.config.display()))?;
    let template = CommandTemplate::from_json_str(&template_json)
        .with_context(|| format!("Invalid template {}", cli.config.display()))?;

    let options = PresetOptions {
        window: DateWindow {
            after: cli.after,
            before: cli.before,
        },
        output_parent_dir: cli.output_parent_dir.as_deref().map(absolute).transpose()?,
        output_dir: cli.output_dir.as_deref().map(absolute).transpose()?,
        rename: cli.rename.into(),
        cache_root: cli.cache_root.clone(),
        on_run_error: cli.on_run_error,
    };
    let settings = cli.preset.settings(options)?;
    let mut generator = Generator::new(settings, template)?;

    let input = absolute(&cli.input_parent_dir)?;
    let report = generator
        .run(&input, emitter)
        .with_context(|| format!("Generation failed for {}", input.display()))?;
    Ok(report)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Failed to resolve {}", path.display()))
}
