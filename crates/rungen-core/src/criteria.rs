//! Inclusion/exclusion rule evaluation over candidate run directories.
//!
//! A candidate is accepted iff every inclusion criterion holds and no
//! exclusion criterion holds. Criteria are evaluated in declaration order and
//! short-circuit, so a run rejected by its name pattern never reaches the
//! date predicate. Predicates only read the filesystem.
//!
//! Cross-run state is limited to the runs accepted earlier in the same
//! invocation, passed to each evaluation as a read-only slice.

use std::cell::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RungenError};
use crate::obs;
use crate::source::RunDirectory;

/// Marker written by the instrument when a run has finished copying.
pub const COPY_COMPLETE: &str = "COPY_COMPLETE";

/// Marker written by the upload agent when a run has finished uploading.
pub const UPLOAD_COMPLETE: &str = "upload_complete.json";

/// Sequencing instruments with a recognised run directory naming scheme.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    MiSeq,
    NextSeq,
}

impl Instrument {
    pub const ALL: [Instrument; 2] = [Instrument::MiSeq, Instrument::NextSeq];

    /// Run id pattern, anchored at the start only.
    pub fn pattern(&self) -> &'static str {
        match self {
            Instrument::MiSeq => r"^\d{6}_[A-Z0-9]{6}_\d{4}_\d{9}-[A-Z0-9]{5}",
            Instrument::NextSeq => r"^\d{6}_[A-Z0-9]{7}_\d+_[A-Z0-9]{9}",
        }
    }
}

/// Where an "already processed" marker lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "base", content = "path", rename_all = "snake_case")]
pub enum OutputMarker {
    /// Relative to the run directory.
    InRun(PathBuf),
    /// Relative to `<output root>/<run id>`.
    InOutputRoot(PathBuf),
    /// `<dir>/<run id><suffix>`, for outputs that share one directory.
    RunFile { dir: PathBuf, suffix: String },
}

impl OutputMarker {
    /// Named-file marker for `run_id` inside `dir`.
    pub fn run_file_path(dir: &Path, run_id: &str, suffix: &str) -> PathBuf {
        dir.join(format!("{run_id}{suffix}"))
    }
}

/// Half-open date window `[after, before)` over run dates.
///
/// A run dated exactly on `after` is inside the window; a run dated exactly
/// on `before` is outside it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateWindow {
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

impl DateWindow {
    pub fn is_unbounded(&self) -> bool {
        self.after.is_none() && self.before.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.after.map_or(true, |after| date >= after)
            && self.before.map_or(true, |before| date < before)
    }
}

/// A named predicate over an [`EvaluationContext`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Criterion {
    /// Run id matches one of the instruments' naming patterns.
    RunIdFormat { instruments: Vec<Instrument> },
    /// At least one of the marker files exists in the run directory.
    UploadComplete { markers: Vec<String> },
    /// The sample sheet names an experiment.
    ExperimentNamePresent,
    /// The output marker already exists.
    AlreadyProcessed { marker: OutputMarker },
    /// The run date falls outside the window.
    OutsideDateWindow { window: DateWindow },
    /// A run with the same experiment name was already accepted in this invocation.
    DuplicateExperiment,
}

impl Criterion {
    /// Inclusion criterion matching every known instrument.
    pub fn run_id_format() -> Self {
        Criterion::RunIdFormat {
            instruments: Instrument::ALL.to_vec(),
        }
    }

    /// Inclusion criterion accepting any of the given completion markers.
    pub fn upload_complete(markers: &[&str]) -> Self {
        Criterion::UploadComplete {
            markers: markers.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn already_processed_in_run(relative: impl Into<PathBuf>) -> Self {
        Criterion::AlreadyProcessed {
            marker: OutputMarker::InRun(relative.into()),
        }
    }

    pub fn already_processed_in_output(relative: impl Into<PathBuf>) -> Self {
        Criterion::AlreadyProcessed {
            marker: OutputMarker::InOutputRoot(relative.into()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Criterion::RunIdFormat { .. } => "run_id_format",
            Criterion::UploadComplete { .. } => "upload_complete",
            Criterion::ExperimentNamePresent => "experiment_name_present",
            Criterion::AlreadyProcessed { .. } => "already_processed",
            Criterion::OutsideDateWindow { .. } => "outside_date_window",
            Criterion::DuplicateExperiment => "duplicate_experiment",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusion and exclusion criteria applied together.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CriteriaSet {
    pub inclusion: Vec<Criterion>,
    pub exclusion: Vec<Criterion>,
}

impl CriteriaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, criterion: Criterion) -> Self {
        self.inclusion.push(criterion);
        self
    }

    pub fn exclude(mut self, criterion: Criterion) -> Self {
        self.exclusion.push(criterion);
        self
    }

    /// Register the date-window exclusion, unless the window has no bounds.
    pub fn exclude_outside(self, window: DateWindow) -> Self {
        if window.is_unbounded() {
            self
        } else {
            self.exclude(Criterion::OutsideDateWindow { window })
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.inclusion.iter().chain(self.exclusion.iter())
    }
}

/// How a per-run evaluation failure affects the invocation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorPolicy {
    /// Log the failure, record it, and continue with the next run.
    #[default]
    Skip,
    /// Fail the whole invocation before anything is emitted.
    Abort,
}

impl FromStr for RunErrorPolicy {
    type Err = RungenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(RunErrorPolicy::Skip),
            "abort" => Ok(RunErrorPolicy::Abort),
            other => Err(RungenError::Config(format!(
                "unknown run error policy '{other}' (expected skip or abort)"
            ))),
        }
    }
}

/// A run that passed every criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedRun {
    pub run: RunDirectory,
    /// Populated only when some criterion needed the sample sheet.
    pub experiment_name: Option<String>,
}

/// Which half of the criteria set rejected a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedBy {
    Inclusion,
    Exclusion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub run_id: String,
    pub criterion: &'static str,
    pub by: RejectedBy,
}

/// A run whose evaluation failed and was skipped.
#[derive(Debug)]
pub struct RunFailure {
    pub run_id: String,
    pub error: RungenError,
}

/// Outcome of [`CriteriaEngine::select`].
#[derive(Debug, Default)]
pub struct Selection {
    /// Accepted runs, in enumeration order.
    pub accepted: Vec<SelectedRun>,
    pub rejected: Vec<Rejection>,
    pub failed: Vec<RunFailure>,
}

/// Per-candidate view handed to each predicate.
pub struct EvaluationContext<'a> {
    pub run: &'a RunDirectory,
    pub output_root: Option<&'a Path>,
    /// Runs accepted earlier in this invocation.
    pub accepted: &'a [SelectedRun],
    experiment_name: OnceCell<Option<String>>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        run: &'a RunDirectory,
        output_root: Option<&'a Path>,
        accepted: &'a [SelectedRun],
    ) -> Self {
        Self {
            run,
            output_root,
            accepted,
            experiment_name: OnceCell::new(),
        }
    }

    /// Experiment name, read from the sample sheet on first use.
    pub fn experiment_name(&self) -> Result<Option<&str>> {
        if self.experiment_name.get().is_none() {
            let name = self.run.experiment_name()?;
            let _ = self.experiment_name.set(name);
        }
        Ok(self.experiment_name.get().and_then(|n| n.as_deref()))
    }

    fn into_selected(self) -> SelectedRun {
        SelectedRun {
            run: self.run.clone(),
            experiment_name: self.experiment_name.into_inner().flatten(),
        }
    }
}

enum Verdict {
    Accepted(SelectedRun),
    Rejected(Rejection),
}

/// Evaluates a [`CriteriaSet`] against candidate runs.
pub struct CriteriaEngine {
    criteria: CriteriaSet,
    output_root: Option<PathBuf>,
    patterns: Vec<(Instrument, Regex)>,
}

impl CriteriaEngine {
    /// Compile the run id patterns and check that every criterion can be evaluated.
    pub fn new(criteria: CriteriaSet, output_root: Option<PathBuf>) -> Result<Self> {
        let needs_output_root = criteria.iter().any(|c| {
            matches!(
                c,
                Criterion::AlreadyProcessed {
                    marker: OutputMarker::InOutputRoot(_)
                }
            )
        });
        if needs_output_root && output_root.is_none() {
            return Err(RungenError::Config(
                "already_processed marker is relative to the output root, but no output root is set"
                    .to_string(),
            ));
        }

        let patterns = Instrument::ALL
            .iter()
            .map(|instrument| {
                Regex::new(instrument.pattern())
                    .map(|re| (*instrument, re))
                    .map_err(|e| RungenError::Config(format!("bad run id pattern: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            criteria,
            output_root,
            patterns,
        })
    }

    /// Select the accepted subset of `candidates`, preserving their order.
    pub fn select(&self, candidates: &[RunDirectory], policy: RunErrorPolicy) -> Result<Selection> {
        let mut selection = Selection::default();

        for run in candidates {
            match self.evaluate(run, &selection.accepted) {
                Ok(Verdict::Accepted(selected)) => selection.accepted.push(selected),
                Ok(Verdict::Rejected(rejection)) => {
                    obs::emit_run_rejected(&rejection.run_id, rejection.criterion);
                    selection.rejected.push(rejection);
                }
                Err(error) if error.is_per_run() => match policy {
                    RunErrorPolicy::Skip => {
                        obs::emit_run_skipped(run.run_id(), &error);
                        selection.failed.push(RunFailure {
                            run_id: run.run_id().to_string(),
                            error,
                        });
                    }
                    RunErrorPolicy::Abort => {
                        return Err(RungenError::RunEvaluation {
                            run_id: run.run_id().to_string(),
                            source: Box::new(error),
                        });
                    }
                },
                Err(error) => return Err(error),
            }
        }

        Ok(selection)
    }

    fn evaluate(&self, run: &RunDirectory, accepted: &[SelectedRun]) -> Result<Verdict> {
        let ctx = EvaluationContext::new(run, self.output_root.as_deref(), accepted);

        for criterion in &self.criteria.inclusion {
            if !self.holds(criterion, &ctx)? {
                return Ok(Verdict::Rejected(Rejection {
                    run_id: run.run_id().to_string(),
                    criterion: criterion.name(),
                    by: RejectedBy::Inclusion,
                }));
            }
        }

        for criterion in &self.criteria.exclusion {
            if self.holds(criterion, &ctx)? {
                return Ok(Verdict::Rejected(Rejection {
                    run_id: run.run_id().to_string(),
                    criterion: criterion.name(),
                    by: RejectedBy::Exclusion,
                }));
            }
        }

        Ok(Verdict::Accepted(ctx.into_selected()))
    }

    fn holds(&self, criterion: &Criterion, ctx: &EvaluationContext<'_>) -> Result<bool> {
        let run = ctx.run;
        match criterion {
            Criterion::RunIdFormat { instruments } => Ok(self
                .patterns
                .iter()
                .filter(|(instrument, _)| instruments.contains(instrument))
                .any(|(_, re)| re.is_match(run.run_id()))),
            Criterion::UploadComplete { markers } => {
                Ok(markers.iter().any(|m| run.path().join(m).is_file()))
            }
            Criterion::ExperimentNamePresent => Ok(ctx.experiment_name()?.is_some()),
            Criterion::AlreadyProcessed { marker } => {
                let path = match marker {
                    OutputMarker::InRun(rel) => run.path().join(rel),
                    OutputMarker::InOutputRoot(rel) => match ctx.output_root {
                        Some(root) => root.join(run.run_id()).join(rel),
                        None => return Ok(false),
                    },
                    OutputMarker::RunFile { dir, suffix } => {
                        OutputMarker::run_file_path(dir, run.run_id(), suffix)
                    }
                };
                Ok(path.exists())
            }
            Criterion::OutsideDateWindow { window } => Ok(!window.contains(run.run_date()?)),
            Criterion::DuplicateExperiment => {
                let Some(name) = ctx.experiment_name()? else {
                    return Ok(false);
                };
                Ok(ctx
                    .accepted
                    .iter()
                    .any(|prior| prior.experiment_name.as_deref() == Some(name)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SAMPLE_SHEET;
    use std::fs;

    const MISEQ: &str = "210101_M00001_0001_000000000-AAAAA";
    const NEXTSEQ: &str = "210102_VH00123_7_AAAAAAAM5";

    fn make_run(parent: &Path, name: &str, markers: &[&str]) -> RunDirectory {
        let path = parent.join(name);
        fs::create_dir_all(&path).unwrap();
        for marker in markers {
            fs::write(path.join(marker), b"").unwrap();
        }
        RunDirectory::new(path)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ids(selection: &Selection) -> Vec<&str> {
        selection.accepted.iter().map(|s| s.run.run_id()).collect()
    }

    #[test]
    fn test_empty_sets_accept_everything() {
        let dir = tempfile::tempdir().unwrap();
        let runs = vec![make_run(dir.path(), "anything", &[])];
        let engine = CriteriaEngine::new(CriteriaSet::new(), None).unwrap();
        let selection = engine.select(&runs, RunErrorPolicy::Abort).unwrap();
        assert_eq!(ids(&selection), vec!["anything"]);
    }

    #[test]
    fn test_run_id_format_matches_both_instruments() {
        let dir = tempfile::tempdir().unwrap();
        let runs = vec![
            make_run(dir.path(), MISEQ, &[]),
            make_run(dir.path(), NEXTSEQ, &[]),
            make_run(dir.path(), "scratch", &[]),
            make_run(dir.path(), "210101_m00001_0001_000000000-aaaaa", &[]),
        ];
        let engine =
            CriteriaEngine::new(CriteriaSet::new().include(Criterion::run_id_format()), None)
                .unwrap();
        let selection = engine.select(&runs, RunErrorPolicy::Abort).unwrap();
        assert_eq!(ids(&selection), vec![MISEQ, NEXTSEQ]);
        assert_eq!(selection.rejected.len(), 2);
        assert!(selection
            .rejected
            .iter()
            .all(|r| r.criterion == "run_id_format" && r.by == RejectedBy::Inclusion));
    }

    #[test]
    fn test_run_id_format_restricted_to_one_instrument() {
        let dir = tempfile::tempdir().unwrap();
        let runs = vec![
            make_run(dir.path(), MISEQ, &[]),
            make_run(dir.path(), NEXTSEQ, &[]),
        ];
        let criteria = CriteriaSet::new().include(Criterion::RunIdFormat {
            instruments: vec![Instrument::NextSeq],
        });
        let engine = CriteriaEngine::new(criteria, None).unwrap();
        let selection = engine.select(&runs, RunErrorPolicy::Abort).unwrap();
        assert_eq!(ids(&selection), vec![NEXTSEQ]);
    }

    #[test]
    fn test_upload_complete_accepts_any_marker() {
        let dir = tempfile::tempdir().unwrap();
        let runs = vec![
            make_run(dir.path(), "210101_M00001_0001_000000000-AAAAA", &[COPY_COMPLETE]),
            make_run(dir.path(), "210102_M00001_0002_000000000-BBBBB", &[UPLOAD_COMPLETE]),
            make_run(dir.path(), "210103_M00001_0003_000000000-CCCCC", &[]),
        ];
        let criteria = CriteriaSet::new()
            .include(Criterion::run_id_format())
            .include(Criterion::upload_complete(&[COPY_COMPLETE, UPLOAD_COMPLETE]));
        let engine = CriteriaEngine::new(criteria, None).unwrap();
        let selection = engine.select(&runs, RunErrorPolicy::Abort).unwrap();
        assert_eq!(selection.accepted.len(), 2);
        assert_eq!(selection.rejected[0].criterion, "upload_complete");
    }

    #[test]
    fn test_upload_complete_marker_must_be_file() {
        let dir = tempfile::tempdir().unwrap();
        let run = make_run(dir.path(), MISEQ, &[]);
        fs::create_dir(run.path().join(COPY_COMPLETE)).unwrap();
        let engine = CriteriaEngine::new(
            CriteriaSet::new().include(Criterion::upload_complete(&[COPY_COMPLETE])),
            None,
        )
        .unwrap();
        let selection = engine.select(&[run], RunErrorPolicy::Abort).unwrap();
        assert!(selection.accepted.is_empty());
    }

    #[test]
    fn test_already_processed_excludes_after_inclusion() {
        let dir = tempfile::tempdir().unwrap();
        let done = make_run(dir.path(), MISEQ, &[COPY_COMPLETE]);
        fs::create_dir(done.path().join("RoutineQC")).unwrap();
        let fresh = make_run(dir.path(), "210102_M00001_0002_000000000-BBBBB", &[COPY_COMPLETE]);

        let criteria = CriteriaSet::new()
            .include(Criterion::run_id_format())
            .include(Criterion::upload_complete(&[COPY_COMPLETE]))
            .exclude(Criterion::already_processed_in_run("RoutineQC"));
        let engine = CriteriaEngine::new(criteria, None).unwrap();
        let selection = engine.select(&[done, fresh], RunErrorPolicy::Abort).unwrap();

        assert_eq!(ids(&selection), vec!["210102_M00001_0002_000000000-BBBBB"]);
        assert_eq!(selection.rejected[0].criterion, "already_processed");
        assert_eq!(selection.rejected[0].by, RejectedBy::Exclusion);
    }

    #[test]
    fn test_already_processed_under_output_root() {
        let runs_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let run = make_run(runs_dir.path(), MISEQ, &[]);
        let criteria =
            CriteriaSet::new().exclude(Criterion::already_processed_in_output("COMPLETE"));
        let engine =
            CriteriaEngine::new(criteria, Some(out_dir.path().to_path_buf())).unwrap();

        let before = engine.select(&[run.clone()], RunErrorPolicy::Abort).unwrap();
        assert_eq!(before.accepted.len(), 1);

        fs::create_dir_all(out_dir.path().join(MISEQ)).unwrap();
        fs::write(out_dir.path().join(MISEQ).join("COMPLETE"), b"").unwrap();
        let after = engine.select(&[run], RunErrorPolicy::Abort).unwrap();
        assert!(after.accepted.is_empty());
    }

    #[test]
    fn test_run_file_marker_is_per_run() {
        let runs_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let linked = make_run(runs_dir.path(), MISEQ, &[]);
        let fresh = make_run(runs_dir.path(), "210102_M00001_0002_000000000-BBBBB", &[]);
        fs::write(out_dir.path().join("COMPLETE"), b"").unwrap();
        fs::write(out_dir.path().join(format!("{MISEQ}.COMPLETE")), b"").unwrap();

        let criteria = CriteriaSet::new().exclude(Criterion::AlreadyProcessed {
            marker: OutputMarker::RunFile {
                dir: out_dir.path().to_path_buf(),
                suffix: ".COMPLETE".to_string(),
            },
        });
        let engine = CriteriaEngine::new(criteria, None).unwrap();
        let selection = engine.select(&[linked, fresh], RunErrorPolicy::Abort).unwrap();
        assert_eq!(ids(&selection), vec!["210102_M00001_0002_000000000-BBBBB"]);
    }

    #[test]
    fn test_unreadable_sample_sheet_follows_policy() {
        let dir = tempfile::tempdir().unwrap();
        let broken = make_run(dir.path(), MISEQ, &[]);
        let named = make_run(dir.path(), "210102_M00001_0002_000000000-BBBBB", &[]);
        fs::write(broken.path().join(SAMPLE_SHEET), b"\xff\xfe\x00\xc3").unwrap();
        fs::write(named.path().join(SAMPLE_SHEET), "Experiment Name,EXP-2\n").unwrap();
        let criteria = CriteriaSet::new().include(Criterion::ExperimentNamePresent);
        let engine = CriteriaEngine::new(criteria, None).unwrap();

        let runs = [broken, named];
        let skipped = engine.select(&runs, RunErrorPolicy::Skip).unwrap();
        assert_eq!(ids(&skipped), vec!["210102_M00001_0002_000000000-BBBBB"]);
        assert_eq!(skipped.failed.len(), 1);
        assert!(matches!(
            skipped.failed[0].error,
            RungenError::SampleSheet { .. }
        ));

        let err = engine.select(&runs, RunErrorPolicy::Abort).unwrap_err();
        match err {
            RungenError::RunEvaluation { run_id, source } => {
                assert_eq!(run_id, MISEQ);
                assert!(matches!(*source, RungenError::SampleSheet { .. }));
            }
            other => panic!("expected RunEvaluation, got {other:?}"),
        }
    }

    #[test]
    fn test_output_root_marker_requires_output_root() {
        let criteria =
            CriteriaSet::new().exclude(Criterion::already_processed_in_output("COMPLETE"));
        let err = CriteriaEngine::new(criteria, None).err().unwrap();
        assert!(matches!(err, RungenError::Config(_)));
    }

    #[test]
    fn test_date_window_is_half_open() {
        let window = DateWindow {
            after: Some(date(2021, 1, 1)),
            before: Some(date(2021, 2, 1)),
        };
        assert!(window.contains(date(2021, 1, 1)));
        assert!(window.contains(date(2021, 1, 31)));
        assert!(!window.contains(date(2021, 2, 1)));
        assert!(!window.contains(date(2020, 12, 31)));
    }

    #[test]
    fn test_date_window_boundaries_in_selection() {
        let dir = tempfile::tempdir().unwrap();
        let runs = vec![
            make_run(dir.path(), "201231_M00001_0001_000000000-AAAAA", &[]),
            make_run(dir.path(), "210101_M00001_0002_000000000-AAAAA", &[]),
            make_run(dir.path(), "210131_M00001_0003_000000000-AAAAA", &[]),
            make_run(dir.path(), "210201_M00001_0004_000000000-AAAAA", &[]),
        ];
        let criteria = CriteriaSet::new().exclude_outside(DateWindow {
            after: Some(date(2021, 1, 1)),
            before: Some(date(2021, 2, 1)),
        });
        let engine = CriteriaEngine::new(criteria, None).unwrap();
        let selection = engine.select(&runs, RunErrorPolicy::Abort).unwrap();
        assert_eq!(
            ids(&selection),
            vec![
                "210101_M00001_0002_000000000-AAAAA",
                "210131_M00001_0003_000000000-AAAAA"
            ]
        );
    }

    #[test]
    fn test_unbounded_window_not_registered() {
        let criteria = CriteriaSet::new().exclude_outside(DateWindow::default());
        assert!(criteria.exclusion.is_empty());
    }

    #[test]
    fn test_malformed_date_abort_policy() {
        let dir = tempfile::tempdir().unwrap();
        let runs = vec![
            make_run(dir.path(), "2101XX_M00001_0001_000000000-AAAAA", &[]),
            make_run(dir.path(), "210105_M00001_0002_000000000-AAAAA", &[]),
        ];
        let criteria = CriteriaSet::new().exclude_outside(DateWindow {
            after: Some(date(2021, 1, 1)),
            before: None,
        });
        let engine = CriteriaEngine::new(criteria, None).unwrap();
        let err = engine.select(&runs, RunErrorPolicy::Abort).unwrap_err();
        match err {
            RungenError::RunEvaluation { run_id, source } => {
                assert_eq!(run_id, "2101XX_M00001_0001_000000000-AAAAA");
                assert!(matches!(*source, RungenError::MalformedRunDate { .. }));
            }
            other => panic!("expected RunEvaluation, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_date_skip_policy() {
        let dir = tempfile::tempdir().unwrap();
        let runs = vec![
            make_run(dir.path(), "2101XX_M00001_0001_000000000-AAAAA", &[]),
            make_run(dir.path(), "210105_M00001_0002_000000000-AAAAA", &[]),
        ];
        let criteria = CriteriaSet::new().exclude_outside(DateWindow {
            after: Some(date(2021, 1, 1)),
            before: None,
        });
        let engine = CriteriaEngine::new(criteria, None).unwrap();
        let selection = engine.select(&runs, RunErrorPolicy::Skip).unwrap();
        assert_eq!(ids(&selection), vec!["210105_M00001_0002_000000000-AAAAA"]);
        assert_eq!(selection.failed.len(), 1);
        assert_eq!(selection.failed[0].run_id, "2101XX_M00001_0001_000000000-AAAAA");
    }

    #[test]
    fn test_name_pattern_short_circuits_date_parse() {
        let dir = tempfile::tempdir().unwrap();
        let runs = vec![make_run(dir.path(), "scratch", &[])];
        let criteria = CriteriaSet::new()
            .include(Criterion::run_id_format())
            .exclude_outside(DateWindow {
                after: Some(date(2021, 1, 1)),
                before: None,
            });
        let engine = CriteriaEngine::new(criteria, None).unwrap();
        let selection = engine.select(&runs, RunErrorPolicy::Abort).unwrap();
        assert!(selection.accepted.is_empty());
        assert!(selection.failed.is_empty());
    }

    #[test]
    fn test_experiment_name_present_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let first = make_run(dir.path(), "210101_M00001_0001_000000000-AAAAA", &[]);
        let second = make_run(dir.path(), "210102_M00001_0002_000000000-AAAAA", &[]);
        let third = make_run(dir.path(), "210103_M00001_0003_000000000-AAAAA", &[]);
        let unnamed = make_run(dir.path(), "210104_M00001_0004_000000000-AAAAA", &[]);
        fs::write(first.path().join(SAMPLE_SHEET), "Experiment Name,EXP-1\n").unwrap();
        fs::write(second.path().join(SAMPLE_SHEET), "Experiment Name,EXP-1,,\n").unwrap();
        fs::write(third.path().join(SAMPLE_SHEET), "Experiment Name,EXP-2\n").unwrap();

        let criteria = CriteriaSet::new()
            .include(Criterion::ExperimentNamePresent)
            .exclude(Criterion::DuplicateExperiment);
        let engine = CriteriaEngine::new(criteria, None).unwrap();
        let selection = engine
            .select(&[first, second, third, unnamed], RunErrorPolicy::Abort)
            .unwrap();

        assert_eq!(
            ids(&selection),
            vec![
                "210101_M00001_0001_000000000-AAAAA",
                "210103_M00001_0003_000000000-AAAAA"
            ]
        );
        assert_eq!(selection.accepted[0].experiment_name.as_deref(), Some("EXP-1"));
        let reasons: Vec<_> = selection.rejected.iter().map(|r| r.criterion).collect();
        assert_eq!(reasons, vec!["duplicate_experiment", "experiment_name_present"]);
    }

    #[test]
    fn test_run_error_policy_from_str() {
        assert_eq!("skip".parse::<RunErrorPolicy>().unwrap(), RunErrorPolicy::Skip);
        assert_eq!("abort".parse::<RunErrorPolicy>().unwrap(), RunErrorPolicy::Abort);
        assert!("retry".parse::<RunErrorPolicy>().is_err());
    }

    #[test]
    fn test_criterion_serde_tagged() {
        let c = Criterion::already_processed_in_run("RoutineQC");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "already_processed");
        let back: Criterion = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
