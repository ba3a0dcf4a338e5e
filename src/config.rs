#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use bon::Builder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    constants::{
        DEFAULT_INSTRUCTOR, DEFAULT_NUMERIC_OFFSET, FEEDBACK_DIR, HIGHLIGHT_COLOR,
        RESULTS_JSON_FILE, RETRY_BASE_DELAY, SCORES_FILE, SUMMARY_FILE, WRITE_RETRIES,
    },
    types::MarkerColor,
};

/// What a submission scores when the key has no graded cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyKeyPolicy {
    /// Every submission scores 0.
    #[default]
    Zero,
    /// Every submission scores 100.
    Full,
}

impl EmptyKeyPolicy {
    /// The score handed out under this policy.
    pub fn score(self) -> u8 {
        match self {
            EmptyKeyPolicy::Zero => 0,
            EmptyKeyPolicy::Full => 100,
        }
    }
}

impl FromStr for EmptyKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" | "0" => Ok(EmptyKeyPolicy::Zero),
            "full" | "100" => Ok(EmptyKeyPolicy::Full),
            other => Err(format!("unknown empty-key policy `{other}` (expected zero or full)")),
        }
    }
}

impl fmt::Display for EmptyKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyKeyPolicy::Zero => f.write_str("zero"),
            EmptyKeyPolicy::Full => f.write_str("full"),
        }
    }
}

/// Grading settings shared, read-only, by every stage of a run.
#[derive(Debug, Clone, Builder)]
#[builder(on(String, into))]
pub struct GradingConfig {
    /// Sheet holding the graded cells, in the key and in every submission.
    sheet:          String,
    /// Fill color that marks graded cells.
    #[builder(default)]
    marker:         MarkerColor,
    /// Row offset of the value checked by the formula check.
    #[builder(default = DEFAULT_NUMERIC_OFFSET)]
    numeric_offset: i64,
    /// Author name attached to correction notes.
    #[builder(default = DEFAULT_INSTRUCTOR.to_string())]
    instructor:     String,
    /// RGB fill used to highlight wrong cells.
    #[builder(default = HIGHLIGHT_COLOR)]
    highlight:      u32,
    /// Number of submissions processed concurrently.
    #[builder(default = default_workers())]
    workers:        usize,
    /// Score policy for keys without graded cells.
    #[builder(default)]
    empty_key:      EmptyKeyPolicy,
    /// Attempts made for each output write.
    #[builder(default = WRITE_RETRIES)]
    retries:        u32,
    /// Delay before the first write retry.
    #[builder(default = RETRY_BASE_DELAY)]
    retry_delay:    Duration,
}

impl GradingConfig {
    /// Sheet holding the graded cells.
    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Fill color that marks graded cells.
    pub fn marker(&self) -> &MarkerColor {
        &self.marker
    }

    /// Row offset of the value checked by the formula check.
    pub fn numeric_offset(&self) -> i64 {
        self.numeric_offset
    }

    /// Author name attached to correction notes.
    pub fn instructor(&self) -> &str {
        &self.instructor
    }

    /// RGB fill used to highlight wrong cells.
    pub fn highlight(&self) -> u32 {
        self.highlight
    }

    /// Number of submissions processed concurrently (at least 1).
    pub fn workers(&self) -> usize {
        self.workers.max(1)
    }

    /// Score policy for keys without graded cells.
    pub fn empty_key(&self) -> EmptyKeyPolicy {
        self.empty_key
    }

    /// Attempts made for each output write.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Delay before the first write retry.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }
}

/// Default worker count: the machine's available parallelism.
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(4)
}

/// Settings picked up from `SHEETGRADE_*` environment variables.
///
/// Unset or unparsable variables are left as `None` so callers can fall back
/// to command-line values or defaults.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    /// `SHEETGRADE_MARKER`
    pub marker:     Option<MarkerColor>,
    /// `SHEETGRADE_OFFSET`
    pub offset:     Option<i64>,
    /// `SHEETGRADE_INSTRUCTOR`
    pub instructor: Option<String>,
    /// `SHEETGRADE_WORKERS`
    pub workers:    Option<usize>,
    /// `SHEETGRADE_EMPTY_KEY`
    pub empty_key:  Option<EmptyKeyPolicy>,
    /// `SHEETGRADE_RETRIES`
    pub retries:    Option<u32>,
}

impl EnvOverrides {
    /// Reads the overrides from the process environment.
    pub fn from_env() -> Self {
        Self {
            marker:     read_env("SHEETGRADE_MARKER"),
            offset:     read_env("SHEETGRADE_OFFSET"),
            instructor: read_env::<String>("SHEETGRADE_INSTRUCTOR").filter(|s| !s.is_empty()),
            workers:    read_env("SHEETGRADE_WORKERS"),
            empty_key:  read_env("SHEETGRADE_EMPTY_KEY"),
            retries:    read_env("SHEETGRADE_RETRIES"),
        }
    }
}

/// Parses an environment variable, returning `None` when it is missing or
/// does not parse.
fn read_env<T: FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("Ignoring {name}={value:?}: could not parse the value");
            None
        }
    }
}

/// Every path a grading run reads from or writes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPaths {
    /// Answer key workbook.
    key:             PathBuf,
    /// Directory of extracted submissions.
    submissions_dir: PathBuf,
    /// Directory receiving every produced artifact.
    output_dir:      PathBuf,
    /// Optional roster (CSV or `.xlsx`).
    roster:          Option<PathBuf>,
    /// Directory receiving annotated feedback copies.
    feedback_dir:    PathBuf,
}

impl RunPaths {
    /// Creates run paths with the default feedback directory and no roster.
    pub fn new(
        key: impl Into<PathBuf>,
        submissions_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::build_with_defaults(key.into(), submissions_dir.into(), output_dir.into(), None, None)
    }

    /// Answer key workbook.
    pub fn key(&self) -> &Path {
        &self.key
    }

    /// Directory of extracted submissions.
    pub fn submissions_dir(&self) -> &Path {
        &self.submissions_dir
    }

    /// Directory receiving every produced artifact.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Optional roster file.
    pub fn roster(&self) -> Option<&Path> {
        self.roster.as_deref()
    }

    /// Returns a copy of these paths with a roster attached.
    pub fn with_roster(mut self, roster: impl Into<PathBuf>) -> Self {
        self.roster = Some(roster.into());
        self
    }

    /// Directory receiving annotated feedback copies.
    pub fn feedback_dir(&self) -> &Path {
        &self.feedback_dir
    }

    /// Item-analysis workbook.
    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(SUMMARY_FILE)
    }

    /// Per-student scores export.
    pub fn scores_path(&self) -> PathBuf {
        self.output_dir.join(SCORES_FILE)
    }

    /// Machine readable batch results.
    pub fn results_json_path(&self) -> PathBuf {
        self.output_dir.join(RESULTS_JSON_FILE)
    }

    /// Where the feedback copy of `submission` goes, mirroring its location
    /// under the submissions directory.
    pub fn feedback_path_for(&self, submission: &Path) -> PathBuf {
        let relative = submission
            .strip_prefix(&self.submissions_dir)
            .unwrap_or_else(|_| Path::new(submission.file_name().unwrap_or_default()));
        self.feedback_dir.join(relative)
    }

    /// Centralized constructor that applies the standard layout when
    /// overrides are absent.
    fn build_with_defaults(
        key: PathBuf,
        submissions_dir: PathBuf,
        output_dir: PathBuf,
        roster: Option<PathBuf>,
        feedback_dir: Option<PathBuf>,
    ) -> Self {
        let feedback_dir = feedback_dir.unwrap_or_else(|| output_dir.join(FEEDBACK_DIR));
        Self {
            key,
            submissions_dir,
            output_dir,
            roster,
            feedback_dir,
        }
    }
}

/// Builder-friendly constructor for `RunPaths` with optional overrides.
#[bon::builder(finish_fn = build)]
pub fn run_paths(
    #[builder(into)] key: PathBuf,
    #[builder(into)] submissions_dir: PathBuf,
    #[builder(into)] output_dir: PathBuf,
    roster: Option<PathBuf>,
    feedback_dir: Option<PathBuf>,
) -> RunPaths {
    RunPaths::build_with_defaults(key, submissions_dir, output_dir, roster, feedback_dir)
}

/// Everything one grading run needs, passed by reference into each stage.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Identifier attached to the run's log lines and results.
    run_id: Uuid,
    /// Input and output locations.
    paths:  RunPaths,
    /// Grading settings.
    config: GradingConfig,
}

impl RunContext {
    /// Creates a context with a fresh run identifier.
    pub fn new(paths: RunPaths, config: GradingConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            paths,
            config,
        }
    }

    /// Identifier of this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Input and output locations.
    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    /// Grading settings.
    pub fn config(&self) -> &GradingConfig {
        &self.config
    }
}
