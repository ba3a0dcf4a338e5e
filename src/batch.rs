#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use colored::Colorize;
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::RunContext,
    constants::{LOCK_FILE_PREFIX, SUBMISSION_SEARCH_DEPTH},
    grade::{
        AnswerKey, CohortReport, GradeRow, ItemAnalysis, ScoreRow, SubmissionGrid, SubmissionResult,
        classify, load_key, overview_table, score, write_feedback, write_item_analysis, write_json,
        write_scores,
    },
    roster::Roster,
    sheet::{SheetError, open_for_read},
    util::{find_files, retry_with_backoff},
};

/// A student and the file they handed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    /// First name, taken from the folder name.
    pub first_name: String,
    /// Last name (everything after the first name).
    pub last_name:  String,
    /// Folder the submission was found in.
    pub folder:     String,
    /// Submitted workbook.
    pub path:       PathBuf,
}

impl StudentRecord {
    /// Derives the student from a submission path.
    ///
    /// Submissions live in folders named `First Last_...`: the text before
    /// the first `_` is split on whitespace into the first name and the rest.
    /// Files sitting directly in `root` use their file stem instead.
    pub fn from_path(path: &Path, root: &Path) -> Self {
        let parent = path.parent().filter(|p| *p != root);
        let folder = match parent.and_then(Path::file_name) {
            Some(name) => name.to_string_lossy().to_string(),
            None => path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
        };

        let name = folder.split('_').next().unwrap_or_default();
        let mut parts = name.split_whitespace();
        let first_name = parts.next().unwrap_or_default().to_string();
        let last_name = parts.collect::<Vec<_>>().join(" ");

        Self {
            first_name,
            last_name,
            folder,
            path: path.to_path_buf(),
        }
    }

    /// `First Last`, or the folder name when no name could be derived.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.folder.clone()
        } else {
            name.to_string()
        }
    }

    /// Whether the file is a lock file left behind by a spreadsheet editor.
    pub fn is_lock_file(&self) -> bool {
        self.path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with(LOCK_FILE_PREFIX))
    }
}

/// Finds every `.xlsx` submission under `dir`, in path order.
pub fn discover_submissions(dir: &Path) -> Result<Vec<StudentRecord>> {
    let files = find_files("xlsx", SUBMISSION_SEARCH_DEPTH, dir)
        .with_context(|| format!("Could not search {} for submissions", dir.display()))?;
    Ok(files
        .iter()
        .map(|path| StudentRecord::from_path(path, dir))
        .collect())
}

/// Why a submission could not be graded.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// The file is an editor lock file.
    #[error("{} is an editor lock file", path.display())]
    LockFile {
        /// Offending file.
        path: PathBuf,
    },
    /// The graded sheet is missing.
    #[error("sheet `{sheet}` is missing")]
    MissingSheet {
        /// Sheet that was expected.
        sheet: String,
    },
    /// The workbook could not be read.
    #[error("could not read the workbook: {0}")]
    Unreadable(#[source] SheetError),
}

impl From<SheetError> for SubmissionError {
    fn from(error: SheetError) -> Self {
        match error {
            SheetError::MissingSheet { sheet, .. } => SubmissionError::MissingSheet { sheet },
            other => SubmissionError::Unreadable(other),
        }
    }
}

/// A submission that was not graded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedSubmission {
    /// Who submitted.
    pub student:           StudentRecord,
    /// Why it was skipped.
    pub reason:            String,
    /// Whether the file stands for a student; editor lock files do not.
    #[serde(default = "counts_as_student")]
    pub counts_as_student: bool,
}

/// Default for [`SkippedSubmission::counts_as_student`].
fn counts_as_student() -> bool {
    true
}

/// A graded submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedSubmission {
    /// Who submitted.
    pub student:  StudentRecord,
    /// Verdicts and score.
    pub result:   SubmissionResult,
    /// Annotated copy, when it could be written.
    pub feedback: Option<PathBuf>,
}

/// What happened to one submission.
#[derive(Debug)]
enum Outcome {
    /// Graded (feedback may have failed separately).
    Graded(GradedSubmission),
    /// Not graded.
    Skipped(SkippedSubmission),
}

/// Everything a grading run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Identifier of the run.
    pub run_id:       Uuid,
    /// Graded sheet.
    pub sheet:        String,
    /// Number of graded cells in the key.
    pub graded_cells: usize,
    /// Graded submissions, in folder order.
    pub results:      Vec<GradedSubmission>,
    /// Submissions that could not be graded, in folder order.
    pub skipped:      Vec<SkippedSubmission>,
    /// Cohort item analysis.
    pub analysis:     ItemAnalysis,
}

impl BatchSummary {
    /// Overview table of every submission.
    pub fn overview(&self) -> String {
        let mut rows: Vec<GradeRow> =
            self.results.iter().map(|g| GradeRow::from(&g.result)).collect();
        rows.extend(self.skipped.iter().map(|s| GradeRow {
            student: s.student.display_name(),
            score:   "-".to_string(),
            details: format!("skipped: {}", s.reason),
        }));
        overview_table(&rows, self.results.len(), self.skipped.len())
    }

    /// One `Scores.csv` row per discovered student, joined with the roster.
    ///
    /// Editor lock files are left out.
    pub fn score_rows(&self, roster: Option<&Roster>) -> Vec<ScoreRow> {
        let graded = self.results.iter().map(|g| (&g.student, g.result.score));
        let skipped = self
            .skipped
            .iter()
            .filter(|s| s.counts_as_student)
            .map(|s| (&s.student, 0));

        let mut rows: Vec<ScoreRow> = graded
            .chain(skipped)
            .map(|(student, score)| {
                let entry = roster.and_then(|r| r.lookup(&student.first_name, &student.last_name));
                ScoreRow {
                    first_name: student.first_name.clone(),
                    last_name: student.last_name.clone(),
                    folder: student.folder.clone(),
                    score,
                    email: entry.and_then(|e| e.email.clone()),
                    student_id: entry.and_then(|e| e.student_id.clone()),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.folder.cmp(&b.folder));
        rows
    }
}

/// Grades one submission and writes its feedback copy.
fn grade_one(student: StudentRecord, key: &AnswerKey, ctx: &RunContext) -> Outcome {
    let config = ctx.config();
    let skip = |student: StudentRecord, error: SubmissionError| {
        tracing::warn!("Skipping {}: {error}", student.path.display());
        Outcome::Skipped(SkippedSubmission {
            student,
            counts_as_student: !matches!(error, SubmissionError::LockFile { .. }),
            reason: error.to_string(),
        })
    };

    if student.is_lock_file() {
        let error = SubmissionError::LockFile {
            path: student.path.clone(),
        };
        return skip(student, error);
    }

    let grid = match open_for_read(&student.path, config.sheet()) {
        Ok(grid) => grid,
        Err(e) => return skip(student, e.into()),
    };

    let submission = SubmissionGrid::from(&grid);
    let outcomes = classify(&submission, key, config.numeric_offset());
    let result = score(student.display_name(), outcomes, config.empty_key());
    tracing::debug!("{}: {} ({})", student.display_name(), result.score, result.counts);

    let target = ctx.paths().feedback_path_for(&student.path);
    let feedback = match write_feedback(&student.path, &target, &result, config) {
        Ok(()) => Some(target),
        Err(e) => {
            tracing::error!("Could not write feedback for {}: {e}", student.display_name());
            None
        }
    };

    Outcome::Graded(GradedSubmission {
        student,
        result,
        feedback,
    })
}

/// Loads the key, grades every submission on a bounded pool of blocking
/// workers and writes the run's artifacts.
///
/// A missing key sheet, an unreadable roster or an unwritable output
/// directory abort the run; anything wrong with a single submission only
/// skips that submission.
pub async fn run_batch(ctx: &RunContext) -> Result<BatchSummary> {
    let ctx = Arc::new(ctx.clone());
    let config = ctx.config();
    let paths = ctx.paths();

    let key = load_key(paths.key(), config)
        .with_context(|| format!("Could not load the answer key {}", paths.key().display()))?;
    let key = Arc::new(key);
    if key.is_empty() {
        tracing::warn!(
            "No cell of `{}` is filled with {}; every submission scores {}",
            config.sheet(),
            config.marker(),
            config.empty_key().score()
        );
    } else {
        tracing::info!("Answer key has {} graded cells", key.len());
    }

    let roster = paths.roster().map(Roster::load).transpose()?;
    let students = discover_submissions(paths.submissions_dir())?;
    tracing::info!(
        "Grading {} submissions from {} with {} workers (run {})",
        students.len(),
        paths.submissions_dir().display(),
        config.workers(),
        ctx.run_id()
    );

    std::fs::create_dir_all(paths.feedback_dir()).with_context(|| {
        format!("Could not create output directory {}", paths.feedback_dir().display())
    })?;

    let mut report = CohortReport::new(&key);
    let mut results = Vec::new();
    let mut skipped = Vec::new();

    let mut pending = stream::iter(students)
        .map(|student| {
            let key = Arc::clone(&key);
            let ctx = Arc::clone(&ctx);
            let fallback = student.clone();
            async move {
                let joined =
                    tokio::task::spawn_blocking(move || grade_one(student, &key, &ctx)).await;
                joined.unwrap_or_else(|e| {
                    Outcome::Skipped(SkippedSubmission {
                        student:           fallback,
                        reason:            format!("grading task failed: {e}"),
                        counts_as_student: true,
                    })
                })
            }
        })
        .buffer_unordered(config.workers());

    while let Some(outcome) = pending.next().await {
        match outcome {
            Outcome::Graded(graded) => {
                report.accumulate(&graded.result);
                results.push(graded);
            }
            Outcome::Skipped(skip) => {
                if skip.counts_as_student {
                    report.record_skipped();
                }
                skipped.push(skip);
            }
        }
    }

    results.sort_by(|a: &GradedSubmission, b| a.student.path.cmp(&b.student.path));
    skipped.sort_by(|a: &SkippedSubmission, b| a.student.path.cmp(&b.student.path));

    let summary = BatchSummary {
        run_id: ctx.run_id(),
        sheet: config.sheet().to_string(),
        graded_cells: key.len(),
        results,
        skipped,
        analysis: report.finalize(),
    };

    let artifacts = Arc::clone(&ctx);
    let written = summary.clone();
    tokio::task::spawn_blocking(move || write_artifacts(&written, roster.as_ref(), &artifacts))
        .await
        .context("Artifact writer task failed")??;

    log_summary(&summary);
    Ok(summary)
}

/// Writes the item analysis, the scores export and the JSON results, each
/// with retries.
fn write_artifacts(
    summary: &BatchSummary,
    roster: Option<&Roster>,
    ctx: &RunContext,
) -> Result<()> {
    let config = ctx.config();
    let paths = ctx.paths();
    let retry = |what: &str, op: &dyn Fn() -> Result<()>| {
        retry_with_backoff(what, config.retries(), config.retry_delay(), op)
    };

    let summary_path = paths.summary_path();
    retry("Writing the item analysis", &|| {
        write_item_analysis(&summary.analysis, &summary_path)
    })?;

    let rows = summary.score_rows(roster);
    let scores_path = paths.scores_path();
    retry("Writing scores", &|| write_scores(&rows, &scores_path))?;

    let json_path = paths.results_json_path();
    retry("Writing results", &|| write_json(summary, &json_path))?;

    tracing::info!(
        "Wrote {}, {} and {}",
        summary_path.display(),
        scores_path.display(),
        json_path.display()
    );
    Ok(())
}

/// Logs graded and skipped counts, with the reason of every skip.
fn log_summary(summary: &BatchSummary) {
    tracing::info!(
        "{} graded, {} skipped",
        summary.results.len().to_string().green(),
        summary.skipped.len().to_string().yellow()
    );
    for skip in &summary.skipped {
        tracing::warn!("{} skipped: {}", skip.student.folder, skip.reason);
    }
    for graded in summary.results.iter().filter(|g| g.feedback.is_none()) {
        tracing::warn!("{}: feedback copy could not be written", graded.student.folder);
    }
}
