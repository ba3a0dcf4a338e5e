#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use bon::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use super::diff::{CellOutcome, CellVerdict};
use crate::{config::EmptyKeyPolicy, types::CellRef};

/// How many graded cells fell into each verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    /// Cells matching the key.
    pub correct:       usize,
    /// Cells whose value differs but whose result checks out.
    pub wrong_value:   usize,
    /// Cells with a wrong or hard-coded result.
    pub wrong_formula: usize,
    /// Cells left empty.
    pub blank:         usize,
}

impl VerdictCounts {
    /// Tallies a list of outcomes.
    pub fn tally(outcomes: &[CellOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut counts, outcome| {
            match outcome.verdict {
                CellVerdict::Correct => counts.correct += 1,
                CellVerdict::WrongValue => counts.wrong_value += 1,
                CellVerdict::WrongFormula => counts.wrong_formula += 1,
                CellVerdict::Blank => counts.blank += 1,
            }
            counts
        })
    }

    /// Cells that cost points.
    pub fn wrong(&self) -> usize {
        self.wrong_formula + self.blank
    }

    /// All graded cells.
    pub fn total(&self) -> usize {
        self.correct + self.wrong_value + self.wrong_formula + self.blank
    }
}

impl Display for VerdictCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} correct, {} wrong value, {} wrong formula, {} blank",
            self.correct, self.wrong_value, self.wrong_formula, self.blank
        )
    }
}

/// Turns the wrong count into a 0-100 percentage, rounding half to even.
///
/// With nothing graded the score comes from `policy`.
pub fn score_percent(wrong: usize, total: usize, policy: EmptyKeyPolicy) -> u8 {
    if total == 0 {
        return policy.score();
    }
    let percent = 100.0 - (wrong as f64 / total as f64) * 100.0;
    percent.round_ties_even().clamp(0.0, 100.0) as u8
}

/// The graded outcome of one submission.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(on(String, into))]
pub struct SubmissionResult {
    /// Who submitted.
    pub student:  String,
    /// Verdict of every graded cell, in key order.
    #[builder(default)]
    pub outcomes: Vec<CellOutcome>,
    /// Verdict tallies.
    pub counts:   VerdictCounts,
    /// Score, 0 to 100.
    pub score:    u8,
}

impl SubmissionResult {
    /// Coordinates of cells with the given verdict, in key order.
    pub fn cells_with(&self, verdict: CellVerdict) -> Vec<CellRef> {
        self.outcomes
            .iter()
            .filter(|o| o.verdict == verdict)
            .map(|o| o.graded.cell)
            .collect()
    }

    /// Coordinates of cells that cost points, in key order.
    pub fn wrong_cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        self.outcomes
            .iter()
            .filter(|o| o.verdict.is_wrong())
            .map(|o| o.graded.cell)
    }

    /// Number of graded cells.
    pub fn out_of(&self) -> usize {
        self.outcomes.len()
    }
}

/// Reduces a submission's outcomes to a result.
pub fn score(
    student: impl Into<String>,
    outcomes: Vec<CellOutcome>,
    policy: EmptyKeyPolicy,
) -> SubmissionResult {
    let counts = VerdictCounts::tally(&outcomes);
    SubmissionResult::builder()
        .student(student)
        .score(score_percent(counts.wrong(), counts.total(), policy))
        .counts(counts)
        .outcomes(outcomes)
        .build()
}

/// A row of the batch overview table.
#[derive(Tabled, Clone, Debug)]
pub struct GradeRow {
    /// Who submitted.
    #[tabled(rename = "Student")]
    pub(crate) student: String,
    /// Percentage, or `-` when skipped.
    #[tabled(rename = "Score")]
    pub(crate) score:   String,
    /// Verdict counts or the reason for skipping.
    #[tabled(rename = "Details")]
    pub(crate) details: String,
}

impl From<&SubmissionResult> for GradeRow {
    fn from(result: &SubmissionResult) -> Self {
        let missed = result
            .wrong_cells()
            .map(|cell| cell.to_string())
            .join(", ");
        let details = if missed.is_empty() {
            result.counts.to_string()
        } else {
            format!("{} (missed {missed})", result.counts)
        };
        Self {
            student: result.student.clone(),
            score: format!("{}/100", result.score),
            details,
        }
    }
}
