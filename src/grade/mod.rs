#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Per-student item counts and the score distribution.
pub mod cohort;
/// Cell classification against the key.
pub mod diff;
/// Annotated feedback copies.
pub mod feedback;
/// Answer key extraction.
pub mod key;
/// Summary workbook, scores export and overview tables.
pub mod report;
/// Scoring and result types.
pub mod results;

pub use cohort::{CohortReport, ItemAnalysis, ItemCount, ScoreBucket};
pub use diff::{CellOutcome, CellVerdict, SubmissionGrid, classify, classify_cell};
pub use feedback::{annotate, grade_report, write_feedback};
pub use key::{AnswerKey, GradedCell, KeyRow, extract_key, load_key, parse_alternates};
pub use report::{
    ScoreRow, item_table, key_table, overview_table, write_item_analysis, write_json, write_scores,
};
pub use results::{GradeRow, SubmissionResult, VerdictCounts, score, score_percent};
