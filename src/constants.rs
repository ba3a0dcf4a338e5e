#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

/// Fill color (ARGB) that marks a graded cell in the answer key.
pub const DEFAULT_MARKER_COLOR: &str = "FFD9E1F2";

/// Fill color (RGB) applied to cells a student got wrong.
pub const HIGHLIGHT_COLOR: u32 = 0xFF_FF00;

/// Conditional-format fill (RGB) shown when a student's answer matches the key.
pub const CORRECT_FILL: u32 = 0xC6_EFCE;

/// Conditional-format fill (RGB) shown when a student's answer differs from the
/// key.
pub const INCORRECT_FILL: u32 = 0xFF_C7CE;

/// Number of decimal digits numeric values are rounded to before comparison.
pub const NUMERIC_PRECISION: i32 = 5;

/// Row offset, relative to a graded cell, of the value checked by the formula
/// check.
pub const DEFAULT_NUMERIC_OFFSET: i64 = -1;

/// Name of the hidden sheet holding key values inside generated assignments.
pub const KEY_DATA_SHEET: &str = "KeyData";

/// Name of the sheet appended to every feedback copy.
pub const GRADE_REPORT_SHEET: &str = "grade report";

/// Name of the sheet in the cohort summary workbook.
pub const ITEM_ANALYSIS_SHEET: &str = "Item Analysis";

/// Sheet read from `.xlsx` rosters.
pub const ROSTER_SHEET: &str = "Grades";

/// Prefix of the lock files spreadsheet editors leave next to open workbooks.
pub const LOCK_FILE_PREFIX: &str = "~$";

/// Author used for correction notes when no instructor name is configured.
pub const DEFAULT_INSTRUCTOR: &str = "Instructor";

/// Attempts made for an output write before giving up on that file.
pub const WRITE_RETRIES: u32 = 5;

/// Delay before the first retry; doubles on every further attempt.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// How many folders deep submissions are searched for.
pub const SUBMISSION_SEARCH_DEPTH: i8 = 4;

/// File name of the item-analysis workbook.
pub const SUMMARY_FILE: &str = "results_summary.xlsx";

/// File name of the per-student scores export.
pub const SCORES_FILE: &str = "Scores.csv";

/// File name of the machine readable batch results.
pub const RESULTS_JSON_FILE: &str = "results.json";

/// Directory (under the output directory) holding annotated feedback copies.
pub const FEEDBACK_DIR: &str = "feedback";
