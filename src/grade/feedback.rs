#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use itertools::Itertools;

use super::{diff::CellVerdict, results::SubmissionResult};
use crate::{
    config::GradingConfig,
    constants::GRADE_REPORT_SHEET,
    sheet::{Annotation, CellValue, EditableSheet, Grid, SheetCell, SheetError, open_for_write},
    types::CellRef,
    util::{retry_with_backoff, strip_xlfn},
};

/// Highlights every cell that is not correct and attaches the key's answer to
/// it.
pub fn annotate(sheet: &mut EditableSheet, result: &SubmissionResult, config: &GradingConfig) {
    for outcome in result.outcomes.iter().filter(|o| o.verdict != CellVerdict::Correct) {
        let cell = outcome.graded.cell;
        let text = strip_xlfn(&format!("Correct: {}", outcome.graded.expected_literal));
        sheet.set_highlight(cell, config.highlight());
        sheet.set_annotation(cell, Annotation::new(text).with_author(config.instructor()));
    }
}

/// Joins cell references with commas.
fn cell_list(cells: &[CellRef]) -> String {
    cells.iter().map(CellRef::to_string).join(",")
}

/// Builds the `grade report` sheet summarizing a result.
pub fn grade_report(result: &SubmissionResult) -> Grid {
    let text = |s: String| SheetCell::from_value(CellValue::Text(s));
    let number = |n: usize| SheetCell::from_value(CellValue::Number(n as f64));

    let rows = [
        text("GRADE SUMMARY".into()),
        text("Incorrect formulas:".into()),
        text(cell_list(&result.cells_with(CellVerdict::WrongFormula))),
        text("Empty cells:".into()),
        text(cell_list(&result.cells_with(CellVerdict::Blank))),
        text("Total incorrect:".into()),
        number(result.counts.wrong()),
        text("Out of:".into()),
        number(result.out_of()),
        text("Score (%):".into()),
        number(usize::from(result.score)),
    ];

    rows.into_iter()
        .enumerate()
        .filter(|(_, cell)| !cell.value.is_blank())
        .fold(Grid::new(GRADE_REPORT_SHEET), |grid, (row, cell)| {
            grid.with_cell(CellRef::new(row as u32, 0), cell)
        })
}

/// Writes the annotated copy of `submission` to `target`.
///
/// The copy carries every sheet of the submission, the highlights and notes
/// on the graded sheet, and a fresh `grade report` sheet. Saving is retried
/// with backoff.
pub fn write_feedback(
    submission: &Path,
    target: &Path,
    result: &SubmissionResult,
    config: &GradingConfig,
) -> Result<(), SheetError> {
    let mut sheet = open_for_write(submission, config.sheet())?;
    annotate(&mut sheet, result, config);

    let workbook = sheet.workbook_mut();
    workbook.remove_sheet(GRADE_REPORT_SHEET);
    workbook.push_sheet(grade_report(result));

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SheetError::Part {
            path: target.to_path_buf(),
            part: parent.display().to_string(),
            source,
        })?;
    }

    let what = format!("Saving {}", target.display());
    retry_with_backoff(&what, config.retries(), config.retry_delay(), || sheet.save(target))
}
