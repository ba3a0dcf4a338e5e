#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Chart, ChartType, Format, Workbook as XlsxWorkbook};
use serde::{Deserialize, Serialize};
use tabled::{
    Table,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};

use super::{
    cohort::{ItemAnalysis, ItemCount},
    key::{AnswerKey, KeyRow},
    results::GradeRow,
};
use crate::constants::ITEM_ANALYSIS_SHEET;

/// One line of `Scores.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    /// Student's first name.
    #[serde(rename = "First Name")]
    pub first_name: String,
    /// Student's last name.
    #[serde(rename = "Last Name")]
    pub last_name:  String,
    /// Submission folder the name came from.
    #[serde(rename = "Folder")]
    pub folder:     String,
    /// Score, 0 for skipped submissions.
    #[serde(rename = "Score")]
    pub score:      u8,
    /// Email from the roster, if matched.
    #[serde(rename = "Email")]
    pub email:      Option<String>,
    /// Student id from the roster, if matched.
    #[serde(rename = "Student ID")]
    pub student_id: Option<String>,
}

/// Writes the item-analysis workbook: per-cell wrong counts, the score
/// distribution below them and a column chart of the distribution.
pub fn write_item_analysis(analysis: &ItemAnalysis, path: &Path) -> Result<()> {
    let mut book = XlsxWorkbook::new();
    let sheet = book.add_worksheet().set_name(ITEM_ANALYSIS_SHEET)?;
    let bold = Format::new().set_bold();

    sheet.write_string_with_format(0, 0, "Cell", &bold)?;
    sheet.write_string_with_format(0, 1, "Incorrect Count", &bold)?;
    for (i, ItemCount { cell, wrong }) in analysis.items.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, cell.to_string())?;
        sheet.write_number(row, 1, *wrong as f64)?;
    }

    // one blank row after the table
    let start = analysis.items.len() as u32 + 2;
    sheet.write_string_with_format(start, 0, "SCORE SUMMARY", &bold)?;
    sheet.write_string_with_format(start + 1, 0, "Score Range", &bold)?;
    sheet.write_string_with_format(start + 1, 1, "Count", &bold)?;
    for (i, (bucket, count)) in analysis.distribution.iter().enumerate() {
        let row = start + 2 + i as u32;
        sheet.write_string(row, 0, bucket.label())?;
        sheet.write_number(row, 1, *count as f64)?;
    }
    sheet.set_column_width(0, 16)?;
    sheet.set_column_width(1, 16)?;

    let first = start + 2;
    let last = first + analysis.distribution.len().saturating_sub(1) as u32;
    let mut chart = Chart::new(ChartType::Column);
    chart.title().set_name("Score Range Distribution");
    chart.x_axis().set_name("Score Range");
    chart.y_axis().set_name("Number of Students");
    chart.legend().set_hidden();
    chart
        .add_series()
        .set_categories((ITEM_ANALYSIS_SHEET, first, 0, last, 0))
        .set_values((ITEM_ANALYSIS_SHEET, first, 1, last, 1));
    sheet.insert_chart(start + 1, 3, &chart)?;

    book.save(path)
        .with_context(|| format!("Could not save {}", path.display()))?;
    Ok(())
}

/// Writes `Scores.csv`.
pub fn write_scores(rows: &[ScoreRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Could not create {}", path.display()))?;
    for row in rows {
        writer.serialize(row).context("Could not write score row")?;
    }
    writer.flush().context("Could not flush scores")?;
    Ok(())
}

/// Writes any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Could not serialize results")?;
    std::fs::write(path, json).with_context(|| format!("Could not write {}", path.display()))
}

/// Renders the batch overview table.
pub fn overview_table(rows: &[GradeRow], graded: usize, skipped: usize) -> String {
    Table::new(rows)
        .with(Panel::header("Grading Overview"))
        .with(Panel::footer(format!("Graded: {graded}, skipped: {skipped}")))
        .with(Modify::new(Rows::new(1..)).with(Width::wrap(48).keep_words(true)))
        .with(
            Modify::new(Rows::first())
                .with(Alignment::center())
                .with(Alignment::center_vertical()),
        )
        .with(
            Modify::new(Rows::last())
                .with(Alignment::center())
                .with(Alignment::center_vertical()),
        )
        .with(Style::modern())
        .to_string()
}

/// Renders the item analysis as a table.
pub fn item_table(analysis: &ItemAnalysis) -> String {
    Table::new(&analysis.items)
        .with(Panel::header("Item Analysis"))
        .with(
            Modify::new(Rows::first())
                .with(Alignment::center())
                .with(Alignment::center_vertical()),
        )
        .with(Style::modern())
        .to_string()
}

/// Renders an answer key as a table.
pub fn key_table(key: &AnswerKey) -> String {
    let rows: Vec<KeyRow> = key.iter().map(KeyRow::from).collect();
    Table::new(&rows)
        .with(Panel::header(format!("Answer Key ({} graded cells)", key.len())))
        .with(Modify::new(Rows::new(1..)).with(Width::wrap(32).keep_words(true)))
        .with(
            Modify::new(Rows::first())
                .with(Alignment::center())
                .with(Alignment::center_vertical()),
        )
        .with(Style::modern())
        .to_string()
}
