#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use bon::Builder;

use crate::{
    constants::{CORRECT_FILL, INCORRECT_FILL, KEY_DATA_SHEET},
    sheet::{CellValue, ConditionalFill, Grid, SheetCell, Workbook, open_workbook, save_workbook},
    types::MarkerColor,
};

/// Settings for producing student copies of an answer key.
#[derive(Debug, Clone, Builder)]
#[builder(on(String, into), on(PathBuf, into))]
pub struct GenerateOptions {
    /// Answer key workbook.
    key:              PathBuf,
    /// Sheet holding the graded cells.
    sheet:            String,
    /// Directory receiving the copies.
    out_dir:          PathBuf,
    /// Number of copies to write.
    #[builder(default = 1)]
    copies:           usize,
    /// Fill color that marks graded cells.
    #[builder(default)]
    marker:           MarkerColor,
    /// Whether graded cells turn green or red as students type.
    #[builder(default = true)]
    instant_feedback: bool,
}

/// Turns a key workbook into a student copy.
///
/// Graded cells on `sheet` are cleared and left unlocked, every other cell is
/// locked and the sheet protected. The sheet's values are kept on a hidden
/// `KeyData` sheet, which the optional conditional fills compare against.
pub fn create_assignment(
    mut workbook: Workbook,
    sheet: &str,
    marker: &MarkerColor,
    instant_feedback: bool,
) -> Result<Workbook> {
    workbook.remove_sheet(KEY_DATA_SHEET);
    let target = workbook
        .sheet_mut(sheet)
        .with_context(|| format!("Sheet `{sheet}` not found"))?;

    let mut key_data = Grid::new(KEY_DATA_SHEET);
    key_data.set_hidden(true);

    let cells: Vec<_> = target.cells().map(|(cell, entry)| (cell, entry.clone())).collect();
    for (cell, entry) in cells {
        key_data.insert(
            cell,
            SheetCell {
                value: entry.value.clone(),
                cached: entry.cached.clone(),
                ..SheetCell::default()
            },
        );

        let graded = entry.fill.as_deref().is_some_and(|fill| marker.matches(fill));
        let slot = target.cell_mut(cell);
        if graded {
            slot.value = CellValue::Empty;
            slot.cached = CellValue::Empty;
            slot.note = None;
            slot.unlocked = true;

            if instant_feedback {
                let reference = format!("{KEY_DATA_SHEET}!{cell}");
                target.add_conditional_fill(ConditionalFill {
                    cell,
                    formula: format!("={cell}={reference}"),
                    fill: CORRECT_FILL,
                });
                target.add_conditional_fill(ConditionalFill {
                    cell,
                    formula: format!("=AND({cell}<>\"\",{cell}<>{reference})"),
                    fill: INCORRECT_FILL,
                });
            }
        } else {
            slot.unlocked = false;
        }
    }
    target.set_protected(true);

    workbook.push_sheet(key_data);
    Ok(workbook)
}

/// Writes `Assignment_01.xlsx` ... into the output directory and returns
/// the written paths.
///
/// Falls back to the first sheet when the key lacks the requested one.
pub fn generate_assignments(options: &GenerateOptions) -> Result<Vec<PathBuf>> {
    ensure!(options.copies >= 1, "At least one copy must be generated");

    let workbook = open_workbook(&options.key)
        .with_context(|| format!("Could not read the key {}", options.key.display()))?;
    let sheet = if workbook.sheet(&options.sheet).is_some() {
        options.sheet.clone()
    } else {
        let fallback = workbook
            .sheet_names()
            .first()
            .map(|name| name.to_string())
            .context("The key workbook has no sheets")?;
        tracing::warn!("Sheet `{}` not found, using `{fallback}`", options.sheet);
        fallback
    };

    let assignment =
        create_assignment(workbook, &sheet, &options.marker, options.instant_feedback)?;
    std::fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("Could not create {}", options.out_dir.display()))?;

    let mut written = Vec::with_capacity(options.copies);
    for i in 1..=options.copies {
        let path = options.out_dir.join(format!("Assignment_{i:02}.xlsx"));
        save_workbook(&assignment, &path)
            .with_context(|| format!("Could not save {}", path.display()))?;
        tracing::info!("Assignment saved and locked: {}", path.display());
        written.push(path);
    }

    Ok(written)
}
