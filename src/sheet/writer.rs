#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use rust_xlsxwriter::{
    Color, ConditionalFormatFormula, Format, FormatPattern, Formula, Note,
    Workbook as XlsxWorkbook, Worksheet,
};

use super::{Annotation, CellValue, Grid, SheetCell, SheetError, Workbook, value::to_excel_serial};
use crate::types::CellRef;

/// A loaded workbook with one sheet selected for editing.
#[derive(Debug, Clone)]
pub struct EditableSheet {
    /// Every sheet of the workbook.
    workbook: Workbook,
    /// Tab index of the edited sheet.
    index:    usize,
}

impl EditableSheet {
    /// Selects `sheet` for editing; `None` if the workbook lacks it.
    pub fn new(workbook: Workbook, sheet: &str) -> Option<Self> {
        let index = workbook.position(sheet)?;
        Some(Self { workbook, index })
    }

    /// The edited sheet.
    pub fn grid(&self) -> &Grid {
        &self.workbook.sheets()[self.index]
    }

    /// The edited sheet, mutably.
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.workbook.sheets_mut()[self.index]
    }

    /// Fills `cell` of the edited sheet with an RGB highlight.
    pub fn set_highlight(&mut self, cell: CellRef, rgb: u32) {
        self.grid_mut().set_highlight(cell, rgb);
    }

    /// Attaches a note to `cell` of the edited sheet.
    pub fn set_annotation(&mut self, cell: CellRef, note: Annotation) {
        self.grid_mut().set_annotation(cell, note);
    }

    /// The whole workbook.
    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    /// The whole workbook, mutably (to add sheets).
    pub fn workbook_mut(&mut self) -> &mut Workbook {
        &mut self.workbook
    }

    /// Writes the workbook to `path`.
    pub fn save(&self, path: &Path) -> Result<(), SheetError> {
        save_workbook(&self.workbook, path)
    }
}

/// Writes every sheet of `workbook` to `path` as `.xlsx`.
pub fn save_workbook(workbook: &Workbook, path: &Path) -> Result<(), SheetError> {
    let mut book = XlsxWorkbook::new();

    for grid in workbook.sheets() {
        let worksheet = book.add_worksheet().set_name(grid.name())?;
        write_grid(worksheet, grid)?;
    }

    book.save(path)?;
    Ok(())
}

/// Parses the RGB part of an ARGB (or RGB) hex fill.
fn fill_rgb(fill: &str) -> Option<u32> {
    let hex = fill.trim().trim_start_matches('#');
    let rgb = if hex.len() == 8 { hex.get(2..)? } else { hex };
    u32::from_str_radix(rgb, 16).ok().filter(|_| rgb.len() == 6)
}

/// Builds the cell format carrying a cell's fill, number format and lock
/// state.
fn cell_format(cell: &SheetCell) -> Format {
    let mut format = Format::new();
    if let Some(rgb) = cell.fill.as_deref().and_then(fill_rgb) {
        format = format
            .set_pattern(FormatPattern::Solid)
            .set_background_color(Color::RGB(rgb));
    }
    if cell.unlocked {
        format = format.set_unlocked();
    }
    if let Some(code) = cell.num_format.as_deref() {
        format = format.set_num_format(code);
    } else if let CellValue::Date(dt) = &cell.value {
        let pattern = if dt.time() == chrono::NaiveTime::MIN {
            "yyyy-mm-dd"
        } else {
            "yyyy-mm-dd hh:mm:ss"
        };
        format = format.set_num_format(pattern);
    }
    format
}

/// Writes one sheet's cells, notes and sheet settings.
fn write_grid(worksheet: &mut Worksheet, grid: &Grid) -> Result<(), SheetError> {
    for (cell, entry) in grid.cells() {
        let (row, col) = (cell.row, cell.col);
        let format = cell_format(entry);

        match &entry.value {
            CellValue::Text(text) if entry.value.is_formula() => {
                let formula = Formula::new(text).set_result(entry.cached.to_string());
                worksheet.write_formula_with_format(row, col, formula, &format)?;
            }
            CellValue::Text(text) => {
                worksheet.write_string_with_format(row, col, text, &format)?;
            }
            CellValue::Number(n) => {
                worksheet.write_number_with_format(row, col, *n, &format)?;
            }
            CellValue::Boolean(b) => {
                worksheet.write_boolean_with_format(row, col, *b, &format)?;
            }
            CellValue::Date(dt) => {
                worksheet.write_number_with_format(row, col, to_excel_serial(dt), &format)?;
            }
            CellValue::Empty => {
                worksheet.write_blank(row, col, &format)?;
            }
        }

        if let Some(note) = &entry.note {
            let mut xlsx_note = Note::new(&note.text).add_author_prefix(false);
            if let Some(author) = &note.author {
                xlsx_note = xlsx_note.set_author(author);
            }
            worksheet.insert_note(row, col, &xlsx_note)?;
        }
    }

    for rule in grid.conditional_fills() {
        let format = Format::new().set_background_color(Color::RGB(rule.fill));
        let conditional = ConditionalFormatFormula::new()
            .set_rule(rule.formula.as_str())
            .set_format(format);
        let (row, col) = (rule.cell.row, rule.cell.col);
        worksheet.add_conditional_format(row, col, row, col, &conditional)?;
    }

    if grid.is_protected() {
        worksheet.protect();
    }
    if grid.is_hidden() {
        worksheet.set_hidden(true);
    }

    Ok(())
}
