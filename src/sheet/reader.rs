#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

use calamine::{Reader, Xlsx};
use zip::ZipArchive;

use super::{
    Annotation, CellValue, EditableSheet, Grid, SheetCell, SheetError, Workbook,
    ooxml::{
        CellStyle, comments_path, parse_cell_styles, parse_comments, parse_sheet_details,
        parse_workbook_sheets, read_optional_zip_file, read_zip_file, rels_path_for,
        worksheet_path,
    },
};
use crate::types::CellRef;

/// Sheet level details that live outside the cell values.
#[derive(Debug, Default)]
struct SheetExtras {
    /// Sheet is hidden.
    hidden:    bool,
    /// Sheet carries `<sheetProtection>`.
    protected: bool,
    /// Resolved style of every styled cell.
    styles:    Vec<(CellRef, CellStyle)>,
    /// Notes attached to cells.
    notes:     Vec<(CellRef, Annotation)>,
}

/// Opens every sheet of a workbook.
pub fn open_workbook(path: &Path) -> Result<Workbook, SheetError> {
    load(path, None)
}

/// Opens a single sheet for reading.
///
/// Fails with [`SheetError::MissingSheet`] when the workbook has no sheet
/// called `sheet`.
pub fn open_for_read(path: &Path, sheet: &str) -> Result<Grid, SheetError> {
    let mut workbook = load(path, Some(sheet))?;
    workbook.remove_sheet(sheet).ok_or_else(|| SheetError::MissingSheet {
        path:  path.to_path_buf(),
        sheet: sheet.to_string(),
    })
}

/// Opens a whole workbook for editing `sheet`.
///
/// Every sheet is loaded so the saved copy carries them all over.
pub fn open_for_write(path: &Path, sheet: &str) -> Result<EditableSheet, SheetError> {
    let workbook = load(path, None)?;
    EditableSheet::new(workbook, sheet).ok_or_else(|| SheetError::MissingSheet {
        path:  path.to_path_buf(),
        sheet: sheet.to_string(),
    })
}

/// Loads the requested sheets (all when `only` is `None`).
fn load(path: &Path, only: Option<&str>) -> Result<Workbook, SheetError> {
    let open_error = |source: calamine::XlsxError| SheetError::Open {
        path: path.to_path_buf(),
        source,
    };
    let mut values: Xlsx<BufReader<File>> = calamine::open_workbook(path).map_err(open_error)?;

    let names = values.sheet_names();
    if let Some(sheet) = only.filter(|sheet| !names.iter().any(|n| n == *sheet)) {
        return Err(SheetError::MissingSheet {
            path:  path.to_path_buf(),
            sheet: sheet.to_string(),
        });
    }

    let mut extras = read_extras(path)?;
    let mut workbook = Workbook::new();
    for name in names {
        if only.is_some_and(|sheet| sheet != name) {
            continue;
        }
        let mut grid = Grid::new(name.as_str());
        read_cells(&mut values, &mut grid).map_err(open_error)?;
        if let Some(extra) = extras.remove(&name) {
            apply_extras(&mut grid, extra);
        }
        workbook.push_sheet(grid);
    }

    Ok(workbook)
}

/// Converts a position relative to a range start into a coordinate.
fn absolute(start: (u32, u32), row: usize, col: usize) -> Option<CellRef> {
    let row = u32::try_from(row).ok()?.checked_add(start.0)?;
    let col = u32::try_from(col).ok()?.checked_add(start.1)?;
    Some(CellRef::new(row, u16::try_from(col).ok()?))
}

/// Fills `grid` with the values and formulas of the sheet of the same name.
fn read_cells(
    values: &mut Xlsx<BufReader<File>>,
    grid: &mut Grid,
) -> Result<(), calamine::XlsxError> {
    let range = values.worksheet_range(grid.name())?;
    if let Some(start) = range.start() {
        for (row, col, data) in range.used_cells() {
            if let Some(cell) = absolute(start, row, col) {
                grid.insert(cell, SheetCell::from_value(CellValue::from(data)));
            }
        }
    }

    let formulas = values.worksheet_formula(grid.name())?;
    if let Some(start) = formulas.start() {
        for (row, col, formula) in formulas.used_cells() {
            if formula.trim().is_empty() {
                continue;
            }
            if let Some(cell) = absolute(start, row, col) {
                let text = if formula.starts_with('=') {
                    formula.clone()
                } else {
                    format!("={formula}")
                };
                grid.cell_mut(cell).value = CellValue::Text(text);
            }
        }
    }

    Ok(())
}

/// Merges fills, number formats, protection and notes into a loaded grid.
fn apply_extras(grid: &mut Grid, extras: SheetExtras) {
    grid.set_hidden(extras.hidden);
    grid.set_protected(extras.protected);
    for (cell, style) in extras.styles {
        if style.is_plain() {
            continue;
        }
        let entry = grid.cell_mut(cell);
        entry.fill = style.fill;
        entry.num_format = style.num_format;
        entry.unlocked = style.unlocked;
    }
    for (cell, note) in extras.notes {
        grid.set_annotation(cell, note);
    }
}

/// Reads the styles, notes and sheet flags of every sheet, keyed by sheet
/// name.
fn read_extras(path: &Path) -> Result<HashMap<String, SheetExtras>, SheetError> {
    let container_error = |source: zip::result::ZipError| SheetError::Container {
        path: path.to_path_buf(),
        source,
    };
    let part_error = |part: &str, source: std::io::Error| SheetError::Part {
        path: path.to_path_buf(),
        part: part.to_string(),
        source,
    };

    let file = File::open(path).map_err(|e| container_error(e.into()))?;
    let mut archive = ZipArchive::new(file).map_err(container_error)?;

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml")
        .map_err(|e| part_error("xl/workbook.xml", e))?;
    let workbook_rels = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels")
        .map_err(|e| part_error("xl/_rels/workbook.xml.rels", e))?;
    let styles = read_optional_zip_file(&mut archive, "xl/styles.xml")
        .map(|xml| parse_cell_styles(&xml))
        .unwrap_or_default();

    let mut extras = HashMap::new();
    for entry in parse_workbook_sheets(&workbook_xml) {
        let mut extra = SheetExtras {
            hidden: entry.hidden,
            ..SheetExtras::default()
        };

        let Some(part) = worksheet_path(&workbook_rels, &entry.rid) else {
            extras.insert(entry.name, extra);
            continue;
        };
        if let Some(sheet_xml) = read_optional_zip_file(&mut archive, &part) {
            let details = parse_sheet_details(&sheet_xml);
            extra.protected = details.protected;
            extra.styles = details
                .styles
                .into_iter()
                .filter_map(|(cell, index)| styles.get(index).cloned().map(|s| (cell, s)))
                .collect();
        }

        let comments_part = read_optional_zip_file(&mut archive, &rels_path_for(&part))
            .and_then(|rels| comments_path(&part, &rels));
        if let Some(xml) = comments_part.and_then(|p| read_optional_zip_file(&mut archive, &p)) {
            extra.notes = parse_comments(&xml);
        }

        extras.insert(entry.name, extra);
    }

    Ok(extras)
}
