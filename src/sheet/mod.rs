#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! In-memory workbook model plus the `.xlsx` reader and writer behind it.

/// Raw OOXML part parsing (fills, comments, sheet relationships).
mod ooxml;
/// Loading workbooks from disk.
pub mod reader;
/// Typed cell values.
pub mod value;
/// Saving workbooks to disk.
pub mod writer;

use std::{collections::BTreeMap, path::PathBuf};

use thiserror::Error;

pub use reader::{open_for_read, open_for_write, open_workbook};
pub use value::{CellValue, round_to};
pub use writer::{EditableSheet, save_workbook};

use crate::types::CellRef;

/// Errors raised by the workbook adapter.
#[derive(Error, Debug)]
pub enum SheetError {
    /// The requested sheet does not exist in the workbook.
    #[error("Sheet `{sheet}` not found in {}", path.display())]
    MissingSheet {
        /// Workbook that was searched.
        path:  PathBuf,
        /// Sheet that was requested.
        sheet: String,
    },
    /// The workbook could not be opened or parsed.
    #[error("Could not read workbook {}", path.display())]
    Open {
        /// Workbook that failed to open.
        path:   PathBuf,
        /// Underlying parser error.
        #[source]
        source: calamine::XlsxError,
    },
    /// A part inside the `.xlsx` container could not be read.
    #[error("Could not read `{part}` in {}", path.display())]
    Part {
        /// Workbook the part belongs to.
        path:   PathBuf,
        /// Name of the part inside the zip container.
        part:   String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The workbook container is not a valid zip archive.
    #[error("{} is not a valid .xlsx container", path.display())]
    Container {
        /// Offending file.
        path:   PathBuf,
        /// Underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },
    /// Writing the workbook failed.
    #[error(transparent)]
    Write(#[from] rust_xlsxwriter::XlsxError),
}

/// A note attached to a cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Annotation {
    /// Note body.
    pub text:   String,
    /// Author shown by the spreadsheet application.
    pub author: Option<String>,
}

impl Annotation {
    /// Creates a note without an author.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text:   text.into(),
            author: None,
        }
    }

    /// Sets the note's author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Everything known about one cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetCell {
    /// Raw value; formula text for formula cells.
    pub value:      CellValue,
    /// Displayed value; the cached result for formula cells.
    pub cached:     CellValue,
    /// Fill color as stored in the workbook (ARGB hex), if any.
    pub fill:       Option<String>,
    /// Number format code (`0.00%`, `"$"#,##0.00`); `None` for General.
    pub num_format: Option<String>,
    /// Attached note, if any.
    pub note:       Option<Annotation>,
    /// Whether the cell stays editable once the sheet is protected.
    pub unlocked:   bool,
}

impl SheetCell {
    /// A plain value cell whose displayed value equals its raw value.
    pub fn from_value(value: CellValue) -> Self {
        Self {
            cached: value.clone(),
            value,
            ..Self::default()
        }
    }

    /// A formula cell with its cached result.
    pub fn formula(formula: impl Into<String>, cached: CellValue) -> Self {
        let mut text = formula.into();
        if !text.starts_with('=') {
            text.insert(0, '=');
        }
        Self {
            value: CellValue::Text(text),
            cached,
            ..Self::default()
        }
    }

    /// Sets the fill color.
    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    /// Attaches a note.
    pub fn with_note(mut self, note: Annotation) -> Self {
        self.note = Some(note);
        self
    }
}

/// A formula-driven fill applied to a single cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalFill {
    /// Cell the rule applies to.
    pub cell:    CellRef,
    /// Rule formula, e.g. `=B2=KeyData!B2`.
    pub formula: String,
    /// RGB fill shown while the rule holds.
    pub fill:    u32,
}

/// One sheet of a workbook: sparse cells keyed by coordinate, plus sheet
/// level settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    /// Sheet name.
    name:        String,
    /// Cells in row-major order.
    cells:       BTreeMap<CellRef, SheetCell>,
    /// Whether the sheet is protected when saved.
    protected:   bool,
    /// Whether the sheet is hidden when saved.
    hidden:      bool,
    /// Conditional fills written with the sheet.
    conditional: Vec<ConditionalFill>,
}

/// Shared empty value returned for absent cells.
static EMPTY: CellValue = CellValue::Empty;

impl Grid {
    /// Creates an empty sheet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sheet name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the sheet.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns the cell at `cell`, if anything is stored there.
    pub fn cell_at(&self, cell: CellRef) -> Option<&SheetCell> {
        self.cells.get(&cell)
    }

    /// Returns the cell at `cell`, creating an empty one if needed.
    pub fn cell_mut(&mut self, cell: CellRef) -> &mut SheetCell {
        self.cells.entry(cell).or_default()
    }

    /// Raw value at `cell`; `Empty` when nothing is stored.
    pub fn value_at(&self, cell: CellRef) -> &CellValue {
        self.cells.get(&cell).map(|c| &c.value).unwrap_or(&EMPTY)
    }

    /// Numeric coercion of the displayed value at `cell`.
    pub fn numeric_at(&self, cell: CellRef) -> Option<f64> {
        self.cells.get(&cell).and_then(|c| c.cached.as_number())
    }

    /// Stores a cell, replacing whatever was there.
    pub fn insert(&mut self, cell: CellRef, entry: SheetCell) {
        self.cells.insert(cell, entry);
    }

    /// Builder-style variant of [`Grid::insert`].
    pub fn with_cell(mut self, cell: CellRef, entry: SheetCell) -> Self {
        self.insert(cell, entry);
        self
    }

    /// Iterates over stored cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &SheetCell)> {
        self.cells.iter().map(|(k, v)| (*k, v))
    }

    /// Number of stored cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` when no cell is stored.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Fills `cell` with an RGB highlight.
    pub fn set_highlight(&mut self, cell: CellRef, rgb: u32) {
        self.cell_mut(cell).fill = Some(format!("FF{rgb:06X}"));
    }

    /// Attaches (or replaces) the note on `cell`.
    pub fn set_annotation(&mut self, cell: CellRef, note: Annotation) {
        self.cell_mut(cell).note = Some(note);
    }

    /// Whether the sheet is protected when saved.
    pub fn is_protected(&self) -> bool {
        self.protected
    }

    /// Protects (or unprotects) the sheet.
    pub fn set_protected(&mut self, protected: bool) {
        self.protected = protected;
    }

    /// Whether the sheet is hidden when saved.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Hides (or shows) the sheet.
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    /// Conditional fills written with the sheet.
    pub fn conditional_fills(&self) -> &[ConditionalFill] {
        &self.conditional
    }

    /// Adds a conditional fill.
    pub fn add_conditional_fill(&mut self, rule: ConditionalFill) {
        self.conditional.push(rule);
    }
}

/// An ordered collection of sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    /// Sheets in tab order.
    sheets: Vec<Grid>,
}

impl Workbook {
    /// Creates an empty workbook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sheets in tab order.
    pub fn sheets(&self) -> &[Grid] {
        &self.sheets
    }

    /// Sheets in tab order, mutably.
    pub fn sheets_mut(&mut self) -> &mut [Grid] {
        &mut self.sheets
    }

    /// Tab index of the sheet called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name == name)
    }

    /// Sheet names in tab order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Grid::name).collect()
    }

    /// Looks a sheet up by name.
    pub fn sheet(&self, name: &str) -> Option<&Grid> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Looks a sheet up by name, mutably.
    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Grid> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Appends a sheet.
    pub fn push_sheet(&mut self, sheet: Grid) {
        self.sheets.push(sheet);
    }

    /// Removes and returns the sheet called `name`.
    pub fn remove_sheet(&mut self, name: &str) -> Option<Grid> {
        let index = self.position(name)?;
        Some(self.sheets.remove(index))
    }
}
