#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::BTreeSet, path::Path};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::{
    config::GradingConfig,
    constants::NUMERIC_PRECISION,
    sheet::{CellValue, Grid, SheetError, open_for_read, round_to},
    types::{CellRef, MarkerColor},
};

/// One cell of the answer key that every submission is graded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedCell {
    /// Where the cell lives.
    pub cell:                CellRef,
    /// The key's raw value; formula text for formula cells.
    pub expected_literal:    CellValue,
    /// Rounded numeric value found at the configured row offset, if any.
    pub expected_numeric:    Option<f64>,
    /// Text answers accepted in place of the expected literal.
    pub accepted_alternates: BTreeSet<String>,
}

impl GradedCell {
    /// Creates a graded cell with no numeric expectation and no alternates.
    pub fn new(cell: CellRef, expected_literal: CellValue) -> Self {
        Self {
            cell,
            expected_literal,
            expected_numeric: None,
            accepted_alternates: BTreeSet::new(),
        }
    }

    /// Sets the numeric expectation checked by the formula check.
    pub fn with_numeric(mut self, numeric: f64) -> Self {
        self.expected_numeric = Some(numeric);
        self
    }

    /// Adds accepted alternate answers.
    pub fn with_alternates<I, S>(mut self, alternates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_alternates.extend(alternates.into_iter().map(Into::into));
        self
    }
}

/// The ordered, de-duplicated set of graded cells of a key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerKey {
    /// Graded cells in row-major order.
    cells: Vec<GradedCell>,
}

impl AnswerKey {
    /// Builds a key from graded cells, sorting them row-major and keeping the
    /// first entry for any repeated coordinate.
    pub fn new(mut cells: Vec<GradedCell>) -> Self {
        cells.sort_by_key(|c| c.cell);
        cells.dedup_by_key(|c| c.cell);
        Self { cells }
    }

    /// Graded cells in row-major order.
    pub fn cells(&self) -> &[GradedCell] {
        &self.cells
    }

    /// Iterates over the graded cells.
    pub fn iter(&self) -> std::slice::Iter<'_, GradedCell> {
        self.cells.iter()
    }

    /// Number of graded cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` when nothing is graded.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<'a> IntoIterator for &'a AnswerKey {
    type IntoIter = std::slice::Iter<'a, GradedCell>;
    type Item = &'a GradedCell;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}

/// Splits a note into accepted alternates: newlines act as commas, tokens are
/// trimmed and empty tokens dropped.
pub fn parse_alternates(note: &str) -> BTreeSet<String> {
    note.replace("\r\n", "\n")
        .replace('\n', ",")
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

/// Scans `grid` for cells filled with `marker` and turns them into an answer
/// key.
///
/// The numeric expectation of each cell is read `offset` rows away from it and
/// rounded; it is absent when that cell is outside the sheet or not numeric.
pub fn extract_key(grid: &Grid, marker: &MarkerColor, offset: i64) -> AnswerKey {
    let cells = grid
        .cells()
        .filter(|(_, entry)| entry.fill.as_deref().is_some_and(|fill| marker.matches(fill)))
        .map(|(cell, entry)| GradedCell {
            cell,
            expected_literal: entry.value.clone(),
            expected_numeric: cell
                .offset_rows(offset)
                .and_then(|target| grid.numeric_at(target))
                .map(|n| round_to(n, NUMERIC_PRECISION)),
            accepted_alternates: entry
                .note
                .as_ref()
                .map(|note| parse_alternates(&note.text))
                .unwrap_or_default(),
        })
        .collect();

    AnswerKey::new(cells)
}

/// Reads the configured sheet of a key workbook and extracts its answer key.
pub fn load_key(path: &Path, config: &GradingConfig) -> Result<AnswerKey, SheetError> {
    let grid = open_for_read(path, config.sheet())?;
    Ok(extract_key(&grid, config.marker(), config.numeric_offset()))
}

/// One row of the answer key listing.
#[derive(Tabled)]
pub struct KeyRow {
    /// A1 reference.
    #[tabled(rename = "Cell")]
    cell:       String,
    /// Expected literal.
    #[tabled(rename = "Expected")]
    expected:   String,
    /// Numeric expectation, or `-`.
    #[tabled(rename = "Numeric")]
    numeric:    String,
    /// Accepted alternates, comma separated.
    #[tabled(rename = "Alternates")]
    alternates: String,
}

impl From<&GradedCell> for KeyRow {
    fn from(graded: &GradedCell) -> Self {
        Self {
            cell:       graded.cell.to_string(),
            expected:   graded.expected_literal.to_string(),
            numeric:    graded
                .expected_numeric
                .map(|n| CellValue::Number(n).to_string())
                .unwrap_or_else(|| "-".to_string()),
            alternates: graded.accepted_alternates.iter().join(", "),
        }
    }
}
