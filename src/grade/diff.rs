#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use super::key::{AnswerKey, GradedCell};
use crate::{
    constants::NUMERIC_PRECISION,
    sheet::{CellValue, Grid, round_to},
    types::CellRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// The outcome of grading one cell.
pub enum CellVerdict {
    /// Matches the key.
    Correct,
    /// The value differs from the key, but the computed value checks out.
    WrongValue,
    /// The value differs and the computed value does not check out (or was
    /// typed in by hand).
    WrongFormula,
    /// Nothing was entered.
    Blank,
}

impl CellVerdict {
    /// `true` for the verdicts that cost points.
    pub fn is_wrong(self) -> bool {
        matches!(self, CellVerdict::WrongFormula | CellVerdict::Blank)
    }
}

impl fmt::Display for CellVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CellVerdict::Correct => "correct",
            CellVerdict::WrongValue => "wrong value",
            CellVerdict::WrongFormula => "wrong formula",
            CellVerdict::Blank => "blank",
        };
        f.write_str(label)
    }
}

/// A submission's values as seen by the diff engine: raw literals plus the
/// numeric coercion of each displayed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionGrid {
    /// Raw values, formula text for formula cells.
    literals: BTreeMap<CellRef, CellValue>,
    /// Numeric coercion of displayed values; non-numeric cells are absent.
    numerics: BTreeMap<CellRef, f64>,
}

/// Shared empty value returned for absent cells.
static EMPTY: CellValue = CellValue::Empty;

impl SubmissionGrid {
    /// Creates an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the literal of a cell.
    pub fn with_literal(mut self, cell: CellRef, value: CellValue) -> Self {
        self.literals.insert(cell, value);
        self
    }

    /// Sets the numeric (displayed) value of a cell.
    pub fn with_numeric(mut self, cell: CellRef, value: f64) -> Self {
        self.numerics.insert(cell, value);
        self
    }

    /// Raw value at `cell`; `Empty` when absent.
    pub fn literal(&self, cell: CellRef) -> &CellValue {
        self.literals.get(&cell).unwrap_or(&EMPTY)
    }

    /// Numeric value at `cell`, if the displayed value is numeric.
    pub fn numeric(&self, cell: CellRef) -> Option<f64> {
        self.numerics.get(&cell).copied()
    }
}

impl From<&Grid> for SubmissionGrid {
    fn from(grid: &Grid) -> Self {
        let mut literals = BTreeMap::new();
        let mut numerics = BTreeMap::new();
        for (cell, entry) in grid.cells() {
            if entry.value != CellValue::Empty {
                literals.insert(cell, entry.value.clone());
            }
            if let Some(n) = entry.cached.as_number() {
                numerics.insert(cell, n);
            }
        }
        Self { literals, numerics }
    }
}

/// A graded cell together with its verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellOutcome {
    /// The key entry that was checked.
    pub graded:  GradedCell,
    /// What the submission got.
    pub verdict: CellVerdict,
}

/// Classifies one graded cell of a submission.
///
/// A blank answer short-circuits. Otherwise the value check compares the
/// literal (or the expected literal, when the literal is an accepted
/// alternate) with the key, and the formula check compares the rounded
/// numeric value `offset` rows away with the key's numeric expectation, also
/// catching answers typed in as constants. Only a failure of both checks
/// counts as a wrong formula.
pub fn classify_cell(grid: &SubmissionGrid, graded: &GradedCell, offset: i64) -> CellVerdict {
    let literal = grid.literal(graded.cell);
    if literal.is_blank() {
        return CellVerdict::Blank;
    }

    let compared = if graded.accepted_alternates.contains(&literal.to_string()) {
        &graded.expected_literal
    } else {
        literal
    };
    let wrong_value = *compared != graded.expected_literal;

    let wrong_formula = match graded.expected_numeric {
        Some(expected) => {
            let actual = graded
                .cell
                .offset_rows(offset)
                .and_then(|target| grid.numeric(target))
                .map(|n| round_to(n, NUMERIC_PRECISION));
            match actual {
                Some(actual) => actual != expected || *literal == CellValue::Number(actual),
                None => true,
            }
        }
        None => false,
    };

    match (wrong_value, wrong_formula) {
        (true, true) => CellVerdict::WrongFormula,
        (true, false) => CellVerdict::WrongValue,
        _ => CellVerdict::Correct,
    }
}

/// Classifies every graded cell of `key`, in key order.
pub fn classify(grid: &SubmissionGrid, key: &AnswerKey, offset: i64) -> Vec<CellOutcome> {
    key.iter()
        .map(|graded| CellOutcome {
            graded:  graded.clone(),
            verdict: classify_cell(grid, graded, offset),
        })
        .collect()
}
