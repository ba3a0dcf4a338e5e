#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::DEFAULT_MARKER_COLOR;

/// A 0-based (row, column) coordinate within a sheet.
///
/// Ordering is row-major, which is the order graded cells are discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CellRef {
    /// 0-based row index.
    pub row: u32,
    /// 0-based column index.
    pub col: u16,
}

impl CellRef {
    /// Creates a coordinate from 0-based indices.
    pub fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// Returns the coordinate `offset` rows away in the same column, or `None`
    /// when that falls outside the sheet.
    pub fn offset_rows(self, offset: i64) -> Option<Self> {
        let row = i64::from(self.row).checked_add(offset)?;
        let row = u32::try_from(row).ok()?;
        Some(Self { row, col: self.col })
    }

    /// Parses an A1-style reference such as `B12` or `$AA$3`.
    pub fn parse_a1(reference: &str) -> Option<Self> {
        let reference = reference.trim().replace('$', "");
        let split = reference.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = reference.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }
        let row: u32 = digits.parse().ok()?;
        if row == 0 || col == 0 {
            return None;
        }

        Some(Self {
            row: row - 1,
            col: u16::try_from(col - 1).ok()?,
        })
    }
}

/// Converts a 0-based column index into its letter form (`0` → `A`, `26` →
/// `AA`).
pub fn column_letters(col: u16) -> String {
    let mut n = u32::from(col) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

impl From<CellRef> for String {
    fn from(cell: CellRef) -> Self {
        cell.to_string()
    }
}

impl TryFrom<String> for CellRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CellRef::parse_a1(&value).ok_or_else(|| format!("`{value}` is not an A1 cell reference"))
    }
}

/// Errors raised while parsing a marker color.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ColorError {
    /// The value was not 6 or 8 hex digits.
    #[error("`{0}` is not an RGB (6 digit) or ARGB (8 digit) hex color")]
    Invalid(String),
}

/// The fill color that designates a graded cell.
///
/// Stored upper-cased without a leading `#`, so comparisons are
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerColor(String);

impl MarkerColor {
    /// Returns `true` if a cell fill (as stored in the workbook) equals this
    /// marker.
    ///
    /// A 6-digit marker is compared against the RGB part of an 8-digit ARGB
    /// fill.
    pub fn matches(&self, fill: &str) -> bool {
        let fill = normalize_hex(fill);
        if fill == self.0 {
            return true;
        }
        self.0.len() == 6
            && fill.len() == 8
            && fill.chars().all(|c| c.is_ascii_hexdigit())
            && fill.get(2..) == Some(self.0.as_str())
    }
}

impl Default for MarkerColor {
    fn default() -> Self {
        Self(DEFAULT_MARKER_COLOR.to_string())
    }
}

impl FromStr for MarkerColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = normalize_hex(s);
        let valid = matches!(hex.len(), 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
        if valid { Ok(Self(hex)) } else { Err(ColorError::Invalid(s.to_string())) }
    }
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upper-cases a hex color and strips surrounding whitespace and `#`.
fn normalize_hex(value: &str) -> String {
    value.trim().trim_start_matches('#').to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a1_rendering() {
        assert_eq!(CellRef::new(0, 0).to_string(), "A1");
        assert_eq!(CellRef::new(2, 3).to_string(), "D3");
        assert_eq!(CellRef::new(9, 25).to_string(), "Z10");
        assert_eq!(CellRef::new(0, 26).to_string(), "AA1");
        assert_eq!(CellRef::new(4, 701).to_string(), "ZZ5");
        assert_eq!(CellRef::new(0, 702).to_string(), "AAA1");
    }

    #[test]
    fn a1_parsing() {
        assert_eq!(CellRef::parse_a1("A1"), Some(CellRef::new(0, 0)));
        assert_eq!(CellRef::parse_a1("$AA$3"), Some(CellRef::new(2, 26)));
        assert_eq!(CellRef::parse_a1("d3"), Some(CellRef::new(2, 3)));
        assert_eq!(CellRef::parse_a1("A0"), None);
        assert_eq!(CellRef::parse_a1("12"), None);
        assert_eq!(CellRef::parse_a1("B"), None);
    }

    #[test]
    fn offsets_stay_inside_the_sheet() {
        let cell = CellRef::new(0, 4);
        assert_eq!(cell.offset_rows(-1), None);
        assert_eq!(cell.offset_rows(2), Some(CellRef::new(2, 4)));
        assert_eq!(CellRef::new(5, 1).offset_rows(-1), Some(CellRef::new(4, 1)));
    }

    #[test]
    fn marker_matching_is_case_insensitive() {
        let marker: MarkerColor = "ffd9e1f2".parse().expect("valid color");
        assert!(marker.matches("FFD9E1F2"));
        assert!(marker.matches("#ffd9e1f2"));
        assert!(!marker.matches("FFD9E1F3"));

        let rgb: MarkerColor = "#D9E1F2".parse().expect("valid color");
        assert!(rgb.matches("FFD9E1F2"));
    }

    #[test]
    fn malformed_fills_do_not_match() {
        let rgb: MarkerColor = "D9E1F2".parse().expect("valid color");
        assert!(!rgb.matches("A\u{e9}12345"));
        assert!(!rgb.matches("\u{e9}D9E1F2"));
        assert!(!rgb.matches(""));
    }

    #[test]
    fn marker_rejects_garbage() {
        assert!("blue".parse::<MarkerColor>().is_err());
        assert!("FFF".parse::<MarkerColor>().is_err());
    }
}
