#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::HashMap, io::Read, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    constants::ROSTER_SHEET,
    sheet::{CellValue, Grid, open_for_read},
    types::CellRef,
};

/// One student of the class roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name:  String,
    /// Institutional student id.
    pub student_id: Option<String>,
    /// Email address.
    pub email:      Option<String>,
}

/// Roster entries keyed by (first name, last name).
#[derive(Debug, Clone, Default)]
pub struct Roster {
    /// Entries; the first row wins for repeated names.
    entries: HashMap<(String, String), RosterEntry>,
}

/// Trims a field, mapping empty text to `None`.
fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl Roster {
    /// Builds a roster from entries.
    pub fn from_entries(entries: impl IntoIterator<Item = RosterEntry>) -> Self {
        let mut roster = Self::default();
        for entry in entries {
            let key = (entry.first_name.clone(), entry.last_name.clone());
            roster.entries.entry(key).or_insert(entry);
        }
        roster
    }

    /// Loads a roster from a CSV file or from the `Grades` sheet of an
    /// `.xlsx` workbook.
    ///
    /// Only the first four columns are read, as first name, last name,
    /// student id and email; the first row is a header.
    pub fn load(path: &Path) -> Result<Self> {
        let is_xlsx = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));

        if is_xlsx {
            let grid = open_for_read(path, ROSTER_SHEET)
                .with_context(|| format!("Could not read roster {}", path.display()))?;
            Ok(Self::from_grid(&grid))
        } else {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Could not open roster {}", path.display()))?;
            Self::from_csv(file)
        }
    }

    /// Reads CSV roster rows.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record.context("Could not parse roster row")?;
            let field = |i: usize| record.get(i).and_then(non_empty);
            let (Some(first_name), Some(last_name)) = (field(0), field(1)) else {
                continue;
            };
            entries.push(RosterEntry {
                first_name,
                last_name,
                student_id: field(2),
                email: field(3),
            });
        }

        Ok(Self::from_entries(entries))
    }

    /// Reads roster rows from a sheet, skipping the header row.
    pub fn from_grid(grid: &Grid) -> Self {
        let field = |row: u32, col: u16| {
            let cell = CellRef::new(row, col);
            match grid.cell_at(cell).map(|c| &c.cached) {
                Some(CellValue::Empty) | None => None,
                Some(value) => non_empty(&value.to_string()),
            }
        };

        let entries = grid
            .cells()
            .map(|(cell, _)| cell.row)
            .dedup()
            .filter(|row| *row > 0)
            .filter_map(|row| {
                Some(RosterEntry {
                    first_name: field(row, 0)?,
                    last_name:  field(row, 1)?,
                    student_id: field(row, 2),
                    email:      field(row, 3),
                })
            })
            .collect::<Vec<_>>();

        Self::from_entries(entries)
    }

    /// Finds the entry for a student; names are compared after trimming.
    pub fn lookup(&self, first_name: &str, last_name: &str) -> Option<&RosterEntry> {
        self.entries
            .get(&(first_name.trim().to_string(), last_name.trim().to_string()))
    }

    /// Number of students on the roster.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the roster lists nobody.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::SheetCell;

    #[test]
    fn csv_rosters_use_the_first_four_columns() {
        let csv = "First,Last,ID,Email,Section\n\
                   Ada,Lovelace,1001,ada@example.edu,A\n\
                   Alan, Turing ,1002,,B\n\
                   ,Nobody,1003,x@example.edu,C\n";
        let roster = Roster::from_csv(csv.as_bytes()).expect("valid csv");

        assert_eq!(roster.len(), 2);
        let ada = roster.lookup("Ada", "Lovelace").expect("ada is listed");
        assert_eq!(ada.student_id.as_deref(), Some("1001"));
        assert_eq!(ada.email.as_deref(), Some("ada@example.edu"));
        let alan = roster.lookup("Alan", "Turing").expect("alan is listed");
        assert_eq!(alan.email, None);
        assert!(roster.lookup("Grace", "Hopper").is_none());
    }

    #[test]
    fn sheet_rosters_skip_the_header_and_render_numbers() {
        let text = |s: &str| SheetCell::from_value(CellValue::Text(s.into()));
        let grid = Grid::new("Grades")
            .with_cell(CellRef::new(0, 0), text("First Name"))
            .with_cell(CellRef::new(0, 1), text("Last Name"))
            .with_cell(CellRef::new(1, 0), text("Grace"))
            .with_cell(CellRef::new(1, 1), text("Hopper"))
            .with_cell(CellRef::new(1, 2), SheetCell::from_value(CellValue::Number(2001.0)))
            .with_cell(CellRef::new(1, 3), text("grace@example.edu"));

        let roster = Roster::from_grid(&grid);
        assert_eq!(roster.len(), 1);
        let grace = roster.lookup(" Grace ", "Hopper").expect("grace is listed");
        assert_eq!(grace.student_id.as_deref(), Some("2001"));
    }

    #[test]
    fn first_row_wins_for_repeated_names() {
        let entry = |id: &str| RosterEntry {
            first_name: "Ada".into(),
            last_name:  "Lovelace".into(),
            student_id: Some(id.into()),
            email:      None,
        };
        let roster = Roster::from_entries([entry("1"), entry("2")]);
        assert_eq!(roster.lookup("Ada", "Lovelace").and_then(|e| e.student_id.as_deref()), Some("1"));
    }
}
