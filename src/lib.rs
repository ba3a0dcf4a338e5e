//! # sheetgrade
//!
//! Generates locked spreadsheet assignments from an answer key and grades the
//! workbooks students hand back: graded cells are marked in the key with a
//! fill color, every submission is compared cell by cell, and each student
//! gets an annotated copy while the instructor gets a cohort item analysis.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Discovering submissions and grading them as a batch
pub mod batch;
/// Grading settings, environment overrides and run paths
pub mod config;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// Turning an answer key into student assignments
pub mod generate;
/// For all things related to grading
pub mod grade;
/// Student rosters joined into the scores export
pub mod roster;
/// Reading and writing workbooks
pub mod sheet;
/// Cell references and marker colors
pub mod types;
/// Utility functions for convenience
pub mod util;
