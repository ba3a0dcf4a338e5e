#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use tabled::Tabled;

use super::{key::AnswerKey, results::SubmissionResult};
use crate::types::CellRef;

/// Score ranges used for the cohort distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScoreBucket {
    /// `[0, 60)`
    #[serde(rename = "<60")]
    Below60,
    /// `[60, 70)`
    #[serde(rename = "60-70")]
    From60To70,
    /// `[70, 80)`
    #[serde(rename = "70-80")]
    From70To80,
    /// `[80, 90)`
    #[serde(rename = "80-90")]
    From80To90,
    /// `[90, 100]`
    #[serde(rename = ">=90")]
    From90,
}

impl ScoreBucket {
    /// Every bucket, lowest first.
    pub const ALL: [ScoreBucket; 5] = [
        ScoreBucket::Below60,
        ScoreBucket::From60To70,
        ScoreBucket::From70To80,
        ScoreBucket::From80To90,
        ScoreBucket::From90,
    ];

    /// The bucket a score falls into.
    pub fn for_score(score: u8) -> Self {
        match score {
            0..60 => ScoreBucket::Below60,
            60..70 => ScoreBucket::From60To70,
            70..80 => ScoreBucket::From70To80,
            80..90 => ScoreBucket::From80To90,
            _ => ScoreBucket::From90,
        }
    }

    /// Label shown in reports.
    pub fn label(self) -> &'static str {
        match self {
            ScoreBucket::Below60 => "<60",
            ScoreBucket::From60To70 => "60-70",
            ScoreBucket::From70To80 => "70-80",
            ScoreBucket::From80To90 => "80-90",
            ScoreBucket::From90 => ">=90",
        }
    }
}

impl fmt::Display for ScoreBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A graded cell and how many students got it wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub struct ItemCount {
    /// Graded cell.
    #[tabled(rename = "Cell")]
    pub cell:  CellRef,
    /// Students who left it blank or got the formula wrong.
    #[tabled(rename = "Incorrect Count")]
    pub wrong: usize,
}

/// Per-cell wrong counts and the score distribution of a cohort.
///
/// Folded once per result by a single owner; the order results arrive in
/// does not matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortReport {
    /// Wrong count of every graded cell.
    wrong_counts: BTreeMap<CellRef, usize>,
    /// Number of students per score range.
    buckets:      BTreeMap<ScoreBucket, usize>,
    /// Number of results folded in.
    students:     usize,
}

impl CohortReport {
    /// Creates a report listing every graded cell of `key` with a zero count.
    pub fn new(key: &AnswerKey) -> Self {
        Self {
            wrong_counts: key.iter().map(|graded| (graded.cell, 0)).collect(),
            buckets:      ScoreBucket::ALL.iter().map(|b| (*b, 0)).collect(),
            students:     0,
        }
    }

    /// Folds one submission's result in.
    pub fn accumulate(&mut self, result: &SubmissionResult) {
        for cell in result.wrong_cells() {
            *self.wrong_counts.entry(cell).or_default() += 1;
        }
        self.record_score(result.score);
    }

    /// Counts a submission that could not be graded (score 0).
    pub fn record_skipped(&mut self) {
        self.record_score(0);
    }

    /// Adds a score to the distribution.
    fn record_score(&mut self, score: u8) {
        *self.buckets.entry(ScoreBucket::for_score(score)).or_default() += 1;
        self.students += 1;
    }

    /// Number of students counted.
    pub fn students(&self) -> usize {
        self.students
    }

    /// Current wrong count of a cell.
    pub fn wrong_count(&self, cell: CellRef) -> usize {
        self.wrong_counts.get(&cell).copied().unwrap_or_default()
    }

    /// Student count of a score range.
    pub fn bucket_count(&self, bucket: ScoreBucket) -> usize {
        self.buckets.get(&bucket).copied().unwrap_or_default()
    }

    /// Closes the report, ranking cells by wrong count (highest first, ties in
    /// row-major order).
    pub fn finalize(self) -> ItemAnalysis {
        let mut items: Vec<ItemCount> = self
            .wrong_counts
            .into_iter()
            .map(|(cell, wrong)| ItemCount { cell, wrong })
            .collect();
        items.sort_by(|a, b| b.wrong.cmp(&a.wrong).then(a.cell.cmp(&b.cell)));

        let distribution = ScoreBucket::ALL
            .iter()
            .map(|bucket| (*bucket, self.buckets.get(bucket).copied().unwrap_or_default()))
            .collect();

        ItemAnalysis {
            items,
            distribution,
            students: self.students,
        }
    }
}

/// The finalized cohort report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAnalysis {
    /// Graded cells, most missed first.
    pub items:        Vec<ItemCount>,
    /// Student count per score range, lowest range first.
    pub distribution: Vec<(ScoreBucket, usize)>,
    /// Number of students counted.
    pub students:     usize,
}
