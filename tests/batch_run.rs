use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use sheetgrade::{
    batch::run_batch,
    config::{EmptyKeyPolicy, GradingConfig, RunContext, run_paths},
    grade::{ItemCount, ScoreBucket},
    sheet::{CellValue, Grid, SheetCell, Workbook, open_for_read, open_workbook, save_workbook},
    types::CellRef,
};
use uuid::Uuid;

const MARKER: &str = "FFD9E1F2";

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("sheetgrade-batch-{}", Uuid::new_v4()));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

fn save(path: &Path, sheet: Grid) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    let mut book = Workbook::new();
    book.push_sheet(sheet);
    save_workbook(&book, path).expect("save fixture");
}

fn number(n: f64) -> SheetCell {
    SheetCell::from_value(CellValue::Number(n))
}

/// Graded cells A1, B2 and D3 (row 2, col 3), holding 1, 2 and 3.
fn key_sheet() -> Grid {
    Grid::new("Sheet1")
        .with_cell(CellRef::new(0, 0), number(1.0).with_fill(MARKER))
        .with_cell(CellRef::new(1, 1), number(2.0).with_fill(MARKER))
        .with_cell(CellRef::new(2, 3), number(3.0).with_fill(MARKER))
}

/// A submission with A1 and B2 as given and D3 left empty.
fn answers(a1: f64, b2: Option<f64>) -> Grid {
    let grid = Grid::new("Sheet1").with_cell(CellRef::new(0, 0), number(a1));
    match b2 {
        Some(b2) => grid.with_cell(CellRef::new(1, 1), number(b2)),
        None => grid,
    }
}

fn context(root: &Path, roster: Option<PathBuf>, empty_key: EmptyKeyPolicy) -> RunContext {
    let paths = run_paths()
        .key(root.join("key.xlsx"))
        .submissions_dir(root.join("submissions"))
        .output_dir(root.join("out"))
        .maybe_roster(roster)
        .build();
    let config = GradingConfig::builder()
        .sheet("Sheet1")
        .workers(2)
        .retries(2)
        .retry_delay(Duration::from_millis(1))
        .empty_key(empty_key)
        .build();
    RunContext::new(paths, config)
}

/// Three students who all left D3 empty.
fn write_cohort(root: &Path) {
    save(&root.join("key.xlsx"), key_sheet());
    let subs = root.join("submissions");
    save(&subs.join("Ada Lovelace_101_assignsubmission_file/hw.xlsx"), answers(1.0, Some(2.0)));
    save(&subs.join("Alan Turing_102_assignsubmission_file/hw.xlsx"), answers(1.0, None));
    save(&subs.join("Grace Hopper_103_assignsubmission_file/hw.xlsx"), answers(1.0, Some(2.0)));
}

#[tokio::test]
async fn cell_wrong_for_everyone_ranks_first() {
    let root = temp_root();
    write_cohort(&root);

    let summary = run_batch(&context(&root, None, EmptyKeyPolicy::Zero))
        .await
        .expect("batch completes");

    assert_eq!(summary.results.len(), 3);
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.graded_cells, 3);
    assert_eq!(
        summary.analysis.items,
        vec![
            ItemCount {
                cell:  CellRef::new(2, 3),
                wrong: 3,
            },
            ItemCount {
                cell:  CellRef::new(1, 1),
                wrong: 1,
            },
            ItemCount {
                cell:  CellRef::new(0, 0),
                wrong: 0,
            },
        ]
    );

    let scores: Vec<_> = summary
        .results
        .iter()
        .map(|g| (g.result.student.as_str(), g.result.score))
        .collect();
    assert_eq!(scores, vec![("Ada Lovelace", 67), ("Alan Turing", 33), ("Grace Hopper", 67)]);

    let distribution: Vec<_> = summary.analysis.distribution.iter().map(|(_, n)| *n).collect();
    assert_eq!(distribution, vec![1, 2, 0, 0, 0]);
    assert_eq!(summary.analysis.distribution[0].0, ScoreBucket::Below60);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn artifacts_are_written() {
    let root = temp_root();
    write_cohort(&root);
    let roster = root.join("roster.csv");
    fs::write(
        &roster,
        "First Name,Last Name,Student ID,Email\nAda,Lovelace,101,ada@example.edu\n",
    )
    .expect("write roster");

    let summary = run_batch(&context(&root, Some(roster), EmptyKeyPolicy::Zero))
        .await
        .expect("batch completes");
    let out = root.join("out");

    let feedback = out.join("feedback/Alan Turing_102_assignsubmission_file/hw.xlsx");
    assert!(feedback.exists());
    assert!(summary.results.iter().all(|g| g.feedback.is_some()));
    let copy = open_workbook(&feedback).expect("feedback copy");
    assert_eq!(copy.sheet_names(), vec!["Sheet1", "grade report"]);

    let item_analysis = open_for_read(&out.join("results_summary.xlsx"), "Item Analysis")
        .expect("summary workbook");
    assert_eq!(item_analysis.value_at(CellRef::new(0, 0)), &CellValue::Text("Cell".into()));
    assert_eq!(item_analysis.value_at(CellRef::new(1, 0)), &CellValue::Text("D3".into()));
    assert_eq!(item_analysis.value_at(CellRef::new(1, 1)), &CellValue::Number(3.0));
    assert!(item_analysis.value_at(CellRef::new(4, 0)).is_blank());
    assert_eq!(
        item_analysis.value_at(CellRef::new(5, 0)),
        &CellValue::Text("SCORE SUMMARY".into())
    );
    assert_eq!(item_analysis.value_at(CellRef::new(7, 0)), &CellValue::Text("<60".into()));
    assert_eq!(item_analysis.value_at(CellRef::new(7, 1)), &CellValue::Number(1.0));
    assert_eq!(item_analysis.value_at(CellRef::new(8, 0)), &CellValue::Text("60-70".into()));
    assert_eq!(item_analysis.value_at(CellRef::new(8, 1)), &CellValue::Number(2.0));

    let scores = fs::read_to_string(out.join("Scores.csv")).expect("scores");
    let lines: Vec<_> = scores.lines().collect();
    assert_eq!(lines[0], "First Name,Last Name,Folder,Score,Email,Student ID");
    assert_eq!(
        lines[1],
        "Ada,Lovelace,Ada Lovelace_101_assignsubmission_file,67,ada@example.edu,101"
    );
    assert_eq!(lines[2], "Alan,Turing,Alan Turing_102_assignsubmission_file,33,,");
    assert_eq!(lines.len(), 4);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("results.json")).expect("json"))
            .expect("valid json");
    assert_eq!(json["results"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["sheet"], "Sheet1");

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn unreadable_submissions_are_skipped() {
    let root = temp_root();
    write_cohort(&root);
    let subs = root.join("submissions");
    fs::write(subs.join("Ada Lovelace_101_assignsubmission_file/~$hw.xlsx"), b"lock")
        .expect("write lock file");
    save(
        &subs.join("Linus Pauling_104_assignsubmission_file/hw.xlsx"),
        Grid::new("Other").with_cell(CellRef::new(0, 0), number(1.0)),
    );
    fs::create_dir_all(subs.join("Marie Curie_105_assignsubmission_file")).expect("dir");
    fs::write(subs.join("Marie Curie_105_assignsubmission_file/hw.xlsx"), b"not a zip")
        .expect("write corrupt file");

    let summary = run_batch(&context(&root, None, EmptyKeyPolicy::Zero))
        .await
        .expect("batch completes");

    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.skipped.len(), 3);
    let reasons: Vec<_> = summary.skipped.iter().map(|s| s.reason.as_str()).collect();
    assert!(reasons[0].contains("lock file"));
    assert_eq!(reasons[1], "sheet `Sheet1` is missing");
    assert!(reasons[2].starts_with("could not read the workbook"));

    // skipped students count as 0 in the distribution and the export; the
    // lock file next to Ada's workbook is not a student
    assert_eq!(summary.analysis.students, 5);
    assert_eq!(summary.analysis.distribution[0].1, 3);
    let scores = fs::read_to_string(root.join("out/Scores.csv")).expect("scores");
    assert!(scores.contains("Linus,Pauling,Linus Pauling_104_assignsubmission_file,0,,"));
    assert_eq!(scores.lines().count(), 6);
    assert_eq!(scores.lines().filter(|l| l.starts_with("Ada,")).count(), 1);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn lock_file_beside_a_workbook_is_not_a_student() {
    let root = temp_root();
    save(&root.join("key.xlsx"), key_sheet());
    let folder = root.join("submissions/Ada Lovelace_101");
    save(&folder.join("hw.xlsx"), key_sheet());
    fs::write(folder.join("~$hw.xlsx"), b"lock").expect("write lock file");

    let summary = run_batch(&context(&root, None, EmptyKeyPolicy::Zero))
        .await
        .expect("batch completes");

    assert_eq!(summary.results.len(), 1);
    assert_eq!(summary.results[0].result.score, 100);
    assert_eq!(summary.skipped.len(), 1);
    assert!(!summary.skipped[0].counts_as_student);

    assert_eq!(summary.analysis.students, 1);
    let distribution: Vec<_> = summary.analysis.distribution.iter().map(|(_, n)| *n).collect();
    assert_eq!(distribution, vec![0, 0, 0, 0, 1]);

    let scores = fs::read_to_string(root.join("out/Scores.csv")).expect("scores");
    let lines: Vec<_> = scores.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "Ada,Lovelace,Ada Lovelace_101,100,,");

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn key_without_marked_cells_still_completes() {
    let root = temp_root();
    write_cohort(&root);
    save(
        &root.join("key.xlsx"),
        Grid::new("Sheet1").with_cell(CellRef::new(0, 0), number(1.0)),
    );

    let summary = run_batch(&context(&root, None, EmptyKeyPolicy::Zero))
        .await
        .expect("batch completes");
    assert_eq!(summary.graded_cells, 0);
    assert!(summary.results.iter().all(|g| g.result.score == 0));
    assert!(summary.analysis.items.is_empty());
    assert!(root.join("out/results_summary.xlsx").exists());

    let full = run_batch(&context(&root, None, EmptyKeyPolicy::Full))
        .await
        .expect("batch completes");
    assert!(full.results.iter().all(|g| g.result.score == 100));

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn missing_key_sheet_is_fatal() {
    let root = temp_root();
    write_cohort(&root);
    save(
        &root.join("key.xlsx"),
        Grid::new("Answers").with_cell(CellRef::new(0, 0), number(1.0).with_fill(MARKER)),
    );

    assert!(run_batch(&context(&root, None, EmptyKeyPolicy::Zero)).await.is_err());

    let _ = fs::remove_dir_all(root);
}
