use std::{fs, path::PathBuf};

use sheetgrade::{
    config::{EmptyKeyPolicy, GradingConfig},
    constants::GRADE_REPORT_SHEET,
    grade::{
        CellVerdict, CohortReport, SubmissionGrid, classify, load_key, score, write_feedback,
    },
    sheet::{
        Annotation, CellValue, Grid, SheetCell, Workbook, open_for_read, open_workbook,
        save_workbook,
    },
    types::CellRef,
};
use uuid::Uuid;

const MARKER: &str = "FFD9E1F2";

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("sheetgrade-grading-{}", Uuid::new_v4()));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

fn save(path: &PathBuf, sheets: Vec<Grid>) {
    let mut book = Workbook::new();
    for sheet in sheets {
        book.push_sheet(sheet);
    }
    save_workbook(&book, path).expect("save fixture");
}

fn marked(value: CellValue) -> SheetCell {
    SheetCell::from_value(value).with_fill(MARKER)
}

/// Graded cells B2..E2 hold `10`, `Paris`, `25.5` and `=SUM(E4:E5)`; the
/// formula's result, 25, sits one row above it in E1.
fn key_sheet() -> Grid {
    Grid::new("Sheet1")
        .with_cell(CellRef::new(0, 4), SheetCell::from_value(CellValue::Number(25.0)))
        .with_cell(CellRef::new(1, 1), marked(CellValue::Number(10.0)))
        .with_cell(CellRef::new(1, 2), marked(CellValue::Text("Paris".into())))
        .with_cell(CellRef::new(1, 3), marked(CellValue::Number(25.5)))
        .with_cell(
            CellRef::new(1, 4),
            SheetCell::formula("SUM(E4:E5)", CellValue::Number(25.0)).with_fill(MARKER),
        )
        .with_cell(CellRef::new(3, 4), SheetCell::from_value(CellValue::Number(20.0)))
        .with_cell(CellRef::new(4, 4), SheetCell::from_value(CellValue::Number(5.0)))
}

/// `10`, `paris`, nothing, and a typed-in `25` with 25 above it.
fn submission_sheet() -> Grid {
    Grid::new("Sheet1")
        .with_cell(CellRef::new(0, 4), SheetCell::from_value(CellValue::Number(25.0)))
        .with_cell(CellRef::new(1, 1), marked(CellValue::Number(10.0)))
        .with_cell(CellRef::new(1, 2), marked(CellValue::Text("paris".into())))
        .with_cell(CellRef::new(1, 3), SheetCell::default().with_fill(MARKER))
        .with_cell(CellRef::new(1, 4), marked(CellValue::Number(25.0)))
}

fn config() -> GradingConfig {
    GradingConfig::builder()
        .sheet("Sheet1")
        .instructor("Dr. Grader")
        .retries(1)
        .build()
}

#[test]
fn four_cell_scenario_from_files() {
    let root = temp_root();
    let key_path = root.join("key.xlsx");
    let submission_path = root.join("submission.xlsx");
    save(&key_path, vec![key_sheet()]);
    save(&submission_path, vec![submission_sheet()]);

    let config = config();
    let key = load_key(&key_path, &config).expect("key");
    assert_eq!(key.len(), 4);
    let numeric: Vec<_> = key.iter().map(|g| g.expected_numeric).collect();
    assert_eq!(numeric, vec![None, None, None, Some(25.0)]);

    let grid = open_for_read(&submission_path, "Sheet1").expect("submission");
    let outcomes = classify(&SubmissionGrid::from(&grid), &key, config.numeric_offset());
    let verdicts: Vec<_> = outcomes.iter().map(|o| o.verdict).collect();
    assert_eq!(
        verdicts,
        vec![
            CellVerdict::Correct,
            CellVerdict::WrongValue,
            CellVerdict::Blank,
            CellVerdict::WrongFormula,
        ]
    );

    let result = score("Ada Lovelace", outcomes, config.empty_key());
    assert_eq!(result.counts.correct, 1);
    assert_eq!(result.counts.wrong_value, 1);
    assert_eq!(result.counts.total(), 4);
    assert_eq!(result.counts.wrong(), 2);
    assert_eq!(result.score, 50);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn alternates_in_the_key_note_are_accepted() {
    let root = temp_root();
    let key_path = root.join("key.xlsx");
    let submission_path = root.join("submission.xlsx");

    let key = key_sheet().with_cell(
        CellRef::new(1, 2),
        marked(CellValue::Text("Paris".into())).with_note(Annotation::new("paris\nPARIS")),
    );
    save(&key_path, vec![key]);
    save(&submission_path, vec![submission_sheet()]);

    let config = config();
    let key = load_key(&key_path, &config).expect("key");
    let grid = open_for_read(&submission_path, "Sheet1").expect("submission");
    let outcomes = classify(&SubmissionGrid::from(&grid), &key, config.numeric_offset());
    assert_eq!(outcomes[1].verdict, CellVerdict::Correct);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn grading_is_deterministic_and_aggregation_order_free() {
    let root = temp_root();
    let key_path = root.join("key.xlsx");
    save(&key_path, vec![key_sheet()]);
    let config = config();
    let key = load_key(&key_path, &config).expect("key");

    let perfect = SubmissionGrid::from(&key_sheet());
    let partial = SubmissionGrid::from(&submission_sheet());
    let empty = SubmissionGrid::from(&Grid::new("Sheet1"));

    let results: Vec<_> = [("a", &perfect), ("b", &partial), ("c", &empty)]
        .into_iter()
        .map(|(name, grid)| score(name, classify(grid, &key, -1), EmptyKeyPolicy::Zero))
        .collect();
    let again = score("b", classify(&partial, &key, -1), EmptyKeyPolicy::Zero);
    assert_eq!(results[1], again);
    assert_eq!(results[0].score, 100);
    assert_eq!(results[2].score, 0);

    let mut forward = CohortReport::new(&key);
    results.iter().for_each(|r| forward.accumulate(r));
    let mut backward = CohortReport::new(&key);
    results.iter().rev().for_each(|r| backward.accumulate(r));
    assert_eq!(forward, backward);
    assert_eq!(forward.finalize(), backward.finalize());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn feedback_copy_is_annotated_and_summarized() {
    let root = temp_root();
    let key_path = root.join("key.xlsx");
    let submission_path = root.join("submission.xlsx");
    let target = root.join("feedback").join("Ada Lovelace_1").join("submission.xlsx");
    save(&key_path, vec![key_sheet()]);
    save(
        &submission_path,
        vec![
            submission_sheet(),
            Grid::new("Notes").with_cell(
                CellRef::new(0, 0),
                SheetCell::from_value(CellValue::Text("scratch".into())),
            ),
        ],
    );

    let config = config();
    let key = load_key(&key_path, &config).expect("key");
    let grid = open_for_read(&submission_path, "Sheet1").expect("submission");
    let result = score(
        "Ada Lovelace",
        classify(&SubmissionGrid::from(&grid), &key, config.numeric_offset()),
        config.empty_key(),
    );
    write_feedback(&submission_path, &target, &result, &config).expect("feedback written");

    let book = open_workbook(&target).expect("feedback copy");
    assert_eq!(book.sheet_names(), vec!["Sheet1", "Notes", GRADE_REPORT_SHEET]);

    let sheet = book.sheet("Sheet1").expect("graded sheet");
    let correct = sheet.cell_at(CellRef::new(1, 1)).expect("B2");
    assert_eq!(correct.fill.as_deref(), Some(MARKER));
    assert!(correct.note.is_none());

    let blank = sheet.cell_at(CellRef::new(1, 3)).expect("D2");
    assert_eq!(blank.fill.as_deref(), Some("FFFFFF00"));
    let note = blank.note.as_ref().expect("correction note");
    assert_eq!(note.text, "Correct: 25.5");
    assert_eq!(note.author.as_deref(), Some("Dr. Grader"));

    let formula = sheet.cell_at(CellRef::new(1, 4)).expect("E2");
    assert_eq!(
        formula.note.as_ref().map(|n| n.text.as_str()),
        Some("Correct: =SUM(E4:E5)")
    );

    let report = book.sheet(GRADE_REPORT_SHEET).expect("grade report");
    let column: Vec<String> = (0..11)
        .map(|row| report.value_at(CellRef::new(row, 0)).to_string())
        .collect();
    assert_eq!(
        column,
        vec![
            "GRADE SUMMARY",
            "Incorrect formulas:",
            "E2",
            "Empty cells:",
            "D2",
            "Total incorrect:",
            "2",
            "Out of:",
            "4",
            "Score (%):",
            "50",
        ]
    );

    let _ = fs::remove_dir_all(root);
}
