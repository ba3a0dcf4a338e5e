#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # sheetgrade
//! ## Introduction
//!
//! Spreadsheet assignments for courses that teach Excel.
//!
//! Mark the answer cells of a key workbook with a fill color, `generate` locked
//! copies for students, then `grade` the folder of workbooks they hand back.
//!
//! ## Installation
//!
//! Type `cargo install --path .` in a checkout of this repository.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bpaf::*;
use colored::Colorize;
use dotenvy::dotenv;
use sheetgrade::{
    batch::run_batch,
    config::{EmptyKeyPolicy, EnvOverrides, GradingConfig, RunContext, run_paths},
    constants::DEFAULT_INSTRUCTOR,
    generate::{GenerateOptions, generate_assignments},
    grade::{item_table, key_table, load_key},
    types::MarkerColor,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Arguments of the `grade` command.
#[derive(Debug, Clone)]
struct GradeArgs {
    /// Answer key workbook
    key:         PathBuf,
    /// Graded sheet
    sheet:       String,
    /// Folder of submissions
    submissions: PathBuf,
    /// Output folder
    out:         PathBuf,
    /// Optional roster
    roster:      Option<PathBuf>,
    /// Author of correction notes
    instructor:  Option<String>,
    /// Marker fill color
    marker:      Option<MarkerColor>,
    /// Row offset of the formula check
    offset:      Option<i64>,
    /// Concurrent workers
    workers:     Option<usize>,
    /// Score policy for empty keys
    empty_key:   Option<EmptyKeyPolicy>,
    /// Debug logging
    verbose:     bool,
}

/// Arguments of the `generate` command.
#[derive(Debug, Clone)]
struct GenerateArgs {
    /// Answer key workbook
    key:         PathBuf,
    /// Sheet holding the graded cells
    sheet:       String,
    /// Output folder
    out:         PathBuf,
    /// Number of copies
    copies:      usize,
    /// Marker fill color
    marker:      Option<MarkerColor>,
    /// Turn off the green/red conditional fills
    no_feedback: bool,
}

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade a folder of submissions
    Grade(GradeArgs),
    /// Write student copies of a key
    Generate(GenerateArgs),
    /// Print the answer key
    Key(PathBuf, String, Option<MarkerColor>, Option<i64>),
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses the answer key path
    fn key() -> impl Parser<PathBuf> {
        long("key").short('k').help("Answer key workbook (.xlsx)").argument::<PathBuf>("KEY")
    }

    /// parses the sheet name
    fn sheet() -> impl Parser<String> {
        long("sheet").short('s').help("Sheet holding the graded cells").argument::<String>("SHEET")
    }

    /// parses the output directory
    fn out() -> impl Parser<PathBuf> {
        long("out").short('o').help("Output directory").argument::<PathBuf>("DIR")
    }

    /// parses the marker color
    fn marker() -> impl Parser<Option<MarkerColor>> {
        long("marker")
            .help("Fill color (RGB or ARGB hex) that marks graded cells")
            .argument::<String>("HEX")
            .parse(|s| s.parse::<MarkerColor>())
            .optional()
    }

    /// parses the numeric row offset
    fn offset() -> impl Parser<Option<i64>> {
        long("offset")
            .help("Row offset of the value checked for formula cells")
            .argument::<i64>("ROWS")
            .optional()
    }

    let grade = {
        let key = key();
        let sheet = sheet();
        let submissions = long("submissions")
            .short('d')
            .help("Folder of extracted submissions")
            .argument::<PathBuf>("DIR");
        let out = out();
        let roster = long("roster")
            .help("Roster (.csv or .xlsx) joined into Scores.csv")
            .argument::<PathBuf>("FILE")
            .optional();
        let instructor = long("instructor")
            .help("Author of correction notes")
            .argument::<String>("NAME")
            .optional();
        let marker = marker();
        let offset = offset();
        let workers = long("workers")
            .help("Submissions graded concurrently")
            .argument::<usize>("N")
            .optional();
        let empty_key = long("empty-key")
            .help("Score when the key has no graded cells: zero or full")
            .argument::<String>("POLICY")
            .parse(|s| s.parse::<EmptyKeyPolicy>())
            .optional();
        let verbose = short('v').long("verbose").help("Log debug output").switch();

        construct!(GradeArgs {
            key,
            sheet,
            submissions,
            out,
            roster,
            instructor,
            marker,
            offset,
            workers,
            empty_key,
            verbose,
        })
    };
    let grade = construct!(Cmd::Grade(grade))
        .to_options()
        .command("grade")
        .help("Grade a folder of submitted workbooks");

    let generate = {
        let key = key();
        let sheet = sheet();
        let out = out();
        let copies = long("copies")
            .short('n')
            .help("Number of copies to write")
            .argument::<usize>("N")
            .fallback(1);
        let marker = marker();
        let no_feedback = long("no-feedback")
            .help("Do not color answers green or red as students type")
            .switch();

        construct!(GenerateArgs {
            key,
            sheet,
            out,
            copies,
            marker,
            no_feedback,
        })
    };
    let generate = construct!(Cmd::Generate(generate))
        .to_options()
        .command("generate")
        .help("Write locked student copies of an answer key");

    let show_key = construct!(Cmd::Key(key(), sheet(), marker(), offset()))
        .to_options()
        .command("key")
        .help("Print the graded cells of an answer key");

    let cmd = construct!([grade, generate, show_key]);

    cmd.to_options()
        .descr("Spreadsheet assignment generator and grader")
        .run()
}

/// Builds the grading settings: command-line values win over environment
/// overrides, which win over defaults.
fn grading_config(args: &GradeArgs, env: EnvOverrides) -> GradingConfig {
    GradingConfig::builder()
        .sheet(args.sheet.clone())
        .marker(args.marker.clone().or(env.marker).unwrap_or_default())
        .maybe_numeric_offset(args.offset.or(env.offset))
        .instructor(
            args.instructor
                .clone()
                .or(env.instructor)
                .unwrap_or_else(|| DEFAULT_INSTRUCTOR.to_string()),
        )
        .maybe_workers(args.workers.or(env.workers))
        .empty_key(args.empty_key.or(env.empty_key).unwrap_or_default())
        .maybe_retries(env.retries)
        .build()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let cmd = options();
    let level = match &cmd {
        Cmd::Grade(args) if args.verbose => Level::DEBUG,
        _ => Level::INFO,
    };

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(level);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    match cmd {
        Cmd::Grade(args) => {
            let config = grading_config(&args, EnvOverrides::from_env());
            let paths = run_paths()
                .key(args.key.clone())
                .submissions_dir(args.submissions.clone())
                .output_dir(args.out.clone())
                .maybe_roster(args.roster.clone())
                .build();
            let ctx = RunContext::new(paths, config);

            let summary = run_batch(&ctx).await.context("Grading run failed")?;
            eprintln!("{}", summary.overview());
            if !summary.analysis.items.is_empty() {
                eprintln!("{}", item_table(&summary.analysis));
            }
            eprintln!(
                "{} graded, {} skipped. Results written to {}",
                summary.results.len().to_string().green().bold(),
                summary.skipped.len().to_string().red().bold(),
                args.out.display()
            );
        }
        Cmd::Generate(args) => {
            let env = EnvOverrides::from_env();
            let options = GenerateOptions::builder()
                .key(args.key)
                .sheet(args.sheet)
                .out_dir(args.out)
                .copies(args.copies)
                .marker(args.marker.or(env.marker).unwrap_or_default())
                .instant_feedback(!args.no_feedback)
                .build();

            let written = tokio::task::spawn_blocking(move || generate_assignments(&options))
                .await
                .context("Generator task failed")??;
            eprintln!("{} assignments written", written.len().to_string().green().bold());
        }
        Cmd::Key(path, sheet, marker, offset) => {
            let env = EnvOverrides::from_env();
            let config = GradingConfig::builder()
                .sheet(sheet)
                .marker(marker.or(env.marker).unwrap_or_default())
                .maybe_numeric_offset(offset.or(env.offset))
                .build();
            let key = load_key(&path, &config)
                .with_context(|| format!("Could not load the answer key {}", path.display()))?;
            eprintln!("{}", key_table(&key));
        }
    };

    Ok(())
}
