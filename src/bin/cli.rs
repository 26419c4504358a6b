use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use timetable_sync::{
    LessonRecord, ScheduleStore, SqliteScheduleStore, SyncConfig, SyncOutcome, SyncPipeline,
    save_lessons_to_csv, save_lessons_to_json,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "timetable-sync", about = "Crawl, parse and query the university timetable")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one full sync (crawl, parse, commit)
    Sync,
    /// Sync now and then every SYNC_INTERVAL_HOURS
    Watch,
    /// Parse an existing download tree and commit it without crawling
    Ingest { dir: PathBuf },
    /// Print a group's lessons for a day
    Group { name: String, date: NaiveDate },
    /// Print a teacher's lessons for a day
    Teacher { name: String, date: NaiveDate },
    /// Write every stored lesson to a file
    Export { format: ExportFormat, path: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

fn render_row<'a>(widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = String::from("|");
    for (ci, cell) in cells.enumerate() {
        let pad = widths[ci].saturating_sub(cell.chars().count());
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(pad));
        line.push_str(" |");
    }
    line
}

fn render_lessons_as_text_table(lessons: &[LessonRecord]) -> String {
    let headers = ["date", "time", "group", "subject", "teacher", "location", "week"];
    let rows: Vec<[String; 7]> = lessons
        .iter()
        .map(|l| {
            [
                l.lesson_date.format("%d.%m.%Y").to_string(),
                l.time.clone(),
                l.group_name.clone(),
                l.subject.clone(),
                l.teacher.clone(),
                l.location.clone(),
                l.week_type.to_string(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (ci, cell) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(cell.chars().count());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(&widths, headers.iter().copied()));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in &rows {
        out.push_str(&render_row(&widths, row.iter().map(String::as_str)));
        out.push('\n');
    }
    out.push_str(&sep);
    out
}

fn open_store(config: &SyncConfig) -> anyhow::Result<SqliteScheduleStore> {
    SqliteScheduleStore::new(config.database_path()).with_context(|| {
        format!(
            "failed to open schedule database at {}",
            config.database_path().display()
        )
    })
}

fn report(outcome: &SyncOutcome) -> bool {
    if outcome.is_success() {
        info!(%outcome, "sync finished");
    } else {
        error!(%outcome, "sync did not commit");
    }
    outcome.is_success()
}

fn print_lessons(lessons: &[LessonRecord], empty_message: &str) {
    if lessons.is_empty() {
        println!("{empty_message}");
    } else {
        println!("{}", render_lessons_as_text_table(lessons));
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = SyncConfig::from_env().context("failed to gather config from env")?;

    match cli.command {
        Command::Sync => {
            config.require_credentials()?;
            let pipeline = SyncPipeline::new(config);
            Ok(report(&pipeline.run_full_sync()))
        }
        Command::Watch => {
            config.require_credentials()?;
            let interval = config.sync_interval;
            let pipeline = SyncPipeline::new(config);
            loop {
                report(&pipeline.run_full_sync());
                info!(hours = interval.as_secs() / 3600, "next sync scheduled");
                std::thread::sleep(interval);
            }
        }
        Command::Ingest { dir } => {
            if !dir.is_dir() {
                bail!("{} is not a directory", dir.display());
            }
            let store = open_store(&config)?;
            let pipeline = SyncPipeline::new(config);
            let outcome = pipeline.ingest_directory(&dir, &store, Local::now().date_naive());
            Ok(report(&outcome))
        }
        Command::Group { name, date } => {
            let store = open_store(&config)?;
            let lessons = store.lessons_for_group(&name, date)?;
            print_lessons(&lessons, &format!("No lessons for {name} on {date}"));
            Ok(true)
        }
        Command::Teacher { name, date } => {
            let store = open_store(&config)?;
            let lessons = store.lessons_for_teacher(&name, date)?;
            print_lessons(&lessons, &format!("No lessons for {name} on {date}"));
            Ok(true)
        }
        Command::Export { format, path } => {
            let store = open_store(&config)?;
            let lessons = store.load_lessons()?;
            match format {
                ExportFormat::Csv => save_lessons_to_csv(&lessons, &path)?,
                ExportFormat::Json => save_lessons_to_json(&lessons, &path)?,
            }
            println!("Exported {} lessons to {}", lessons.len(), path.display());
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
