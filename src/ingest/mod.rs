use calamine::{Data, Reader, open_workbook_auto};
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Component, Path};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::academic::resolve_academic_context;
use crate::lesson::{COURSE_UNKNOWN, FACULTY_UNKNOWN, LessonRecord, WeekType};

pub mod sheet;

pub use sheet::{ColumnRoles, SheetContext, SheetLessons, cell_text, extract_lessons};

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("number regex"));
static FILENAME_COURSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*курс").expect("course regex"));

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("not a spreadsheet file")]
    UnsupportedExtension,
    #[error("filename does not name an odd, even or exam week")]
    UnknownWeekType,
    #[error("failed to open workbook: {0}")]
    Open(String),
    #[error("workbook has no worksheets")]
    NoSheet,
    #[error("no header row with a day column")]
    NoHeader,
    #[error("header row has no {0} column")]
    MissingColumn(&'static str),
}

impl IngestError {
    /// Skips that are expected for foreign files and not worth a warning.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self,
            IngestError::UnsupportedExtension | IngestError::UnknownWeekType
        )
    }
}

/// Where a file sits in the download tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlacement {
    pub faculty: String,
    pub course: String,
}

impl FilePlacement {
    /// Faculty is the first directory below the root; course is the first
    /// number of the second directory, else `<n> курс` in the filename.
    /// Returns `None` for files directly inside the root.
    pub fn from_relative_path(relative: &Path) -> Option<Self> {
        let dirs: Vec<String> = relative
            .parent()?
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let faculty = dirs.first()?.clone();

        let mut course = dirs
            .get(1)
            .and_then(|segment| FIRST_NUMBER.find(segment))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| COURSE_UNKNOWN.to_string());

        if course == COURSE_UNKNOWN {
            let filename = relative
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some(caps) = FILENAME_COURSE.captures(&filename) {
                course = caps[1].to_string();
            }
        }

        Some(Self { faculty, course })
    }
}

#[derive(Debug, Default, Clone)]
pub struct IngestSummary {
    pub lessons: Vec<LessonRecord>,
    pub files_parsed: usize,
    pub files_skipped: usize,
}

/// Turns downloaded spreadsheets into lesson records.
///
/// `today` feeds the academic-year fallback and is fixed for the whole pass
/// so one run resolves every file against the same clock.
#[derive(Debug, Clone)]
pub struct SpreadsheetIngestor {
    today: NaiveDate,
}

impl SpreadsheetIngestor {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Parses every spreadsheet under `root`. Failures are isolated per file.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub fn ingest_tree(&self, root: &Path) -> IngestSummary {
        let mut summary = IngestSummary::default();

        let entries = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "failed to read download tree entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file());

        for entry in entries {
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let Some(placement) = FilePlacement::from_relative_path(relative) else {
                debug!(path = %path.display(), "ignoring file outside a faculty folder");
                continue;
            };

            match self.ingest_file(path, &placement.faculty, &placement.course) {
                Ok(parsed) => {
                    summary.files_parsed += 1;
                    summary.lessons.extend(parsed.lessons);
                }
                Err(err) if err.is_quiet() => {
                    debug!(path = %path.display(), reason = %err, "skipping file");
                    summary.files_skipped += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unparseable file");
                    summary.files_skipped += 1;
                }
            }
        }

        info!(
            files_parsed = summary.files_parsed,
            files_skipped = summary.files_skipped,
            lessons = summary.lessons.len(),
            "ingested download tree"
        );
        summary
    }

    /// Parses one spreadsheet. A corrupt or foreign file is an error for this
    /// file only; callers keep going.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn ingest_file(
        &self,
        path: &Path,
        faculty: &str,
        course: &str,
    ) -> Result<SheetLessons, IngestError> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_spreadsheet_name(&filename) {
            return Err(IngestError::UnsupportedExtension);
        }
        let week_type = WeekType::from_filename(&filename);
        if !week_type.is_known() {
            return Err(IngestError::UnknownWeekType);
        }

        let mut workbook =
            open_workbook_auto(path).map_err(|err| IngestError::Open(err.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(IngestError::NoSheet)?
            .map_err(|err| IngestError::Open(err.to_string()))?;
        let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();

        self.ingest_rows(&rows, &filename, week_type, faculty, course)
    }

    /// Parses an already loaded sheet.
    pub fn ingest_rows(
        &self,
        rows: &[Vec<Data>],
        filename: &str,
        week_type: WeekType,
        faculty: &str,
        course: &str,
    ) -> Result<SheetLessons, IngestError> {
        let ctx = SheetContext {
            week_type,
            academic: resolve_academic_context(filename, self.today),
            faculty: if faculty.is_empty() { FACULTY_UNKNOWN } else { faculty },
            course: if course.is_empty() { COURSE_UNKNOWN } else { course },
            today: self.today,
        };
        let parsed = extract_lessons(rows, &ctx)?;

        if parsed.guessed_dates > 0 {
            warn!(
                filename,
                guessed = parsed.guessed_dates,
                "filename has no semester span; years of month-only dates were guessed"
            );
        }
        debug!(filename, lessons = parsed.lessons.len(), "parsed spreadsheet");
        Ok(parsed)
    }
}

fn is_spreadsheet_name(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    lower.ends_with(".xls") || lower.ends_with(".xlsx")
}
