use calamine::{Data, ExcelDateTime};
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, trace};

use super::IngestError;
use crate::academic::AcademicContext;
use crate::calendar::{DateConfidence, ResolvedDate, resolve_date_cell};
use crate::cell::parse_lesson_cell;
use crate::lesson::{LessonRecord, WeekType};

const DAY_HEADERS: [&str; 2] = ["День", "Day"];
const TIME_HEADERS: [&str; 2] = ["Часы", "Time"];

/// Per-file context shared by every row of one sheet.
#[derive(Debug, Clone)]
pub struct SheetContext<'a> {
    pub week_type: WeekType,
    pub academic: AcademicContext,
    pub faculty: &'a str,
    pub course: &'a str,
    pub today: NaiveDate,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SheetLessons {
    pub lessons: Vec<LessonRecord>,
    /// Day cells whose year came from the wall-clock heuristic.
    pub guessed_dates: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRoles {
    pub header_row: usize,
    pub day: usize,
    pub time: usize,
    /// `(column index, group name)` for every remaining named column.
    pub groups: Vec<(usize, String)>,
}

/// Renders a cell the way a reader sees it: integral floats lose `.0`,
/// time-of-day values become `HH:MM`, errors become empty.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                format!("{f}")
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_datetime_text(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

fn excel_datetime_text(dt: &ExcelDateTime) -> String {
    if let Some(date) = excel_date(dt) {
        return date.format("%d.%m.%Y").to_string();
    }
    excel_time_of_day(dt)
        .map(|time| time.format("%H:%M").to_string())
        .unwrap_or_default()
}

/// Serials below one day carry only a time of day.
fn excel_date(dt: &ExcelDateTime) -> Option<NaiveDate> {
    if dt.is_duration() || dt.as_f64() < 1.0 {
        return None;
    }
    dt.as_datetime().map(|datetime| datetime.date())
}

/// Rounded to the minute; stored fractions such as `0.3541666` sit a few
/// milliseconds short of the slot they encode.
fn excel_time_of_day(dt: &ExcelDateTime) -> Option<NaiveTime> {
    let minutes = (dt.as_f64().fract() * 1440.0).round() as u32 % 1440;
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

fn cell_at(row: &[Data], idx: usize) -> &Data {
    static EMPTY: Data = Data::Empty;
    row.get(idx).unwrap_or(&EMPTY)
}

fn is_header_row(row: &[Data]) -> bool {
    let texts: Vec<String> = row.iter().map(|c| cell_text(c).trim().to_string()).collect();
    let has = |label: &str| texts.iter().any(|t| t == label);
    has("День") || (has("Day") && has("Time"))
}

/// Finds the header row and assigns day, time and group roles to its columns.
pub fn resolve_columns(rows: &[Vec<Data>]) -> Result<ColumnRoles, IngestError> {
    let header_row = rows
        .iter()
        .position(|row| is_header_row(row))
        .ok_or(IngestError::NoHeader)?;

    let headers: Vec<String> = rows[header_row]
        .iter()
        .map(|c| cell_text(c).trim().to_string())
        .collect();
    let find = |labels: &[&str]| {
        labels
            .iter()
            .find_map(|label| headers.iter().position(|h| h == label))
    };

    let day = find(&DAY_HEADERS).ok_or(IngestError::MissingColumn("day"))?;
    let time = find(&TIME_HEADERS).ok_or(IngestError::MissingColumn("time"))?;

    let groups = headers
        .iter()
        .enumerate()
        .filter(|(idx, name)| {
            *idx != day && *idx != time && !name.is_empty() && !name.eq_ignore_ascii_case("nan")
        })
        .map(|(idx, name)| (idx, name.clone()))
        .collect();

    Ok(ColumnRoles {
        header_row,
        day,
        time,
        groups,
    })
}

fn resolve_day_cell(cell: &Data, ctx: &SheetContext<'_>) -> Option<ResolvedDate> {
    if let Data::DateTime(dt) = cell {
        if let Some(date) = excel_date(dt) {
            return Some(ResolvedDate {
                date,
                confidence: DateConfidence::Explicit,
            });
        }
    }
    resolve_date_cell(&cell_text(cell), &ctx.academic, ctx.today)
}

/// Walks the rows below the header, carrying the last seen date and time
/// slot forward across merged or blank cells, and emits one record per
/// non-empty group cell.
pub fn extract_lessons(
    rows: &[Vec<Data>],
    ctx: &SheetContext<'_>,
) -> Result<SheetLessons, IngestError> {
    let roles = resolve_columns(rows)?;
    debug!(
        header_row = roles.header_row,
        groups = roles.groups.len(),
        "resolved column roles"
    );

    let mut out = SheetLessons::default();
    let mut current_date: Option<NaiveDate> = None;
    let mut current_time: Option<String> = None;

    for (row_idx, row) in rows.iter().enumerate().skip(roles.header_row + 1) {
        let cell = |idx: usize| cell_at(row, idx);

        if let Some(resolved) = resolve_day_cell(cell(roles.day), ctx) {
            if resolved.confidence == DateConfidence::Guessed {
                out.guessed_dates += 1;
            }
            current_date = Some(resolved.date);
            current_time = None;
        }

        let Some(date) = current_date else {
            trace!(row_idx, "no date resolved yet");
            continue;
        };

        let raw_time = cell_text(cell(roles.time)).trim().to_string();
        if !raw_time.is_empty() && !raw_time.to_lowercase().contains("nan") {
            current_time = Some(raw_time);
        }
        let Some(time) = current_time.as_deref() else {
            trace!(row_idx, "no time slot for row");
            continue;
        };

        for (col, group) in &roles.groups {
            let Some(parsed) = parse_lesson_cell(&cell_text(cell(*col))) else {
                continue;
            };
            out.lessons.push(LessonRecord {
                group_name: group.clone(),
                lesson_date: date,
                time: time.to_string(),
                subject: parsed.subject,
                teacher: parsed.teacher,
                location: parsed.location,
                week_type: ctx.week_type,
                faculty: ctx.faculty.to_string(),
                course: ctx.course.to_string(),
            });
        }
    }

    Ok(out)
}
