use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::academic::{AcademicContext, Semester};

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\.(\d{1,2})\.(\d{2,4})").expect("numeric date regex")
});
static TEXTUAL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+([а-яё]+)").expect("textual date regex"));

/// Genitive month names as they appear in day cells.
pub const MONTHS: [(&str, u32); 12] = [
    ("января", 1),
    ("февраля", 2),
    ("марта", 3),
    ("апреля", 4),
    ("мая", 5),
    ("июня", 6),
    ("июля", 7),
    ("августа", 8),
    ("сентября", 9),
    ("октября", 10),
    ("ноября", 11),
    ("декабря", 12),
];

pub fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(month, _)| *month == name)
        .map(|(_, number)| *number)
}

/// How the year of a resolved date was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateConfidence {
    /// The cell spelled out the year (or was a native spreadsheet date).
    Explicit,
    /// The year came from the semester span in the filename.
    AcademicContext,
    /// Only the wall clock was available; the year is a heuristic guess.
    Guessed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    pub confidence: DateConfidence,
}

/// Resolves a day cell to an absolute date.
///
/// An explicit `D.M.Y` date wins; otherwise `"<day> <month>"` is resolved
/// against `context`. Returns `None` for text without a date and for
/// impossible dates such as `32 января`.
pub fn resolve_date_cell(
    text: &str,
    context: &AcademicContext,
    today: NaiveDate,
) -> Option<ResolvedDate> {
    if let Some(date) = explicit_date(text) {
        return Some(ResolvedDate {
            date,
            confidence: DateConfidence::Explicit,
        });
    }

    let caps = TEXTUAL_DATE.captures(text)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month = month_number(caps.get(2)?.as_str())?;

    let (year, confidence) = match *context {
        AcademicContext::Semester {
            semester: Semester::Autumn,
            start_year,
            end_year,
        } => {
            let year = if month >= 9 { start_year } else { end_year };
            (year, DateConfidence::AcademicContext)
        }
        AcademicContext::Semester {
            semester: Semester::Spring,
            end_year,
            ..
        } => (end_year, DateConfidence::AcademicContext),
        AcademicContext::CalendarYear { year } => {
            // autumn dates read in spring belong to the previous calendar year
            let year = if month > 9 && today.month() < 5 {
                year - 1
            } else {
                year
            };
            (year, DateConfidence::Guessed)
        }
    };

    NaiveDate::from_ymd_opt(year, month, day).map(|date| ResolvedDate { date, confidence })
}

/// Convenience wrapper dropping the confidence flag.
pub fn resolve_date(text: &str, context: &AcademicContext, today: NaiveDate) -> Option<NaiveDate> {
    resolve_date_cell(text, context, today).map(|resolved| resolved.date)
}

fn explicit_date(text: &str) -> Option<NaiveDate> {
    let caps = NUMERIC_DATE.captures(text)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year_text = caps.get(3)?.as_str();
    let mut year: i32 = year_text.parse().ok()?;
    if year_text.len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_table_is_complete_and_ordered() {
        for (idx, (name, number)) in MONTHS.iter().enumerate() {
            assert_eq!(*number as usize, idx + 1);
            assert_eq!(month_number(name), Some(*number));
        }
        assert_eq!(month_number("Января"), Some(1));
        assert_eq!(month_number("январь"), None);
    }

    #[test]
    fn invalid_explicit_date_falls_through_to_text() {
        let ctx = AcademicContext::CalendarYear { year: 2025 };
        assert_eq!(explicit_date("31.02.2025"), None);
        assert_eq!(resolve_date("31.02.2025", &ctx, d(2025, 3, 1)), None);
    }

    #[test]
    fn fallback_uses_context_year_not_clock_year() {
        let ctx = AcademicContext::CalendarYear { year: 2024 };
        assert_eq!(resolve_date("3 марта", &ctx, d(2026, 6, 1)), Some(d(2024, 3, 3)));
        assert_eq!(resolve_date("3 ноября", &ctx, d(2026, 2, 1)), Some(d(2023, 11, 3)));
    }
}
