use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static SEMESTER_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d)\s*семестр.*?(\d{4})[/-](\d{4})").expect("semester span regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Semester {
    /// September through January.
    Autumn,
    /// February through August.
    Spring,
}

impl Semester {
    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            1 => Some(Semester::Autumn),
            2 => Some(Semester::Spring),
            _ => None,
        }
    }

    pub fn number(&self) -> u32 {
        match self {
            Semester::Autumn => 1,
            Semester::Spring => 2,
        }
    }
}

/// Year information that disambiguates month-only dates within one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcademicContext {
    Semester {
        semester: Semester,
        start_year: i32,
        end_year: i32,
    },
    /// No semester in the filename; only the wall-clock year is known.
    CalendarYear { year: i32 },
}

impl AcademicContext {
    pub fn semester(semester: Semester, start_year: i32, end_year: i32) -> Self {
        AcademicContext::Semester {
            semester,
            start_year,
            end_year,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, AcademicContext::CalendarYear { .. })
    }
}

/// Extracts `(semester number, start year, end year)` from text such as
/// `"Промежуточная аттестация за 1 семестр 2025-2026"`.
pub fn parse_semester_span(text: &str) -> Option<(u32, i32, i32)> {
    let caps = SEMESTER_SPAN.captures(text)?;
    let semester = caps.get(1)?.as_str().parse().ok()?;
    let start_year = caps.get(2)?.as_str().parse().ok()?;
    let end_year = caps.get(3)?.as_str().parse().ok()?;
    Some((semester, start_year, end_year))
}

/// Derives the context once per file from its name.
///
/// Semester numbers other than 1 and 2 are treated as absent.
pub fn resolve_academic_context(filename: &str, today: NaiveDate) -> AcademicContext {
    parse_semester_span(filename)
        .and_then(|(number, start_year, end_year)| {
            Semester::from_number(number)
                .map(|semester| AcademicContext::semester(semester, start_year, end_year))
        })
        .unwrap_or(AcademicContext::CalendarYear { year: today.year() })
}
