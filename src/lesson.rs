use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static ODD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^а-я])нечет").expect("odd-week token regex"));
static EVEN_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^а-я])чет").expect("even-week token regex"));

/// Placeholder stored when a lesson cell names no teacher.
pub const TEACHER_UNSPECIFIED: &str = "Не указан";
/// Placeholder stored when a lesson cell names no room.
pub const LOCATION_UNSPECIFIED: &str = "Не указана";
/// Faculty bucket used when a source folder carries no usable name.
pub const FACULTY_UNKNOWN: &str = "Неизвестно";
/// Course value used when neither the path nor the filename names one.
pub const COURSE_UNKNOWN: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekType {
    Odd,
    Even,
    Exam,
    Unknown,
}

impl WeekType {
    /// Classifies a timetable file by the tokens in its name.
    ///
    /// Tokens must start a word: `нечетная` is odd, `зачетов` is not even.
    pub fn from_filename(filename: &str) -> Self {
        let name = filename.to_lowercase().replace('ё', "е");
        if ODD_TOKEN.is_match(&name) {
            WeekType::Odd
        } else if EVEN_TOKEN.is_match(&name) {
            WeekType::Even
        } else if name.contains("аттестация") || name.contains("сессия") {
            WeekType::Exam
        } else {
            WeekType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeekType::Odd => "odd",
            WeekType::Even => "even",
            WeekType::Exam => "exam",
            WeekType::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, WeekType::Unknown)
    }
}

impl fmt::Display for WeekType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeekType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "odd" => Ok(WeekType::Odd),
            "even" => Ok(WeekType::Even),
            "exam" => Ok(WeekType::Exam),
            "unknown" => Ok(WeekType::Unknown),
            other => Err(format!("unknown week type '{other}'")),
        }
    }
}

/// One lesson at the intersection of a date/time row and a group column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LessonRecord {
    pub group_name: String,
    pub lesson_date: NaiveDate,
    pub time: String,
    pub subject: String,
    pub teacher: String,
    pub location: String,
    pub week_type: WeekType,
    pub faculty: String,
    pub course: String,
}

impl LessonRecord {
    /// Ordering key used when comparing two ingestion passes.
    pub fn sort_key(&self) -> (NaiveDate, &str, &str, &str, &str) {
        (
            self.lesson_date,
            self.group_name.as_str(),
            self.time.as_str(),
            self.subject.as_str(),
            self.teacher.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_token_wins_over_even_substring() {
        assert_eq!(WeekType::from_filename("Нечетная неделя_1 курс.xls"), WeekType::Odd);
        assert_eq!(WeekType::from_filename("нечёт.xlsx"), WeekType::Odd);
        assert_eq!(WeekType::from_filename("Четная неделя.xls"), WeekType::Even);
    }

    #[test]
    fn credit_week_files_stay_exam() {
        assert_eq!(
            WeekType::from_filename("Промежуточная аттестация_расписание зачетов.xls"),
            WeekType::Exam
        );
    }

    #[test]
    fn week_type_parses_its_own_labels() {
        for wt in [WeekType::Odd, WeekType::Even, WeekType::Exam, WeekType::Unknown] {
            assert_eq!(wt.as_str().parse::<WeekType>().unwrap(), wt);
        }
        assert!("weekly".parse::<WeekType>().is_err());
    }
}
