use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::lesson::{LOCATION_UNSPECIFIED, TEACHER_UNSPECIFIED};

static LEADING_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s-]+").expect("leading dash regex"));
static TEACHER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[А-ЯЁ][а-яё\-]+\s+([А-ЯЁ]\.\s*[А-ЯЁ]\.|[А-ЯЁ][а-яё]+\s+[А-ЯЁ][а-яё]+)")
        .expect("teacher name regex")
});
static SUBGROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d\s*п/г)").expect("subgroup regex"));

const ACADEMIC_TITLES: [&str; 5] = [
    "преподаватель",
    "доцент",
    "профессор",
    "ассистент",
    "зав. кафедрой",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLesson {
    pub subject: String,
    pub teacher: String,
    pub location: String,
}

/// Title keyword (`доцент`, ...) or name shape (`Иванов И.И.`, `Иванов Иван Иванович`).
pub fn looks_like_teacher(line: &str) -> bool {
    let lower = line.to_lowercase();
    ACADEMIC_TITLES.iter().any(|title| lower.contains(title)) || TEACHER_NAME.is_match(line)
}

/// Splits a free-text lesson cell into subject, teacher and location.
///
/// The first line is the subject. The first later line that looks like a
/// teacher becomes the teacher; every other line joins the location. A
/// subgroup marker such as `1 п/г` anywhere in the cell is appended to the
/// subject. Blank cells yield `None`.
pub fn parse_lesson_cell(raw: &str) -> Option<ParsedLesson> {
    let lines: Vec<String> = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| LEADING_DASH.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    let (first, rest) = lines.split_first()?;
    let mut subject = first.clone();
    let mut teacher: Option<&str> = None;
    let mut location_parts: Vec<&str> = Vec::new();

    for line in rest {
        if teacher.is_none() {
            if line.to_lowercase() == TEACHER_UNSPECIFIED.to_lowercase() {
                continue;
            }
            if looks_like_teacher(line) {
                teacher = Some(line);
                continue;
            }
        }
        location_parts.push(line);
    }

    if let Some(caps) = SUBGROUP.captures(raw) {
        let marker: String = caps[1].chars().filter(|c| !c.is_whitespace()).collect();
        subject.push_str(&format!(" ({marker})"));
    }

    let location = if location_parts.is_empty() {
        LOCATION_UNSPECIFIED.to_string()
    } else {
        location_parts.join(" ")
    };

    Some(ParsedLesson {
        subject,
        teacher: teacher.unwrap_or(TEACHER_UNSPECIFIED).to_string(),
        location,
    })
}
