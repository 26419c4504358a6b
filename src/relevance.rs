use chrono::{Datelike, NaiveDate};
use tracing::{debug, info};

use crate::academic::{Semester, parse_semester_span};

const WEEK_FOLDER_TOKENS: [&str; 5] = ["неделя", "четная", "нечет", "аттестация", "сессия"];
const EXAM_TOKENS: [&str; 2] = ["аттестация", "сессия"];

fn normalize(label: &str) -> String {
    label.to_lowercase().replace('ё', "е")
}

/// Folder labels that look like a teaching week or an exam period.
pub fn is_week_folder_label(label: &str) -> bool {
    let label = normalize(label);
    WEEK_FOLDER_TOKENS.iter().any(|token| label.contains(token))
}

pub fn is_exam_period_label(label: &str) -> bool {
    let label = normalize(label);
    EXAM_TOKENS.iter().any(|token| label.contains(token))
}

/// The semester running on `today` and the year its academic year started.
pub fn current_semester(today: NaiveDate) -> (Semester, i32) {
    match today.month() {
        9..=12 => (Semester::Autumn, today.year()),
        1 => (Semester::Autumn, today.year() - 1),
        _ => (Semester::Spring, today.year() - 1),
    }
}

/// Regular week folders are always relevant. Exam-period folders are relevant
/// only when their semester and starting year match the running semester; an
/// exam label without a parseable semester span is rejected.
pub fn is_week_relevant(label: &str, today: NaiveDate) -> bool {
    if !is_exam_period_label(label) {
        return true;
    }

    let (semester, start_year) = current_semester(today);
    match parse_semester_span(label) {
        Some((number, label_start, _)) => {
            if number == semester.number() && label_start == start_year {
                debug!(label, "exam-period folder matches running semester");
                true
            } else {
                info!(label, "skipping stale exam-period folder");
                false
            }
        }
        None => {
            info!(label, "skipping exam-period folder without semester span");
            false
        }
    }
}
