use chrono::NaiveDate;
use timetable_sync::relevance::current_semester;
use timetable_sync::{Semester, is_week_folder_label, is_week_relevant};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

const AUTUMN_EXAMS: &str = "Промежуточная аттестация за 1 семестр 2025-2026 учебного года";

#[test]
fn exam_folder_is_relevant_only_in_its_semester() {
    assert!(is_week_relevant(AUTUMN_EXAMS, d(2025, 12, 15)));
    assert!(!is_week_relevant(AUTUMN_EXAMS, d(2024, 12, 15)));
}

#[test]
fn january_still_belongs_to_autumn_semester() {
    assert_eq!(current_semester(d(2026, 1, 20)), (Semester::Autumn, 2025));
    assert!(is_week_relevant(AUTUMN_EXAMS, d(2026, 1, 20)));
    assert!(!is_week_relevant(AUTUMN_EXAMS, d(2026, 2, 2)));
}

#[test]
fn spring_exams_match_from_february() {
    let label = "Сессия 2 семестр 2025-2026";
    assert_eq!(current_semester(d(2026, 2, 1)), (Semester::Spring, 2025));
    assert!(is_week_relevant(label, d(2026, 6, 10)));
    assert!(!is_week_relevant(label, d(2025, 12, 10)));
}

#[test]
fn regular_weeks_are_always_relevant() {
    assert!(is_week_relevant("Неделя 1 (нечетная)", d(2020, 3, 1)));
    assert!(is_week_relevant("Четная неделя", d(2030, 10, 1)));
}

#[test]
fn exam_label_without_semester_span_fails_closed() {
    assert!(!is_week_relevant("Промежуточная аттестация", d(2025, 12, 1)));
    assert!(!is_week_relevant("Сессия (архив)", d(2025, 12, 1)));
}

#[test]
fn non_week_folders_are_screened_out() {
    assert!(is_week_folder_label("Неделя 3"));
    assert!(is_week_folder_label("НЕЧЕТНАЯ"));
    assert!(is_week_folder_label(AUTUMN_EXAMS));
    assert!(!is_week_folder_label("Объявления"));
    assert!(!is_week_folder_label("Расписание звонков"));
}
