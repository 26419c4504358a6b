mod common;

use common::{d, lesson};
use timetable_sync::persistence::load_lessons_from_csv;
use timetable_sync::{
    LessonRecord, PersistenceError, WeekType, load_lessons_from_json, save_lessons_to_csv,
    save_lessons_to_json,
};
use tempfile::tempdir;

fn sample() -> Vec<LessonRecord> {
    let mut exam = lesson("ЭК-101", d(2026, 1, 12), "09:00", "Экзамен: Экономика");
    exam.week_type = WeekType::Exam;
    exam.location = "ауд. 5, корп. \"Б\"".into();
    vec![lesson("ПС-211", d(2025, 9, 1), "08:30-10:00", "Математика"), exam]
}

#[test]
fn json_export_reads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lessons.json");
    save_lessons_to_json(&sample(), &path).unwrap();

    let loaded = load_lessons_from_json(&path).unwrap();
    assert_eq!(loaded, sample());

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["lessons"][1]["week_type"], "exam");
    assert_eq!(raw["lessons"][0]["lesson_date"], "2025-09-01");
}

#[test]
fn csv_export_uses_table_columns() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lessons.csv");
    save_lessons_to_csv(&sample(), &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let header = text.lines().next().unwrap();
    assert_eq!(
        header,
        "faculty,course,group_name,week_type,lesson_date,time,subject,teacher,location"
    );

    assert_eq!(load_lessons_from_csv(&path).unwrap(), sample());
}

#[test]
fn json_with_invalid_record_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lessons.json");
    std::fs::write(
        &path,
        r#"{"exported_at":"2025-09-01T10:00:00","lessons":[{"group_name":"","lesson_date":"2025-09-01","time":"08:30","subject":"Математика","teacher":"Не указан","location":"Не указана","week_type":"odd","faculty":"ФУПП","course":"2"}]}"#,
    )
    .unwrap();

    let err = load_lessons_from_json(&path).unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidData(_)));
}
