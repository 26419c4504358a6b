#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;

use common::{d, lesson};
use timetable_sync::lesson::TEACHER_UNSPECIFIED;
use timetable_sync::{ScheduleSnapshot, ScheduleStore, SnapshotHandle, SqliteScheduleStore};

#[test]
fn snapshot_groups_by_faculty_and_course() {
    let mut ek = lesson("ЭК-101", d(2025, 9, 1), "08:30", "Экономика");
    ek.faculty = "ЭФ".into();
    ek.course = "1".into();
    ek.teacher = TEACHER_UNSPECIFIED.into();
    let lessons = vec![
        lesson("ПС-212", d(2025, 9, 1), "08:30", "Физика"),
        lesson("ПС-211", d(2025, 9, 1), "08:30", "Физика"),
        lesson("ПС-211", d(2025, 9, 2), "08:30", "Химия"),
        ek,
    ];

    let snapshot = ScheduleSnapshot::from_lessons(3, &lessons);
    assert_eq!(snapshot.version, 3);
    assert_eq!(
        snapshot.faculties["ФУПП"]["2"],
        vec!["ПС-211".to_string(), "ПС-212".to_string()]
    );
    assert_eq!(snapshot.faculties["ЭФ"]["1"], vec!["ЭК-101".to_string()]);
    assert_eq!(snapshot.teachers, vec!["Иванов И.И.".to_string()]);
    assert_eq!(snapshot.group_count(), 3);
    assert!(snapshot.has_group("ЭК-101"));
    assert!(!snapshot.has_group("ЭК-999"));
}

#[test]
fn reload_publishes_a_new_version_without_touching_readers() {
    let store = SqliteScheduleStore::in_memory().unwrap();
    let handle = SnapshotHandle::new();
    let initial = handle.current();
    assert_eq!(initial.version, 0);
    assert!(initial.faculties.is_empty());

    store
        .replace_lessons(&[lesson("ПС-211", d(2025, 9, 1), "08:30", "Физика")])
        .unwrap();
    let first = handle.reload(&store).unwrap();
    assert_eq!(first.version, 1);

    // a reader holding the old snapshot keeps its view
    assert!(initial.faculties.is_empty());
    assert!(Arc::ptr_eq(&handle.current(), &first));

    store
        .replace_lessons(&[lesson("ПС-311", d(2025, 9, 1), "08:30", "Сопромат")])
        .unwrap();
    let second = handle.clone().reload(&store).unwrap();
    assert_eq!(second.version, 2);
    assert!(first.has_group("ПС-211"));
    assert!(!second.has_group("ПС-211"));
    assert_eq!(handle.current().version, 2);
}
