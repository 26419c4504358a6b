use timetable_sync::cell::looks_like_teacher;
use timetable_sync::lesson::{LOCATION_UNSPECIFIED, TEACHER_UNSPECIFIED};
use timetable_sync::{WeekType, parse_lesson_cell};

#[test]
fn subject_teacher_and_room() {
    let parsed = parse_lesson_cell("Математика\nИванов И.И.\nАуд. 101").unwrap();
    assert_eq!(parsed.subject, "Математика");
    assert_eq!(parsed.teacher, "Иванов И.И.");
    assert_eq!(parsed.location, "Ауд. 101");
}

#[test]
fn subject_only_uses_placeholders() {
    let parsed = parse_lesson_cell("Программирование").unwrap();
    assert_eq!(parsed.subject, "Программирование");
    assert_eq!(parsed.teacher, TEACHER_UNSPECIFIED);
    assert_eq!(parsed.location, LOCATION_UNSPECIFIED);
}

#[test]
fn blank_cells_yield_nothing() {
    assert_eq!(parse_lesson_cell(""), None);
    assert_eq!(parse_lesson_cell("   \n \n"), None);
    assert_eq!(parse_lesson_cell("-"), None);
}

#[test]
fn location_lines_before_and_after_teacher_are_joined() {
    let parsed =
        parse_lesson_cell("Физика (лекция)\nкорп. Б\nдоцент Петров П.П.\nауд. 305").unwrap();
    assert_eq!(parsed.teacher, "доцент Петров П.П.");
    assert_eq!(parsed.location, "корп. Б ауд. 305");
}

#[test]
fn full_name_counts_as_teacher() {
    let parsed = parse_lesson_cell("История\nСидорова Анна Петровна\n201").unwrap();
    assert_eq!(parsed.teacher, "Сидорова Анна Петровна");
    assert_eq!(parsed.location, "201");
}

#[test]
fn leading_dashes_are_decoration() {
    let parsed = parse_lesson_cell("- Химия\n-- Кузнецов К.К.\n - лаб. 12").unwrap();
    assert_eq!(parsed.subject, "Химия");
    assert_eq!(parsed.teacher, "Кузнецов К.К.");
    assert_eq!(parsed.location, "лаб. 12");
}

#[test]
fn subgroup_marker_is_appended_to_subject() {
    let parsed = parse_lesson_cell("Английский язык 1 п/г\nпреподаватель Смит Д.\nауд. 4").unwrap();
    assert_eq!(parsed.subject, "Английский язык 1 п/г (1п/г)");
    assert_eq!(parsed.teacher, "преподаватель Смит Д.");
}

#[test]
fn unspecified_teacher_line_is_not_a_location() {
    let parsed = parse_lesson_cell("Философия\nНе указан\nауд. 7").unwrap();
    assert_eq!(parsed.teacher, TEACHER_UNSPECIFIED);
    assert_eq!(parsed.location, "ауд. 7");
}

#[test]
fn teacher_shapes() {
    assert!(looks_like_teacher("Иванов И. И."));
    assert!(looks_like_teacher("ассистент кафедры"));
    assert!(looks_like_teacher("Зав. кафедрой Орлов"));
    assert!(!looks_like_teacher("Ауд. 101"));
    assert!(!looks_like_teacher("корп. Б"));
}

#[test]
fn week_type_from_filenames() {
    assert_eq!(WeekType::from_filename("Неделя 1 (нечетная) ФУПП.xls"), WeekType::Odd);
    assert_eq!(WeekType::from_filename("Неделя 2 (чётная).xlsx"), WeekType::Even);
    assert_eq!(WeekType::from_filename("Четная неделя.xls"), WeekType::Even);
    assert_eq!(WeekType::from_filename("Сессия 1 семестр.xls"), WeekType::Exam);
    assert_eq!(
        WeekType::from_filename("Промежуточная аттестация.xlsx"),
        WeekType::Exam
    );
    assert_eq!(WeekType::from_filename("Расписание звонков.xls"), WeekType::Unknown);
}
