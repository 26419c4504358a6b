use super::{PersistenceError, PersistenceResult};
use crate::lesson::{LessonRecord, WeekType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

#[derive(Serialize, Deserialize)]
struct LessonExport {
    exported_at: chrono::NaiveDateTime,
    lessons: Vec<LessonRecord>,
}

pub fn save_lessons_to_json<P: AsRef<Path>>(
    lessons: &[LessonRecord],
    path: P,
) -> PersistenceResult<()> {
    super::validate_lessons(lessons)?;
    let export = LessonExport {
        exported_at: chrono::Local::now().naive_local(),
        lessons: lessons.to_vec(),
    };
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &export)?;
    Ok(())
}

pub fn load_lessons_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<LessonRecord>> {
    let file = File::open(path)?;
    let export: LessonExport = serde_json::from_reader(file)?;
    super::validate_lessons(&export.lessons)?;
    Ok(export.lessons)
}

/// Flat row written to CSV; column names match the database table.
#[derive(Serialize, Deserialize)]
struct LessonCsvRecord {
    faculty: String,
    course: String,
    group_name: String,
    week_type: String,
    lesson_date: String,
    time: String,
    subject: String,
    teacher: String,
    location: String,
}

impl From<&LessonRecord> for LessonCsvRecord {
    fn from(lesson: &LessonRecord) -> Self {
        Self {
            faculty: lesson.faculty.clone(),
            course: lesson.course.clone(),
            group_name: lesson.group_name.clone(),
            week_type: lesson.week_type.as_str().to_string(),
            lesson_date: lesson.lesson_date.format("%Y-%m-%d").to_string(),
            time: lesson.time.clone(),
            subject: lesson.subject.clone(),
            teacher: lesson.teacher.clone(),
            location: lesson.location.clone(),
        }
    }
}

impl LessonCsvRecord {
    fn into_lesson(self) -> PersistenceResult<LessonRecord> {
        let lesson_date = NaiveDate::parse_from_str(&self.lesson_date, "%Y-%m-%d").map_err(|err| {
            PersistenceError::InvalidData(format!("invalid date '{}': {err}", self.lesson_date))
        })?;
        let week_type = self.week_type.parse::<WeekType>().map_err(|_| {
            PersistenceError::InvalidData(format!("invalid week type '{}'", self.week_type))
        })?;
        Ok(LessonRecord {
            group_name: self.group_name,
            lesson_date,
            time: self.time,
            subject: self.subject,
            teacher: self.teacher,
            location: self.location,
            week_type,
            faculty: self.faculty,
            course: self.course,
        })
    }
}

pub fn save_lessons_to_csv<P: AsRef<Path>>(
    lessons: &[LessonRecord],
    path: P,
) -> PersistenceResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for lesson in lessons {
        writer.serialize(LessonCsvRecord::from(lesson))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_lessons_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<LessonRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut lessons = Vec::new();
    for record in reader.deserialize::<LessonCsvRecord>() {
        lessons.push(record?.into_lesson()?);
    }
    super::validate_lessons(&lessons)?;
    Ok(lessons)
}
