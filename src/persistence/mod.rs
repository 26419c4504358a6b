use crate::LessonRecord;
use serde_json::Error as SerdeJsonError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The stored set now holds exactly this many lessons.
    Replaced(usize),
    /// Nothing was written; the previous set is untouched.
    SkippedEmpty,
}

/// Durable home of the lesson table.
///
/// `replace_lessons` swaps the whole set atomically: readers see either the
/// previous set or the new one, and an empty input never clears the table.
pub trait ScheduleStore {
    fn replace_lessons(&self, lessons: &[LessonRecord]) -> PersistenceResult<ReplaceOutcome>;
    fn load_lessons(&self) -> PersistenceResult<Vec<LessonRecord>>;
}

pub fn validate_lessons(lessons: &[LessonRecord]) -> PersistenceResult<()> {
    for (idx, lesson) in lessons.iter().enumerate() {
        if lesson.group_name.trim().is_empty() {
            return Err(PersistenceError::InvalidData(format!(
                "lesson #{idx} has an empty group name"
            )));
        }
        if lesson.subject.trim().is_empty() {
            return Err(PersistenceError::InvalidData(format!(
                "lesson #{idx} for group {} on {} has an empty subject",
                lesson.group_name, lesson.lesson_date
            )));
        }
    }
    Ok(())
}

pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    load_lessons_from_csv, load_lessons_from_json, save_lessons_to_csv, save_lessons_to_json,
};
