use super::{PersistenceError, PersistenceResult, ReplaceOutcome, ScheduleStore};
use crate::lesson::{LessonRecord, TEACHER_UNSPECIFIED, WeekType};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{Connection, Row, params};
use serde::Serialize;
use tracing::{debug, info};

const LESSON_COLUMNS: &str =
    "group_name, lesson_date, time, subject, teacher, location, week_type, faculty, course";

/// One row of the navigation structure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GroupPlacement {
    pub faculty: String,
    pub course: String,
    pub group_name: String,
}

pub struct SqliteScheduleStore {
    connection: Mutex<Connection>,
}

impl SqliteScheduleStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS schedule (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                faculty TEXT NOT NULL,
                course TEXT NOT NULL,
                group_name TEXT NOT NULL,
                week_type TEXT NOT NULL,
                lesson_date TEXT NOT NULL,
                time TEXT NOT NULL,
                subject TEXT NOT NULL,
                teacher TEXT NOT NULL,
                location TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_schedule_group_date
                ON schedule (group_name, lesson_date);
            CREATE INDEX IF NOT EXISTS idx_schedule_teacher_date
                ON schedule (teacher, lesson_date);
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn insert_lessons(
        &self,
        tx: &rusqlite::Transaction,
        lessons: &[LessonRecord],
    ) -> PersistenceResult<()> {
        tx.execute("DELETE FROM schedule", [])?;
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO schedule ({LESSON_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ))?;
        for lesson in lessons {
            stmt.execute(params![
                lesson.group_name,
                lesson.lesson_date.to_string(),
                lesson.time,
                lesson.subject,
                lesson.teacher,
                lesson.location,
                lesson.week_type.as_str(),
                lesson.faculty,
                lesson.course,
            ])?;
        }
        Ok(())
    }

    fn query_lessons(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> PersistenceResult<Vec<LessonRecord>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, raw_lesson)?;
        let mut lessons = Vec::new();
        for row in rows {
            lessons.push(row?.into_record()?);
        }
        Ok(lessons)
    }

    fn distinct_strings(&self, sql: &str) -> PersistenceResult<Vec<String>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for value in rows {
            out.push(value?);
        }
        Ok(out)
    }

    /// Lessons of one group on one day, ordered by time slot.
    pub fn lessons_for_group(
        &self,
        group_name: &str,
        date: NaiveDate,
    ) -> PersistenceResult<Vec<LessonRecord>> {
        self.query_lessons(
            &format!(
                "SELECT {LESSON_COLUMNS} FROM schedule \
                 WHERE group_name = ?1 AND lesson_date = ?2 ORDER BY time, id"
            ),
            params![group_name, date.to_string()],
        )
    }

    /// Lessons of one teacher on one day, ordered by time slot.
    pub fn lessons_for_teacher(
        &self,
        teacher: &str,
        date: NaiveDate,
    ) -> PersistenceResult<Vec<LessonRecord>> {
        self.query_lessons(
            &format!(
                "SELECT {LESSON_COLUMNS} FROM schedule \
                 WHERE teacher = ?1 AND lesson_date = ?2 ORDER BY time, id"
            ),
            params![teacher, date.to_string()],
        )
    }

    pub fn all_lessons(&self) -> PersistenceResult<Vec<LessonRecord>> {
        self.query_lessons(
            &format!("SELECT {LESSON_COLUMNS} FROM schedule ORDER BY id"),
            [],
        )
    }

    /// Distinct faculty/course/group triples.
    pub fn structure(&self) -> PersistenceResult<Vec<GroupPlacement>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT faculty, course, group_name FROM schedule \
             ORDER BY faculty, course, group_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(GroupPlacement {
                faculty: row.get(0)?,
                course: row.get(1)?,
                group_name: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn teachers(&self) -> PersistenceResult<Vec<String>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT teacher FROM schedule WHERE teacher != ?1 ORDER BY teacher",
        )?;
        let rows = stmt.query_map(params![TEACHER_UNSPECIFIED], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for value in rows {
            out.push(value?);
        }
        Ok(out)
    }

    pub fn courses(&self) -> PersistenceResult<Vec<String>> {
        self.distinct_strings("SELECT DISTINCT course FROM schedule ORDER BY course")
    }

    pub fn lesson_count(&self) -> PersistenceResult<usize> {
        let conn = self.connection.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM schedule", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl ScheduleStore for SqliteScheduleStore {
    fn replace_lessons(&self, lessons: &[LessonRecord]) -> PersistenceResult<ReplaceOutcome> {
        if lessons.is_empty() {
            info!("no lessons to store; keeping the previous schedule");
            return Ok(ReplaceOutcome::SkippedEmpty);
        }
        super::validate_lessons(lessons)?;

        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        self.insert_lessons(&tx, lessons)?;
        tx.commit()?;
        info!(lessons = lessons.len(), "replaced stored schedule");
        Ok(ReplaceOutcome::Replaced(lessons.len()))
    }

    fn load_lessons(&self) -> PersistenceResult<Vec<LessonRecord>> {
        let lessons = self.all_lessons()?;
        debug!(lessons = lessons.len(), "loaded stored schedule");
        Ok(lessons)
    }
}

struct RawLesson {
    group_name: String,
    lesson_date: String,
    time: String,
    subject: String,
    teacher: String,
    location: String,
    week_type: String,
    faculty: String,
    course: String,
}

fn raw_lesson(row: &Row<'_>) -> rusqlite::Result<RawLesson> {
    Ok(RawLesson {
        group_name: row.get(0)?,
        lesson_date: row.get(1)?,
        time: row.get(2)?,
        subject: row.get(3)?,
        teacher: row.get(4)?,
        location: row.get(5)?,
        week_type: row.get(6)?,
        faculty: row.get(7)?,
        course: row.get(8)?,
    })
}

impl RawLesson {
    fn into_record(self) -> PersistenceResult<LessonRecord> {
        let lesson_date = self.lesson_date.parse::<NaiveDate>().map_err(|err| {
            PersistenceError::InvalidData(format!(
                "stored date '{}' is not ISO-8601: {err}",
                self.lesson_date
            ))
        })?;
        let week_type = self.week_type.parse::<WeekType>().map_err(|_| {
            PersistenceError::InvalidData(format!("unknown week type '{}'", self.week_type))
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
