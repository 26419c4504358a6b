use chrono::{Local, NaiveDateTime};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

use crate::lesson::{LessonRecord, TEACHER_UNSPECIFIED};
use crate::persistence::{PersistenceResult, ScheduleStore};

/// Navigation data derived from one committed lesson set. Never mutated
/// after construction; a reload produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleSnapshot {
    pub version: u64,
    pub loaded_at: NaiveDateTime,
    /// faculty → course → sorted group names
    pub faculties: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    pub teachers: Vec<String>,
}

impl ScheduleSnapshot {
    pub fn empty() -> Self {
        Self {
            version: 0,
            loaded_at: Local::now().naive_local(),
            faculties: BTreeMap::new(),
            teachers: Vec::new(),
        }
    }

    pub fn from_lessons(version: u64, lessons: &[LessonRecord]) -> Self {
        let mut tree: BTreeMap<String, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
        let mut teachers = BTreeSet::new();

        for lesson in lessons {
            tree.entry(lesson.faculty.clone())
                .or_default()
                .entry(lesson.course.clone())
                .or_default()
                .insert(lesson.group_name.clone());
            if lesson.teacher != TEACHER_UNSPECIFIED {
                teachers.insert(lesson.teacher.clone());
            }
        }

        let faculties = tree
            .into_iter()
            .map(|(faculty, courses)| {
                let courses = courses
                    .into_iter()
                    .map(|(course, groups)| (course, groups.into_iter().collect()))
                    .collect();
                (faculty, courses)
            })
            .collect();

        Self {
            version,
            loaded_at: Local::now().naive_local(),
            faculties,
            teachers: teachers.into_iter().collect(),
        }
    }

    pub fn group_count(&self) -> usize {
        self.faculties
            .values()
            .flat_map(|courses| courses.values())
            .map(Vec::len)
            .sum()
    }

    pub fn has_group(&self, group_name: &str) -> bool {
        self.faculties
            .values()
            .flat_map(|courses| courses.values())
            .any(|groups| groups.iter().any(|g| g == group_name))
    }
}

/// Shared pointer to the current snapshot. Readers clone the inner `Arc`
/// and keep a consistent view for as long as they hold it.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Arc<ScheduleSnapshot>>>,
}

impl Default for SnapshotHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(ScheduleSnapshot::empty()))),
        }
    }

    pub fn current(&self) -> Arc<ScheduleSnapshot> {
        Arc::clone(&self.inner.read())
    }

    /// Rebuilds from the store and swaps the result in.
    pub fn reload<S: ScheduleStore + ?Sized>(
        &self,
        store: &S,
    ) -> PersistenceResult<Arc<ScheduleSnapshot>> {
        let lessons = store.load_lessons()?;
        let mut guard = self.inner.write();
        let next = Arc::new(ScheduleSnapshot::from_lessons(guard.version + 1, &lessons));
        *guard = Arc::clone(&next);
        info!(
            version = next.version,
            faculties = next.faculties.len(),
            groups = next.group_count(),
            teachers = next.teachers.len(),
            "schedule snapshot reloaded"
        );
        Ok(next)
    }
}
