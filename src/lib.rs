pub mod academic;
pub mod calendar;
pub mod cell;
pub mod config;
pub mod crawler;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod ingest;
pub mod lesson;
pub mod persistence;
pub mod relevance;
pub mod snapshot;
pub mod sync;

pub use academic::{AcademicContext, Semester, resolve_academic_context};
pub use calendar::{DateConfidence, ResolvedDate, resolve_date, resolve_date_cell};
pub use cell::{ParsedLesson, parse_lesson_cell};
pub use config::{ConfigError, Credentials, SyncConfig};
pub use crawler::{
    CrawlError, CrawlReport, DownloadedFile, Portal, PortalError, TimetableCrawler,
};
pub use ingest::{IngestError, SpreadsheetIngestor};
pub use lesson::{LessonRecord, WeekType};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::{GroupPlacement, SqliteScheduleStore};
pub use persistence::{
    PersistenceError, PersistenceResult, ReplaceOutcome, ScheduleStore, load_lessons_from_csv,
    load_lessons_from_json, save_lessons_to_csv, save_lessons_to_json,
};
pub use relevance::{is_week_folder_label, is_week_relevant};
pub use snapshot::{ScheduleSnapshot, SnapshotHandle};
pub use sync::{SyncOutcome, SyncPipeline};
