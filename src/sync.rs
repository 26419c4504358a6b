use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use std::path::Path;
use tracing::{error, info, instrument, warn};

use crate::config::SyncConfig;
use crate::crawler::{Portal, TimetableCrawler};
use crate::ingest::SpreadsheetIngestor;
use crate::persistence::{ReplaceOutcome, ScheduleStore};
use crate::snapshot::SnapshotHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Committed { lessons: usize, files: usize },
    /// Crawl or parse produced nothing; the stored schedule is untouched.
    NothingParsed { files: usize },
    CrawlFailed(String),
    StoreFailed(String),
    AlreadyRunning,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Committed { .. })
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncOutcome::Committed { lessons, files } => {
                write!(f, "committed {lessons} lessons from {files} files")
            }
            SyncOutcome::NothingParsed { files } => {
                write!(f, "nothing parsed from {files} files; schedule unchanged")
            }
            SyncOutcome::CrawlFailed(msg) => write!(f, "crawl failed: {msg}"),
            SyncOutcome::StoreFailed(msg) => write!(f, "store failed: {msg}"),
            SyncOutcome::AlreadyRunning => write!(f, "a sync is already running"),
        }
    }
}

/// Crawl, parse and commit as one unit. At most one run is active per
/// pipeline; a second caller gets [`SyncOutcome::AlreadyRunning`].
pub struct SyncPipeline {
    config: SyncConfig,
    snapshot: SnapshotHandle,
    running: Mutex<()>,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig) -> Self {
        Self::with_snapshot(config, SnapshotHandle::new())
    }

    pub fn with_snapshot(config: SyncConfig, snapshot: SnapshotHandle) -> Self {
        Self {
            config,
            snapshot,
            running: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &SnapshotHandle {
        &self.snapshot
    }

    /// Full run against the configured portal and database.
    #[cfg(feature = "sqlite")]
    pub fn run_full_sync(&self) -> SyncOutcome {
        use crate::crawler::HttpPortal;
        use crate::persistence::sqlite::SqliteScheduleStore;

        let Some(_guard) = self.running.try_lock() else {
            warn!("sync requested while another run is active");
            return SyncOutcome::AlreadyRunning;
        };

        let portal = match HttpPortal::new(&self.config) {
            Ok(portal) => portal,
            Err(err) => return SyncOutcome::CrawlFailed(err.to_string()),
        };
        let store = match SqliteScheduleStore::new(self.config.database_path()) {
            Ok(store) => store,
            Err(err) => return SyncOutcome::StoreFailed(err.to_string()),
        };
        self.run_locked(portal, &store, Local::now().date_naive())
    }

    /// Same as a full run, with the page provider and store supplied.
    pub fn run_with<P: Portal, S: ScheduleStore>(
        &self,
        portal: P,
        store: &S,
        today: NaiveDate,
    ) -> SyncOutcome {
        let Some(_guard) = self.running.try_lock() else {
            warn!("sync requested while another run is active");
            return SyncOutcome::AlreadyRunning;
        };
        self.run_locked(portal, store, today)
    }

    /// Parses an existing download tree and commits it, skipping the crawl.
    pub fn ingest_directory<S: ScheduleStore>(
        &self,
        root: &Path,
        store: &S,
        today: NaiveDate,
    ) -> SyncOutcome {
        let Some(_guard) = self.running.try_lock() else {
            return SyncOutcome::AlreadyRunning;
        };
        let summary = SpreadsheetIngestor::new(today).ingest_tree(root);
        self.commit(&summary.lessons, summary.files_parsed + summary.files_skipped, store)
    }

    #[instrument(skip_all, fields(today = %today))]
    fn run_locked<P: Portal, S: ScheduleStore>(
        &self,
        portal: P,
        store: &S,
        today: NaiveDate,
    ) -> SyncOutcome {
        info!("starting full sync");
        let credentials = match self.config.require_credentials() {
            Ok(credentials) => credentials,
            Err(err) => {
                error!(error = %err, "cannot crawl without credentials");
                return SyncOutcome::CrawlFailed(err.to_string());
            }
        };

        let download_dir = self.config.download_dir();
        let crawler = TimetableCrawler::new(
            portal,
            credentials,
            self.config.timeouts.clone(),
            &download_dir,
            today,
        );
        let report = match crawler.run() {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "crawl aborted");
                return SyncOutcome::CrawlFailed(err.to_string());
            }
        };

        let files = report.files.len();
        if files == 0 {
            warn!("crawl downloaded no files; keeping the previous schedule");
            return SyncOutcome::NothingParsed { files };
        }

        let summary = SpreadsheetIngestor::new(today).ingest_tree(&download_dir);
        self.commit(&summary.lessons, files, store)
    }

    fn commit<S: ScheduleStore>(
        &self,
        lessons: &[crate::LessonRecord],
        files: usize,
        store: &S,
    ) -> SyncOutcome {
        match store.replace_lessons(lessons) {
            Ok(ReplaceOutcome::Replaced(count)) => {
                if let Err(err) = self.snapshot.reload(store) {
                    warn!(error = %err, "committed but failed to rebuild snapshot");
                }
                info!(lessons = count, files, "sync committed");
                SyncOutcome::Committed {
                    lessons: count,
                    files,
                }
            }
            Ok(ReplaceOutcome::SkippedEmpty) => {
                warn!(files, "no lessons parsed; keeping the previous schedule");
                SyncOutcome::NothingParsed { files }
            }
            Err(err) => {
                error!(error = %err, "failed to commit lessons");
                SyncOutcome::StoreFailed(err.to_string())
            }
        }
    }
}
