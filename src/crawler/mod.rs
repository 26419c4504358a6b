use chrono::NaiveDate;
use kinded::Kinded;
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Credentials, PortalTimeouts};
use crate::ingest::FilePlacement;
use crate::lesson::COURSE_UNKNOWN;
use crate::relevance::{is_week_folder_label, is_week_relevant};

pub mod http;

pub use http::HttpPortal;

/// Download bucket for week folders that hold files without faculty sub-folders.
pub const GENERIC_FACULTY: &str = "Общее";

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("filename sanitizer regex"));

/// What a page provider can report back to the crawler.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("page has no {0}")]
    MissingElement(String),
    #[error("login rejected: {0}")]
    Login(String),
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
}

impl PortalError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PortalError::Timeout(_))
    }
}

/// Conditions that abort a whole crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("login failed: {0}")]
    Login(#[source] PortalError),
    #[error("failed to open the timetable root: {0}")]
    ScheduleRoot(#[source] PortalError),
    #[error("no relevant week folders found")]
    NoWeekFolders,
    #[error("download directory error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLink {
    pub label: String,
    /// Absolute URL.
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLink {
    pub label: String,
    /// Absolute URL.
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub suggested_filename: String,
    pub bytes: Vec<u8>,
}

/// One navigable page session against the timetable portal.
///
/// The crawler drives exactly one implementation at a time, one folder at a
/// time; implementations hold the session (cookies, current page) and
/// release it on drop.
pub trait Portal {
    fn login(&mut self, credentials: &Credentials) -> Result<(), PortalError>;
    /// Follows the timetable root link; the resulting page becomes the
    /// working page for the rest of the session.
    fn open_schedule_root(&mut self) -> Result<(), PortalError>;
    fn current_url(&self) -> String;
    fn goto(&mut self, url: &str) -> Result<(), PortalError>;
    /// Folder links in the listing of the current page.
    fn folder_links(&mut self, wait: std::time::Duration) -> Result<Vec<FolderLink>, PortalError>;
    /// `.xls`/`.xlsx` links in the listing of the current page.
    fn file_links(&mut self, wait: std::time::Duration) -> Result<Vec<FileLink>, PortalError>;
    fn download(&mut self, link: &FileLink) -> Result<Download, PortalError>;
}

/// A week folder that passed label screening, with its relevance verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekFolder {
    pub label: String,
    pub href: String,
    pub is_relevant: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub faculty: String,
    /// Course inferred from the saved path, as ingestion will see it.
    pub course: String,
    pub week: String,
    pub path: PathBuf,
}

#[derive(Debug, Default, Clone)]
pub struct CrawlReport {
    pub weeks_visited: Vec<String>,
    pub weeks_skipped: Vec<String>,
    pub files: Vec<DownloadedFile>,
    pub failed_downloads: usize,
}

/// Where the crawl is. Every state that sits inside a week keeps the queue
/// of weeks still to visit so the machine can return to the root.
#[derive(Debug, Kinded)]
#[kinded(kind = CrawlStep)]
pub enum CrawlState {
    LoggedOut,
    LoggedIn,
    AtWeekRoot {
        root_url: String,
        weeks: VecDeque<WeekFolder>,
    },
    InsideWeekFolder {
        root_url: String,
        weeks: VecDeque<WeekFolder>,
        week: WeekFolder,
    },
    InsideFacultyFolder {
        root_url: String,
        weeks: VecDeque<WeekFolder>,
        week: WeekFolder,
        faculty_list_url: String,
        faculties: VecDeque<FolderLink>,
        faculty: FolderLink,
        ordinal: usize,
    },
    Downloading {
        root_url: String,
        weeks: VecDeque<WeekFolder>,
        week: WeekFolder,
        faculty_list_url: Option<String>,
        faculties: VecDeque<FolderLink>,
        faculty: String,
        ordinal: usize,
    },
    Finished,
}

impl CrawlState {
    pub fn completed(&self) -> bool {
        matches!(self, CrawlState::Finished)
    }
}

/// Replaces characters that are not allowed in file or directory names.
/// Dot-only results (`.`, `..`) would leave the parent directory and come
/// back empty.
pub fn sanitize_path_segment(name: &str) -> String {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(name, "_").trim().to_string();
    if cleaned.chars().all(|c| c == '.') {
        String::new()
    } else {
        cleaned
    }
}

/// `<week label>_<original name>`, keeping identically named files from
/// different weeks apart.
pub fn prefixed_filename(week_label: &str, original: &str) -> String {
    let prefix = sanitize_path_segment(week_label);
    let original = sanitize_path_segment(original);
    if prefix.is_empty() {
        original
    } else {
        format!("{prefix}_{original}")
    }
}

/// Sequential, single-session crawl of the timetable folders into
/// `<download_root>/<faculty>/<week>_<file>`.
pub struct TimetableCrawler<'a, P: Portal> {
    portal: P,
    credentials: &'a Credentials,
    timeouts: PortalTimeouts,
    download_root: PathBuf,
    today: NaiveDate,
    report: CrawlReport,
}

impl<'a, P: Portal> TimetableCrawler<'a, P> {
    pub fn new(
        portal: P,
        credentials: &'a Credentials,
        timeouts: PortalTimeouts,
        download_root: impl Into<PathBuf>,
        today: NaiveDate,
    ) -> Self {
        Self {
            portal,
            credentials,
            timeouts,
            download_root: download_root.into(),
            today,
            report: CrawlReport::default(),
        }
    }

    /// Empties the download root so files from an earlier run never reach
    /// the parser.
    pub fn prepare_download_root(&self) -> Result<(), CrawlError> {
        if self.download_root.exists() {
            info!(path = %self.download_root.display(), "removing previous download tree");
            fs::remove_dir_all(&self.download_root)?;
        }
        fs::create_dir_all(&self.download_root)?;
        Ok(())
    }

    /// Drives the state machine to completion. The portal is dropped on
    /// every exit path.
    #[instrument(skip(self), fields(root = %self.download_root.display()))]
    pub fn run(mut self) -> Result<CrawlReport, CrawlError> {
        self.prepare_download_root()?;

        let mut state = CrawlState::LoggedOut;
        while !state.completed() {
            let old_step = state.kind();
            state = self.step(state)?;
            debug!(old_state = ?old_step, new_state = ?state.kind(), "crawler transitioned");
        }

        info!(
            weeks = self.report.weeks_visited.len(),
            files = self.report.files.len(),
            failed_downloads = self.report.failed_downloads,
            "crawl finished"
        );
        Ok(self.report)
    }

    pub fn step(&mut self, state: CrawlState) -> Result<CrawlState, CrawlError> {
        let next = match state {
            CrawlState::LoggedOut => {
                self.portal
                    .login(self.credentials)
                    .map_err(CrawlError::Login)?;
                info!("logged in to portal");
                CrawlState::LoggedIn
            }
            CrawlState::LoggedIn => {
                self.portal
                    .open_schedule_root()
                    .map_err(CrawlError::ScheduleRoot)?;
                let root_url = self.portal.current_url();
                let weeks = self.enumerate_weeks();
                if weeks.is_empty() {
                    error!("no relevant week folders on the timetable root");
                    return Err(CrawlError::NoWeekFolders);
                }
                CrawlState::AtWeekRoot { root_url, weeks }
            }
            CrawlState::AtWeekRoot {
                root_url,
                mut weeks,
            } => match weeks.pop_front() {
                None => CrawlState::Finished,
                Some(week) => {
                    info!(week = %week.label, "entering week folder");
                    let entered = self
                        .portal
                        .goto(&root_url)
                        .and_then(|_| self.portal.goto(&week.href));
                    match entered {
                        Ok(()) => {
                            self.report.weeks_visited.push(week.label.clone());
                            CrawlState::InsideWeekFolder {
                                root_url,
                                weeks,
                                week,
                            }
                        }
                        Err(err) => {
                            warn!(week = %week.label, error = %err, "could not open week folder");
                            self.report.weeks_skipped.push(week.label);
                            CrawlState::AtWeekRoot { root_url, weeks }
                        }
                    }
                }
            },
            CrawlState::InsideWeekFolder {
                root_url,
                weeks,
                week,
            } => {
                let faculty_list_url = self.portal.current_url();
                let mut faculties: VecDeque<FolderLink> =
                    self.search_folders().into_iter().collect();
                match faculties.pop_front() {
                    None => {
                        debug!(week = %week.label, "no faculty folders; files live in the week folder");
                        CrawlState::Downloading {
                            root_url,
                            weeks,
                            week,
                            faculty_list_url: None,
                            faculties,
                            faculty: GENERIC_FACULTY.to_string(),
                            ordinal: 0,
                        }
                    }
                    Some(first) => self.enter_faculty(
                        root_url,
                        weeks,
                        week,
                        faculty_list_url,
                        faculties,
                        first,
                        1,
                    ),
                }
            }
            CrawlState::InsideFacultyFolder {
                root_url,
                weeks,
                week,
                faculty_list_url,
                faculties,
                faculty,
                ordinal,
            } => {
                let name = faculty_directory_name(&faculty, &self.portal.current_url(), ordinal);
                info!(week = %week.label, faculty = %name, ordinal, "processing faculty folder");
                CrawlState::Downloading {
                    root_url,
                    weeks,
                    week,
                    faculty_list_url: Some(faculty_list_url),
                    faculties,
                    faculty: name,
                    ordinal,
                }
            }
            CrawlState::Downloading {
                root_url,
                weeks,
                week,
                faculty_list_url,
                mut faculties,
                faculty,
                ordinal,
            } => {
                self.download_listing(&week, &faculty)?;
                match (faculty_list_url, faculties.pop_front()) {
                    (Some(list_url), Some(next)) => {
                        // back to the list itself, not history-back
                        if let Err(err) = self.portal.goto(&list_url) {
                            warn!(error = %err, "could not return to faculty list");
                        }
                        self.enter_faculty(
                            root_url,
                            weeks,
                            week,
                            list_url,
                            faculties,
                            next,
                            ordinal + 1,
                        )
                    }
                    _ => CrawlState::AtWeekRoot { root_url, weeks },
                }
            }
            CrawlState::Finished => CrawlState::Finished,
        };
        Ok(next)
    }

    /// Navigates into a faculty folder; a failed navigation skips ahead to
    /// the next faculty, or back to the week root when none are left.
    #[allow(clippy::too_many_arguments)]
    fn enter_faculty(
        &mut self,
        root_url: String,
        weeks: VecDeque<WeekFolder>,
        week: WeekFolder,
        faculty_list_url: String,
        mut faculties: VecDeque<FolderLink>,
        mut faculty: FolderLink,
        mut ordinal: usize,
    ) -> CrawlState {
        loop {
            match self.portal.goto(&faculty.href) {
                Ok(()) => {
                    return CrawlState::InsideFacultyFolder {
                        root_url,
                        weeks,
                        week,
                        faculty_list_url,
                        faculties,
                        faculty,
                        ordinal,
                    };
                }
                Err(err) => {
                    warn!(faculty = %faculty.label, error = %err, "could not open faculty folder");
                    match faculties.pop_front() {
                        Some(next) => {
                            faculty = next;
                            ordinal += 1;
                        }
                        None => return CrawlState::AtWeekRoot { root_url, weeks },
                    }
                }
            }
        }
    }

    fn enumerate_weeks(&mut self) -> VecDeque<WeekFolder> {
        let mut seen = HashSet::new();
        let mut weeks = VecDeque::new();
        for link in self.search_folders() {
            let label = link.label.trim().to_string();
            if label.is_empty() || !is_week_folder_label(&label) || !seen.insert(label.clone()) {
                continue;
            }
            let is_relevant = is_week_relevant(&label, self.today);
            let folder = WeekFolder {
                label,
                href: link.href,
                is_relevant,
            };
            if folder.is_relevant {
                weeks.push_back(folder);
            } else {
                self.report.weeks_skipped.push(folder.label);
            }
        }
        info!(weeks = weeks.len(), "enumerated week folders");
        weeks
    }

    fn search_folders(&mut self) -> Vec<FolderLink> {
        match self.portal.folder_links(self.timeouts.folder_search) {
            Ok(links) => dedup_by_href(links),
            Err(err) if err.is_timeout() => {
                debug!("no folders appeared before the timeout");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "failed to list folders");
                Vec::new()
            }
        }
    }

    fn download_listing(&mut self, week: &WeekFolder, faculty: &str) -> Result<(), CrawlError> {
        let files = match self.portal.file_links(self.timeouts.file_search) {
            Ok(files) => files,
            Err(err) if err.is_timeout() => Vec::new(),
            Err(err) => {
                warn!(faculty, error = %err, "failed to list files");
                Vec::new()
            }
        };
        if files.is_empty() {
            debug!(faculty, "no spreadsheets in folder");
            return Ok(());
        }

        let save_dir = self.download_root.join(faculty);
        fs::create_dir_all(&save_dir)?;

        for link in files {
            match self.portal.download(&link) {
                Ok(download) => {
                    let filename = prefixed_filename(&week.label, &download.suggested_filename);
                    if filename.is_empty() {
                        warn!(url = %link.href, "download has no usable filename");
                        self.report.failed_downloads += 1;
                        continue;
                    }
                    let path = save_dir.join(&filename);
                    match write_download(&path, &download.bytes) {
                        Ok(()) => {
                            let course = path
                                .strip_prefix(&self.download_root)
                                .ok()
                                .and_then(FilePlacement::from_relative_path)
                                .map(|placement| placement.course)
                                .unwrap_or_else(|| COURSE_UNKNOWN.to_string());
                            self.report.files.push(DownloadedFile {
                                faculty: faculty.to_string(),
                                course,
                                week: week.label.clone(),
                                path,
                            });
                        }
                        Err(err) => {
                            warn!(path = %path.display(), error = %err, "failed to save download");
                            self.report.failed_downloads += 1;
                        }
                    }
                }
                Err(err) => {
                    warn!(url = %link.href, error = %err, "failed to download file");
                    self.report.failed_downloads += 1;
                }
            }
        }
        Ok(())
    }
}

fn write_download(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}

fn dedup_by_href(links: Vec<FolderLink>) -> Vec<FolderLink> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| !link.href.is_empty() && seen.insert(link.href.clone()))
        .collect()
}

/// Folder label when present, else the last decoded path segment of the
/// folder URL, else `Факультет_<n>`.
fn faculty_directory_name(link: &FolderLink, current_url: &str, ordinal: usize) -> String {
    let from_label = sanitize_path_segment(&link.label);
    if !from_label.is_empty() {
        return from_label;
    }
    let from_url = current_url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
        .map(|segment| {
            percent_encoding::percent_decode_str(segment)
                .decode_utf8_lossy()
                .into_owned()
        })
        .map(|segment| sanitize_path_segment(&segment))
        .unwrap_or_default();
    if !from_url.is_empty() && !from_url.contains('.') {
        return from_url;
    }
    format!("Факультет_{ordinal}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faculty_name_falls_back_to_url_then_ordinal() {
        let named = FolderLink {
            label: "ФУПП".into(),
            href: "https://portal/x".into(),
        };
        assert_eq!(faculty_directory_name(&named, "https://portal/x", 1), "ФУПП");

        let unnamed = FolderLink {
            label: "  ".into(),
            href: "https://portal/x".into(),
        };
        assert_eq!(
            faculty_directory_name(&unnamed, "https://portal/files/%D0%AD%D0%A4", 2),
            "ЭФ"
        );
        assert_eq!(
            faculty_directory_name(&unnamed, "https://portal/listContent.jsp?id=1", 3),
            "Факультет_3"
        );
    }

    #[test]
    fn prefix_is_sanitized() {
        assert_eq!(
            prefixed_filename("Неделя 1/2: нечетная", "ПС.xls"),
            "Неделя 1_2_ нечетная_ПС.xls"
        );
        assert_eq!(prefixed_filename("", "ПС.xls"), "ПС.xls");
    }

    #[test]
    fn dot_segments_are_treated_as_empty() {
        assert_eq!(sanitize_path_segment(".."), "");
        assert_eq!(sanitize_path_segment(" . "), "");
        assert_eq!(sanitize_path_segment("..."), "");
        assert_eq!(sanitize_path_segment("v1.2"), "v1.2");

        let dots = FolderLink {
            label: "..".into(),
            href: "https://portal/x".into(),
        };
        assert_eq!(
            faculty_directory_name(&dots, "https://portal/files/%D0%AD%D0%A4", 1),
            "ЭФ"
        );
        assert_eq!(faculty_directory_name(&dots, "https://portal/files/..", 4), "Факультет_4");
    }
}
