#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use chrono::NaiveDate;
use timetable_sync::config::Credentials;
use timetable_sync::crawler::{Download, FileLink, FolderLink, Portal, PortalError};
use timetable_sync::{LessonRecord, WeekType};

pub fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn credentials() -> Credentials {
    Credentials {
        login: "student".into(),
        password: "secret".into(),
    }
}

pub fn lesson(group: &str, date: NaiveDate, time: &str, subject: &str) -> LessonRecord {
    LessonRecord {
        group_name: group.into(),
        lesson_date: date,
        time: time.into(),
        subject: subject.into(),
        teacher: "Иванов И.И.".into(),
        location: "Ауд. 101".into(),
        week_type: WeekType::Odd,
        faculty: "ФУПП".into(),
        course: "2".into(),
    }
}

/// Writes a single-sheet workbook; empty strings leave the cell blank.
pub fn write_xlsx(path: &Path, rows: &[&[&str]]) {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book.get_sheet_mut(&0).unwrap();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            sheet
                .get_cell_mut(((c + 1) as u32, (r + 1) as u32))
                .set_value(*value);
        }
    }
    umya_spreadsheet::writer::xlsx::write(&book, path).unwrap();
}

pub fn xlsx_bytes(rows: &[&[&str]]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.xlsx");
    write_xlsx(&path, rows);
    std::fs::read(path).unwrap()
}

#[derive(Debug, Default, Clone)]
pub struct FakePage {
    pub folders: Vec<FolderLink>,
    pub files: Vec<FileLink>,
    pub folder_timeout: bool,
}

#[derive(Debug, Default)]
pub struct PortalLog {
    pub visited: Vec<String>,
    pub downloads: Vec<String>,
}

/// In-memory portal: pages keyed by URL, downloads served from `bodies`.
pub struct FakePortal {
    pub pages: HashMap<String, FakePage>,
    pub bodies: HashMap<String, Vec<u8>>,
    pub reject_login: bool,
    pub root: String,
    current: String,
    pub log: Rc<RefCell<PortalLog>>,
}

impl FakePortal {
    pub fn new(root: &str) -> Self {
        let mut pages = HashMap::new();
        pages.insert("home".to_string(), FakePage::default());
        pages.insert(root.to_string(), FakePage::default());
        Self {
            pages,
            bodies: HashMap::new(),
            reject_login: false,
            root: root.to_string(),
            current: "home".to_string(),
            log: Rc::new(RefCell::new(PortalLog::default())),
        }
    }

    pub fn page(&mut self, url: &str) -> &mut FakePage {
        self.pages.entry(url.to_string()).or_default()
    }

    pub fn folder(&mut self, parent: &str, label: &str, url: &str) -> &mut Self {
        self.page(parent).folders.push(FolderLink {
            label: label.into(),
            href: url.into(),
        });
        self.page(url);
        self
    }

    pub fn file(&mut self, parent: &str, url: &str, body: Vec<u8>) -> &mut Self {
        self.page(parent).files.push(FileLink {
            label: url.rsplit('/').next().unwrap_or(url).into(),
            href: url.into(),
        });
        self.bodies.insert(url.to_string(), body);
        self
    }

    fn current_page(&self) -> &FakePage {
        &self.pages[&self.current]
    }
}

impl Portal for FakePortal {
    fn login(&mut self, credentials: &Credentials) -> Result<(), PortalError> {
        if self.reject_login || credentials.password.is_empty() {
            return Err(PortalError::Login("bad credentials".into()));
        }
        Ok(())
    }

    fn open_schedule_root(&mut self) -> Result<(), PortalError> {
        let root = self.root.clone();
        self.goto(&root)
    }

    fn current_url(&self) -> String {
        self.current.clone()
    }

    fn goto(&mut self, url: &str) -> Result<(), PortalError> {
        if !self.pages.contains_key(url) {
            return Err(PortalError::Status {
                status: 404,
                url: url.to_string(),
            });
        }
        self.current = url.to_string();
        self.log.borrow_mut().visited.push(url.to_string());
        Ok(())
    }

    fn folder_links(&mut self, _wait: Duration) -> Result<Vec<FolderLink>, PortalError> {
        let page = self.current_page();
        if page.folder_timeout {
            return Err(PortalError::Timeout("folder listing".into()));
        }
        Ok(page.folders.clone())
    }

    fn file_links(&mut self, _wait: Duration) -> Result<Vec<FileLink>, PortalError> {
        let page = self.current_page();
        if page.files.is_empty() {
            return Err(PortalError::Timeout("file links".into()));
        }
        Ok(page.files.clone())
    }

    fn download(&mut self, link: &FileLink) -> Result<Download, PortalError> {
        let bytes = self
            .bodies
            .get(&link.href)
            .cloned()
            .ok_or_else(|| PortalError::Http(format!("no body for {}", link.href)))?;
        self.log.borrow_mut().downloads.push(link.href.clone());
        Ok(Download {
            suggested_filename: link.label.clone(),
            bytes,
        })
    }
}
