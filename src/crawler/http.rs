use percent_encoding::percent_decode_str;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_DISPOSITION;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{Download, FileLink, FolderLink, Portal, PortalError};
use crate::config::{Credentials, SyncConfig};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static css selector")
}

static FOLDER_LINKS: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"tbody#listContainer_databody a[href*="action=frameset"]"#));
static FILE_LINKS: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"a[href$=".xls"], a[href$=".xlsx"]"#));
static CONTENT_FRAME: LazyLock<Selector> = LazyLock::new(|| {
    selector(r#"frame[name="content"], iframe[name="content"], frame#contentFrame, iframe#contentFrame"#)
});
static FORMS: LazyLock<Selector> = LazyLock::new(|| selector("form"));
static AGREE_FORM_MARKER: LazyLock<Selector> = LazyLock::new(|| selector("#agree_button"));
static PASSWORD_INPUT: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"input[type="password"]"#));
static FORM_INPUTS: LazyLock<Selector> = LazyLock::new(|| selector("input[name]"));

/// Portal session over plain HTTP: a cookie-carrying client plus the last
/// fetched page.
pub struct HttpPortal {
    client: Client,
    base_url: Url,
    schedule_link: Selector,
    current_url: Url,
    current_html: String,
}

impl HttpPortal {
    pub fn new(config: &SyncConfig) -> Result<Self, PortalError> {
        let base_url = Url::parse(&config.portal_url)
            .map_err(|_| PortalError::InvalidUrl(config.portal_url.clone()))?;
        let schedule_link = Selector::parse(&config.schedule_link_selector).map_err(|err| {
            PortalError::MissingElement(format!(
                "usable schedule link selector `{}` ({err:?})",
                config.schedule_link_selector
            ))
        })?;
        let client = Client::builder()
            .cookie_store(true)
            .timeout(config.timeouts.navigation)
            .build()
            .map_err(|err| PortalError::Http(err.to_string()))?;

        Ok(Self {
            client,
            current_url: base_url.clone(),
            base_url,
            schedule_link,
            current_html: String::new(),
        })
    }

    fn resolve(&self, base: &Url, href: &str) -> Result<Url, PortalError> {
        base.join(href)
            .map_err(|_| PortalError::InvalidUrl(href.to_string()))
    }

    fn get(&self, url: &Url, timeout: Option<Duration>) -> Result<Response, PortalError> {
        let mut request = self.client.get(url.clone());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().map_err(map_reqwest)?;
        check_status(response)
    }

    fn load(&mut self, url: Url) -> Result<(), PortalError> {
        let response = self.get(&url, None)?;
        self.current_url = response.url().clone();
        self.current_html = response.text().map_err(map_reqwest)?;
        debug!(url = %self.current_url, "loaded page");
        Ok(())
    }

    fn submit_form(
        &mut self,
        form_marker: &Selector,
        fill: impl Fn(&ElementRef<'_>) -> Vec<(String, String)>,
    ) -> Result<bool, PortalError> {
        let Some((action, fields)) = form_submission(&self.current_html, form_marker, fill) else {
            return Ok(false);
        };

        let target = self.resolve(&self.current_url, &action)?;
        let response = self
            .client
            .post(target)
            .form(&fields)
            .send()
            .map_err(map_reqwest)?;
        let response = check_status(response)?;
        self.current_url = response.url().clone();
        self.current_html = response.text().map_err(map_reqwest)?;
        Ok(true)
    }

    /// The document holding the listing: the current page, or its content
    /// frame when the page is a frameset.
    fn listing_document(&self, wait: Duration) -> Result<(Url, String), PortalError> {
        match content_frame_src(&self.current_html) {
            Some(src) => {
                let url = self.resolve(&self.current_url, &src)?;
                debug!(frame = %url, "following content frame");
                let response = self.get(&url, Some(wait))?;
                let final_url = response.url().clone();
                let body = response.text().map_err(map_reqwest)?;
                Ok((final_url, body))
            }
            None => Ok((self.current_url.clone(), self.current_html.clone())),
        }
    }

    fn links(
        &self,
        wait: Duration,
        selector: &Selector,
    ) -> Result<Vec<(String, String)>, PortalError> {
        let (base, html) = self.listing_document(wait)?;
        Ok(extract_links(&base, &html, selector))
    }
}

impl Portal for HttpPortal {
    fn login(&mut self, credentials: &Credentials) -> Result<(), PortalError> {
        self.load(self.base_url.clone())?;

        if self.submit_form(&AGREE_FORM_MARKER, named_inputs)? {
            debug!("accepted portal agreement");
        }

        let submitted =
            self.submit_form(&PASSWORD_INPUT, |form| login_fields(form, credentials))?;
        if !submitted {
            return Err(PortalError::MissingElement("login form".to_string()));
        }
        if shows_login_form(&self.current_html) {
            return Err(PortalError::Login(
                "portal answered with the login form again".to_string(),
            ));
        }
        info!(url = %self.current_url, "portal session established");
        Ok(())
    }

    fn open_schedule_root(&mut self) -> Result<(), PortalError> {
        let href = Html::parse_document(&self.current_html)
            .select(&self.schedule_link)
            .find_map(|anchor| anchor.value().attr("href").map(str::to_string))
            .ok_or_else(|| PortalError::MissingElement("timetable root link".to_string()))?;
        let url = self.resolve(&self.current_url, &href)?;
        self.load(url)
    }

    fn current_url(&self) -> String {
        self.current_url.to_string()
    }

    fn goto(&mut self, url: &str) -> Result<(), PortalError> {
        let url = self.resolve(&self.current_url, url)?;
        self.load(url)
    }

    fn folder_links(&mut self, wait: Duration) -> Result<Vec<FolderLink>, PortalError> {
        Ok(self
            .links(wait, &FOLDER_LINKS)?
            .into_iter()
            .map(|(label, href)| FolderLink { label, href })
            .collect())
    }

    fn file_links(&mut self, wait: Duration) -> Result<Vec<FileLink>, PortalError> {
        Ok(self
            .links(wait, &FILE_LINKS)?
            .into_iter()
            .map(|(label, href)| FileLink { label, href })
            .collect())
    }

    fn download(&mut self, link: &FileLink) -> Result<Download, PortalError> {
        let url = Url::parse(&link.href).map_err(|_| PortalError::InvalidUrl(link.href.clone()))?;
        let response = self.get(&url, None)?;
        let suggested_filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition)
            .or_else(|| filename_from_url(response.url()))
            .unwrap_or_else(|| link.label.clone());
        let bytes = response.bytes().map_err(map_reqwest)?.to_vec();
        debug!(filename = %suggested_filename, size = bytes.len(), "downloaded file");
        Ok(Download {
            suggested_filename,
            bytes,
        })
    }
}

/// Action and field list of the first form that contains `marker`.
fn form_submission(
    html: &str,
    marker: &Selector,
    fill: impl Fn(&ElementRef<'_>) -> Vec<(String, String)>,
) -> Option<(String, Vec<(String, String)>)> {
    let document = Html::parse_document(html);
    let form = document
        .select(&FORMS)
        .find(|form| form.select(marker).next().is_some())?;
    let action = form.value().attr("action").unwrap_or("").to_string();
    Some((action, fill(&form)))
}

fn named_inputs(form: &ElementRef<'_>) -> Vec<(String, String)> {
    form.select(&FORM_INPUTS)
        .filter_map(|input| {
            let element = input.value();
            Some((
                element.attr("name")?.to_string(),
                element.attr("value").unwrap_or("").to_string(),
            ))
        })
        .collect()
}

/// The first text input gets the login, password inputs get the password,
/// hidden and other valued inputs are passed through unchanged.
fn login_fields(form: &ElementRef<'_>, credentials: &Credentials) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let mut login_filled = false;
    for input in form.select(&FORM_INPUTS) {
        let element = input.value();
        let Some(name) = element.attr("name") else {
            continue;
        };
        match element.attr("type").unwrap_or("text") {
            "password" => fields.push((name.to_string(), credentials.password.clone())),
            "text" if !login_filled => {
                login_filled = true;
                fields.push((name.to_string(), credentials.login.clone()));
            }
            "checkbox" | "radio" | "button" | "image" | "file" => {}
            _ => fields.push((
                name.to_string(),
                element.attr("value").unwrap_or("").to_string(),
            )),
        }
    }
    fields
}

fn shows_login_form(html: &str) -> bool {
    Html::parse_document(html)
        .select(&PASSWORD_INPUT)
        .next()
        .is_some()
}

fn content_frame_src(html: &str) -> Option<String> {
    Html::parse_document(html)
        .select(&CONTENT_FRAME)
        .find_map(|frame| frame.value().attr("src").map(str::to_string))
}

/// `(label, absolute href)` pairs in document order, first occurrence of
/// each href only.
fn extract_links(base: &Url, html: &str, selector: &Selector) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for anchor in document.select(selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(url) = base.join(href) else {
            warn!(href, "skipping unresolvable link");
            continue;
        };
        let url = url.to_string();
        if seen.insert(url.clone()) {
            let label = anchor.text().collect::<String>().trim().to_string();
            out.push((label, url));
        }
    }
    out
}

fn map_reqwest(err: reqwest::Error) -> PortalError {
    if err.is_timeout() {
        PortalError::Timeout(
            err.url()
                .map(|url| url.to_string())
                .unwrap_or_else(|| "response".to_string()),
        )
    } else {
        PortalError::Http(err.to_string())
    }
}

fn check_status(response: Response) -> Result<Response, PortalError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(PortalError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

/// `filename*=UTF-8''...` wins over a plain `filename="..."`.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for part in header.split(';').map(str::trim) {
        if let Some(encoded) = part.strip_prefix("filename*=") {
            let encoded = encoded.trim_matches('"');
            let value = encoded
                .split_once("''")
                .map(|(_, value)| value)
                .unwrap_or(encoded);
            let decoded = percent_decode_str(value).decode_utf8_lossy().into_owned();
            if !decoded.is_empty() {
                return Some(decoded);
            }
        } else if let Some(value) = part.strip_prefix("filename=") {
            let value = value.trim_matches('"').to_string();
            if !value.is_empty() {
                plain = Some(value);
            }
        }
    }
    plain
}

pub fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = percent_decode_str(segment).decode_utf8_lossy().into_owned();
    (!decoded.is_empty()).then_some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_prefers_extended_filename() {
        let header = r#"attachment; filename="raspisanie.xls"; filename*=UTF-8''%D0%9F%D0%A1.xls"#;
        assert_eq!(filename_from_disposition(header).as_deref(), Some("ПС.xls"));
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="week.xlsx""#).as_deref(),
            Some("week.xlsx")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    fn form_in(html: &str, marker: &Selector) -> (String, Vec<(String, String)>) {
        form_submission(html, marker, named_inputs).unwrap()
    }

    #[test]
    fn consent_form_is_optional() {
        let page = r#"<form action="/login"><input type="password" name="pw"></form>"#;
        assert!(form_submission(page, &AGREE_FORM_MARKER, named_inputs).is_none());

        let page = r#"
            <form action="/search"><input name="q" value=""></form>
            <form action="/agree"><input type="hidden" name="token" value="t1">
              <button id="agree_button">OK</button></form>"#;
        let (action, fields) = form_in(page, &AGREE_FORM_MARKER);
        assert_eq!(action, "/agree");
        assert_eq!(fields, vec![("token".to_string(), "t1".to_string())]);
    }

    #[test]
    fn login_form_keeps_hidden_inputs() {
        let page = r#"
            <form action="/webapps/login/" method="post">
              <input type="hidden" name="action" value="login">
              <input type="hidden" name="new_loc" value="">
              <input type="text" name="user_id">
              <input type="password" name="password">
              <input type="checkbox" name="remember" value="on">
              <input type="submit" name="login" value="Войти">
            </form>"#;
        let creds = Credentials {
            login: "student".into(),
            password: "secret".into(),
        };
        let (action, fields) =
            form_submission(page, &PASSWORD_INPUT, |form| login_fields(form, &creds)).unwrap();
        assert_eq!(action, "/webapps/login/");
        let pairs: Vec<(&str, &str)> = fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("action", "login"),
                ("new_loc", ""),
                ("user_id", "student"),
                ("password", "secret"),
                ("login", "Войти"),
            ]
        );
    }

    #[test]
    fn repeated_login_form_is_detected() {
        assert!(shows_login_form(
            r#"<form><input type="password" name="password"></form>"#
        ));
        assert!(!shows_login_form(r#"<a href="/courses">Курсы</a>"#));
    }

    #[test]
    fn content_frame_by_name_or_id() {
        let frameset = r#"<frameset><frame name="nav" src="/nav"><frame name="content" src="/listing?id=1"></frameset>"#;
        assert_eq!(content_frame_src(frameset).as_deref(), Some("/listing?id=1"));
        let iframe = r#"<body><iframe id="contentFrame" src="inner.html"></iframe></body>"#;
        assert_eq!(content_frame_src(iframe).as_deref(), Some("inner.html"));
        assert_eq!(content_frame_src("<body><p>plain</p></body>"), None);
    }

    #[test]
    fn links_are_absolute_and_deduplicated() {
        let base = Url::parse("https://portal/webapps/list?id=5").unwrap();
        let page = r#"
            <a href="/files/ПС 1 курс.xls"> ПС 1 курс </a>
            <a href="https://portal/files/ПС%201%20курс.xls">again</a>
            <a href="report.pdf">report</a>
            <a href="../ЭФ.xlsx">ЭФ</a>"#;
        let links = extract_links(&base, page, &FILE_LINKS);
        assert_eq!(
            links,
            vec![
                (
                    "ПС 1 курс".to_string(),
                    "https://portal/files/%D0%9F%D0%A1%201%20%D0%BA%D1%83%D1%80%D1%81.xls"
                        .to_string()
                ),
                ("ЭФ".to_string(), "https://portal/%D0%AD%D0%A4.xlsx".to_string()),
            ]
        );
    }

    #[test]
    fn url_basename_is_decoded() {
        let url = Url::parse("https://portal/bbcswebdav/xid-1_1/%D0%AD%D0%A4%201%20%D0%BA%D1%83%D1%80%D1%81.xls").unwrap();
        assert_eq!(filename_from_url(&url).as_deref(), Some("ЭФ 1 курс.xls"));
    }
}
