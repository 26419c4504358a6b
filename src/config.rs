use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORTAL_URL: &str = "https://bb.usurt.ru/";
pub const DEFAULT_SCHEDULE_LINK: &str = r#"a[href*="xid-1859775_1"]"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing `{0}` env var")]
    Missing(&'static str),
    #[error("invalid value for `{name}`: {message}")]
    Invalid { name: &'static str, message: String },
}

#[derive(Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PortalTimeouts {
    /// Bound on waiting for a folder listing to appear.
    pub folder_search: Duration,
    /// Bound on waiting for file links to appear.
    pub file_search: Duration,
    /// Bound on a single page navigation or download.
    pub navigation: Duration,
}

impl Default for PortalTimeouts {
    fn default() -> Self {
        Self {
            folder_search: Duration::from_secs(10),
            file_search: Duration::from_secs(2),
            navigation: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub portal_url: String,
    pub schedule_link_selector: String,
    pub credentials: Option<Credentials>,
    pub data_dir: PathBuf,
    pub timeouts: PortalTimeouts,
    pub sync_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::with_data_dir("data")
    }
}

impl SyncConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            schedule_link_selector: DEFAULT_SCHEDULE_LINK.to_string(),
            credentials: None,
            data_dir: data_dir.into(),
            timeouts: PortalTimeouts::default(),
            sync_interval: Duration::from_secs(6 * 60 * 60),
        }
    }

    /// Reads configuration from the environment. Credentials stay optional
    /// here; [`SyncConfig::require_credentials`] enforces them for crawling.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::with_data_dir(
            env::var("TIMETABLE_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        );

        if let Ok(url) = env::var("PORTAL_URL") {
            config.portal_url = url;
        }
        if let Ok(selector) = env::var("PORTAL_SCHEDULE_LINK") {
            config.schedule_link_selector = selector;
        }

        // a half-set pair is kept so the missing half can be named later
        let login = env::var("PORTAL_LOGIN").unwrap_or_default();
        let password = env::var("PORTAL_PASSWORD").unwrap_or_default();
        if !login.is_empty() || !password.is_empty() {
            config.credentials = Some(Credentials { login, password });
        }

        if let Some(secs) = read_u64("PORTAL_FOLDER_TIMEOUT_SECS")? {
            config.timeouts.folder_search = Duration::from_secs(secs);
        }
        if let Some(secs) = read_u64("PORTAL_FILE_TIMEOUT_SECS")? {
            config.timeouts.file_search = Duration::from_secs(secs);
        }
        if let Some(secs) = read_u64("PORTAL_NAV_TIMEOUT_SECS")? {
            config.timeouts.navigation = Duration::from_secs(secs);
        }
        if let Some(hours) = read_u64("SYNC_INTERVAL_HOURS")? {
            if hours == 0 {
                return Err(ConfigError::Invalid {
                    name: "SYNC_INTERVAL_HOURS",
                    message: "interval must be at least one hour".to_string(),
                });
            }
            config.sync_interval = Duration::from_secs(hours * 60 * 60);
        }

        Ok(config)
    }

    pub fn require_credentials(&self) -> Result<&Credentials, ConfigError> {
        match &self.credentials {
            None => Err(ConfigError::Missing("PORTAL_LOGIN")),
            Some(credentials) if credentials.login.is_empty() => {
                Err(ConfigError::Missing("PORTAL_LOGIN"))
            }
            Some(credentials) if credentials.password.is_empty() => {
                Err(ConfigError::Missing("PORTAL_PASSWORD"))
            }
            Some(credentials) => Ok(credentials),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("schedule.db")
    }

    pub fn download_dir(&self) -> PathBuf {
        self.data_dir.join("schedules")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn read_u64(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| ConfigError::Invalid {
                name,
                message: err.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_credentials(login: &str, password: &str) -> SyncConfig {
        let mut config = SyncConfig::with_data_dir("data");
        config.credentials = Some(Credentials {
            login: login.to_string(),
            password: password.to_string(),
        });
        config
    }

    #[test]
    fn missing_half_is_named_from_the_config() {
        assert!(matches!(
            SyncConfig::with_data_dir("data").require_credentials(),
            Err(ConfigError::Missing("PORTAL_LOGIN"))
        ));
        assert!(matches!(
            with_credentials("student", "").require_credentials(),
            Err(ConfigError::Missing("PORTAL_PASSWORD"))
        ));
        assert!(matches!(
            with_credentials("", "secret").require_credentials(),
            Err(ConfigError::Missing("PORTAL_LOGIN"))
        ));
        let config = with_credentials("student", "secret");
        assert_eq!(config.require_credentials().unwrap().login, "student");
    }
}
