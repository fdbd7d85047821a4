//! Configuration management
//!
//! Settings are layered: built-in defaults, then the first TOML file found on the
//! search path, then `HEVITON_<SECTION>__<KEY>` environment variables, and finally
//! the flat environment names the deployment has always used (`HEVITON_USER_ID`,
//! `JANDI_WEBHOOK_URL`, ...).

use crate::error::ConfigError;
use crate::models::Credentials;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub portal: PortalConfig,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub jandi: JandiConfig,

    #[serde(default)]
    pub sheets: SheetsConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Clone)]
pub struct PortalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub user_id: String,

    #[serde(default)]
    pub password: String,

    /// WebDriver (chromedriver) endpoint
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_true")]
    pub headless: bool,
}

impl std::fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalConfig")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("password", &"***")
            .field("webdriver_url", &self.webdriver_url)
            .field("headless", &self.headless)
            .finish()
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_id: String::new(),
            password: String::new(),
            webdriver_url: default_webdriver_url(),
            headless: true,
        }
    }
}

/// Waits and bounds used while driving the portal
#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    /// Settle delay after each page navigation, in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Additional delay before in-page script evaluation
    #[serde(default = "default_settle_ms")]
    pub extra_settle_ms: u64,

    #[serde(default = "default_recent_days")]
    pub recent_days: usize,

    #[serde(default = "default_login_poll_ms")]
    pub login_poll_ms: u64,

    #[serde(default = "default_login_poll_attempts")]
    pub login_poll_attempts: u32,

    #[serde(default = "default_popup_settle_ms")]
    pub popup_settle_ms: u64,

    #[serde(default = "default_element_timeout")]
    pub element_timeout_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            extra_settle_ms: default_settle_ms(),
            recent_days: default_recent_days(),
            login_poll_ms: default_login_poll_ms(),
            login_poll_attempts: default_login_poll_attempts(),
            popup_settle_ms: default_popup_settle_ms(),
            element_timeout_secs: default_element_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct JandiConfig {
    #[serde(default)]
    pub webhook_url: String,
}

#[derive(Deserialize, Clone)]
pub struct SheetsConfig {
    #[serde(default)]
    pub spreadsheet_id: String,

    /// Service account JSON, inline
    #[serde(default)]
    pub credentials_json: String,

    /// Service account JSON, as a file path (used when `credentials_json` is empty)
    #[serde(default)]
    pub credentials_file: String,

    #[serde(default = "default_daily_sheet")]
    pub daily_sheet: String,

    #[serde(default = "default_weekly_sheet")]
    pub weekly_sheet: String,

    #[serde(default = "default_monthly_sheet")]
    pub monthly_sheet: String,
}

impl std::fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("credentials_json", &(!self.credentials_json.is_empty()))
            .field("credentials_file", &self.credentials_file)
            .field("daily_sheet", &self.daily_sheet)
            .field("weekly_sheet", &self.weekly_sheet)
            .field("monthly_sheet", &self.monthly_sheet)
            .finish()
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            credentials_json: String::new(),
            credentials_file: String::new(),
            daily_sheet: default_daily_sheet(),
            weekly_sheet: default_weekly_sheet(),
            monthly_sheet: default_monthly_sheet(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; empty disables file logging
    #[serde(default)]
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://monitoring.heviton.com".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_true() -> bool {
    true
}

fn default_settle_ms() -> u64 {
    3000
}

fn default_recent_days() -> usize {
    5
}

fn default_login_poll_ms() -> u64 {
    500
}

fn default_login_poll_attempts() -> u32 {
    20
}

fn default_popup_settle_ms() -> u64 {
    1000
}

fn default_element_timeout() -> u64 {
    15
}

fn default_daily_sheet() -> String {
    "일별".to_string()
}

fn default_weekly_sheet() -> String {
    "주별".to_string()
}

fn default_monthly_sheet() -> String {
    "월별".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Service account material plus where to write
#[derive(Clone)]
pub struct SheetsCredentials {
    pub spreadsheet_id: String,
    pub service_account_json: String,
}

impl Config {
    /// Load configuration from `explicit` or the first config file on the search path,
    /// then apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                })
            }
            Some(path) => Some(path.to_path_buf()),
            None => search_paths().into_iter().find(|p| p.exists()),
        };

        let mut builder = config::Config::builder();
        match &path {
            Some(path) => {
                tracing::debug!("Loading config from: {}", path.display());
                builder = builder.add_source(
                    config::File::from(path.as_path()).format(config::FileFormat::Toml),
                );
            }
            None => tracing::debug!("No config file found, using defaults"),
        }
        builder = builder.add_source(
            config::Environment::with_prefix("HEVITON")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: Config = builder.build()?.try_deserialize()?;
        cfg.apply_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Parse a TOML document on its own, without files or environment
    #[cfg(test)]
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?)
    }

    /// Apply the flat environment names; empty values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HEVITON_BASE_URL") {
            self.portal.base_url = v;
        }
        if let Some(v) = get("HEVITON_USER_ID") {
            self.portal.user_id = v;
        }
        if let Some(v) = get("HEVITON_PASSWORD") {
            self.portal.password = v;
        }
        if let Some(v) = get("JANDI_WEBHOOK_URL") {
            self.jandi.webhook_url = v;
        }
        if let Some(v) = get("GOOGLE_SHEETS_CREDENTIALS") {
            self.sheets.credentials_json = v;
        }
        if let Some(v) = get("GOOGLE_SHEETS_SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = v;
        }
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        if self.portal.user_id.is_empty() || self.portal.password.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok(Credentials {
            identifier: self.portal.user_id.clone(),
            secret: self.portal.password.clone(),
        })
    }

    pub fn webhook_url(&self) -> Result<&str, ConfigError> {
        if self.jandi.webhook_url.trim().is_empty() {
            return Err(ConfigError::MissingWebhookUrl);
        }
        Ok(&self.jandi.webhook_url)
    }

    /// Spreadsheet access, or `None` when recording is not set up
    pub fn sheets_credentials(&self) -> Result<Option<SheetsCredentials>, ConfigError> {
        if self.sheets.spreadsheet_id.is_empty() {
            return Ok(None);
        }

        let service_account_json = if !self.sheets.credentials_json.trim().is_empty() {
            self.sheets.credentials_json.clone()
        } else if !self.sheets.credentials_file.is_empty() {
            std::fs::read_to_string(&self.sheets.credentials_file).map_err(|source| {
                ConfigError::Read {
                    path: self.sheets.credentials_file.clone(),
                    source,
                }
            })?
        } else {
            return Ok(None);
        };

        Ok(Some(SheetsCredentials {
            spreadsheet_id: self.sheets.spreadsheet_id.clone(),
            service_account_json,
        }))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http.connect_timeout)
    }
}

fn search_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("config.toml"),
        PathBuf::from("heviton/config.toml"),
        dirs::home_dir()
            .map(|h| h.join(".config/heviton/config.toml"))
            .unwrap_or_default(),
    ]
}
