//! Error taxonomy
//!
//! Fatal configuration problems, categorized authentication failures, browser
//! command failures and non-fatal delivery failures each get their own type so
//! the run loop can decide what aborts and what only gets logged.

use thiserror::Error;

/// Missing or unreadable configuration. Always raised before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("portal credentials are not configured (set HEVITON_USER_ID and HEVITON_PASSWORD)")]
    MissingCredentials,

    #[error("webhook URL is not configured (set JANDI_WEBHOOK_URL)")]
    MissingWebhookUrl,

    #[error("spreadsheet credentials are not configured")]
    MissingSheetsCredentials,

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why the portal refused (or could not confirm) a login.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("identifier is not registered")]
    IdentifierNotFound,

    #[error("secret does not match")]
    SecretMismatch,

    #[error("portal alert: {0}")]
    Popup(String),

    #[error("unrecognized state after login (URL: {url})")]
    Unrecognized { url: String },
}

/// Failures talking to the browser-automation driver.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to connect to WebDriver at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("browser command failed: {0}")]
    Command(String),

    #[error("browser session is closed")]
    Closed,
}

impl From<thirtyfour::error::WebDriverError> for BrowserError {
    fn from(err: thirtyfour::error::WebDriverError) -> Self {
        BrowserError::Command(err.to_string())
    }
}

/// Anything that can make `Session::login` fail.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("login rejected: {0}")]
    Auth(#[from] AuthFailure),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Webhook or spreadsheet call failure. Logged, never retried, never fatal for a report run.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} responded {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("invalid service account credentials: {0}")]
    Credentials(String),

    #[error("unexpected response: {0}")]
    Response(String),
}
