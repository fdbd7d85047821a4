//! Heviton monitoring portal (monitoring.heviton.com)
//!
//! Endpoints, form selectors and the markers used to read the outcome of a
//! login. The portal has no API; everything here was read off its mobile pages.

pub const LOGIN_PAGE: &str = "/monitoring/login/login.do?ua=m&inType=web";
pub const LOGOUT: &str = "/monitoring/login/logoutProc.do";
pub const MONITORING_PAGE: &str = "/monitoring/status/monitoring.do?ua=m&inType=web";
pub const DEVICE_STATUS_PAGE: &str =
    "/monitoring/status/inverter.do?ua=m&inType=web&energyCode=501";
pub const HISTORY_PAGE: &str = "/monitoring/stat/history.do?ua=m&inType=web";
pub const STATISTICS_PAGE: &str =
    "/monitoring/stat/statistics.do?ua=m&inType=web&energyCode=501";

/// Present in the URL while the login form is being processed
pub const PROCESSING_MARKER: &str = "loginProc";

pub const IDENTIFIER_INPUT_ID: &str = "loginId";
pub const SECRET_INPUT_ID: &str = "password";
pub const SUBMIT_BUTTON: &str = "a.btn76.c1";

/// SweetAlert overlay the portal uses for login errors
pub const POPUP_OVERLAY: &str = ".swal-overlay";
pub const POPUP_TEXT: &str = ".swal-text";

pub const IDENTIFIER_NOT_FOUND_MARKER: &str = "ret=idNotFound";
pub const SECRET_MISMATCH_MARKER: &str = "ret=passNotEq";

/// Path fragments of pages only reachable after login
pub const AUTHENTICATED_PATHS: &[&str] = &["dashboard", "main.do", "/status/", "monitoring.do"];

/// Endpoint URLs for one portal deployment
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn login_page(&self) -> String {
        self.url(LOGIN_PAGE)
    }

    pub fn logout(&self) -> String {
        self.url(LOGOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let endpoints = Endpoints::new("https://monitoring.heviton.com/");
        assert_eq!(
            endpoints.login_page(),
            "https://monitoring.heviton.com/monitoring/login/login.do?ua=m&inType=web"
        );
        assert_eq!(
            endpoints.logout(),
            "https://monitoring.heviton.com/monitoring/login/logoutProc.do"
        );
    }
}
