//! Portal session handling
//!
//! A `Session` owns the browser for one run. It starts unauthenticated, becomes
//! authenticated through `login`, and is closed by `logout`, which the caller
//! invokes on every exit path.

pub mod heviton;
pub mod outcome;

pub use heviton::Endpoints;
pub use outcome::{LoginOutcome, LoginSnapshot};

use crate::browser::{Browser, RenderWait};
use crate::error::{BrowserError, LoginError};
use crate::models::{Credentials, SessionState};
use std::sync::Arc;

/// Bounds for waiting on the login redirect
#[derive(Debug, Clone, Copy)]
pub struct LoginTiming {
    /// Settle after loading the login page
    pub page_settle: RenderWait,
    pub poll_interval: RenderWait,
    pub poll_attempts: u32,
    /// Settle before checking for the alert overlay
    pub popup_settle: RenderWait,
}

impl LoginTiming {
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            page_settle: RenderWait::Immediate,
            poll_interval: RenderWait::Immediate,
            poll_attempts: 1,
            popup_settle: RenderWait::Immediate,
        }
    }
}

pub struct Session {
    browser: Option<Arc<dyn Browser>>,
    endpoints: Endpoints,
    state: SessionState,
}

impl Session {
    pub fn new(browser: Arc<dyn Browser>, endpoints: Endpoints) -> Self {
        Self {
            browser: Some(browser),
            endpoints,
            state: SessionState::Unauthenticated,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// The live browser, for page extraction
    pub fn browser(&self) -> Result<&dyn Browser, BrowserError> {
        self.browser.as_deref().ok_or(BrowserError::Closed)
    }

    /// Submit credentials and classify the result
    pub async fn login(
        &mut self,
        creds: &Credentials,
        timing: &LoginTiming,
    ) -> Result<(), LoginError> {
        let browser = self.browser()?;

        let login_url = self.endpoints.login_page();
        tracing::info!("Opening login page: {}", login_url);
        browser.goto(&login_url).await?;
        timing.page_settle.settle().await;

        browser.fill(heviton::IDENTIFIER_INPUT_ID, &creds.identifier).await?;
        tracing::debug!("Identifier entered: {}", creds.identifier);
        browser.fill(heviton::SECRET_INPUT_ID, &creds.secret).await?;
        browser.click(heviton::SUBMIT_BUTTON).await?;
        tracing::info!("Login form submitted");

        let url = wait_for_redirect(browser, timing).await?;
        tracing::debug!("URL after login: {}", url);

        timing.popup_settle.settle().await;
        let snapshot = LoginSnapshot {
            popup_text: popup_text(browser).await,
            url,
            page_source: browser.page_source().await?,
        };

        match outcome::decide(&snapshot) {
            LoginOutcome::Authenticated(signal) => {
                tracing::info!("Login successful ({})", signal);
                self.state = SessionState::Authenticated;
                Ok(())
            }
            LoginOutcome::Rejected(failure) => {
                tracing::error!("Login failed: {}", failure);
                Err(failure.into())
            }
        }
    }

    /// Log out if authenticated, then release the browser. Safe to call repeatedly.
    pub async fn logout(&mut self) {
        if let Some(browser) = self.browser.take() {
            if self.state == SessionState::Authenticated {
                match browser.goto(&self.endpoints.logout()).await {
                    Ok(()) => tracing::info!("Logged out"),
                    Err(e) => tracing::warn!("Logout failed: {}", e),
                }
            }
            if let Err(e) = browser.quit().await {
                tracing::warn!("Failed to close browser: {}", e);
            }
        }
        self.state = SessionState::Closed;
    }
}

/// Poll the URL until it leaves the processing endpoint, up to `poll_attempts` times
async fn wait_for_redirect(
    browser: &dyn Browser,
    timing: &LoginTiming,
) -> Result<String, BrowserError> {
    let mut url = browser.current_url().await?;
    for _ in 0..timing.poll_attempts {
        timing.poll_interval.settle().await;
        url = browser.current_url().await?;
        if !url.contains(heviton::PROCESSING_MARKER) {
            break;
        }
    }
    Ok(url)
}

async fn popup_text(browser: &dyn Browser) -> Option<String> {
    let overlay_visible = browser
        .displayed_texts(heviton::POPUP_OVERLAY)
        .await
        .map(|found| !found.is_empty())
        .unwrap_or(false);
    if !overlay_visible {
        return None;
    }
    browser
        .displayed_texts(heviton::POPUP_TEXT)
        .await
        .ok()?
        .into_iter()
        .find(|text| !text.trim().is_empty())
}
