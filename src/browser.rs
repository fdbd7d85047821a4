//! Browser automation seam
//!
//! Everything the login handler and page extractors need from a browser goes
//! through the `Browser` trait. The production implementation drives Chrome over
//! WebDriver with thirtyfour.

use crate::error::BrowserError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thirtyfour::prelude::*;

const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

/// Operations on one live browser context
#[async_trait]
pub trait Browser: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn page_source(&self) -> Result<String, BrowserError>;

    /// Evaluate a script in the page and return its value (`Value::Null` for undefined)
    async fn eval(&self, script: &str) -> Result<Value, BrowserError>;

    /// Type `text` into the input with the given element id, replacing its content
    async fn fill(&self, element_id: &str, text: &str) -> Result<(), BrowserError>;

    async fn click(&self, css: &str) -> Result<(), BrowserError>;

    /// Texts of the elements matching `css` that are currently displayed
    async fn displayed_texts(&self, css: &str) -> Result<Vec<String>, BrowserError>;

    async fn quit(&self) -> Result<(), BrowserError>;
}

/// How long to wait for client-side rendering to settle.
///
/// The portal exposes no load-complete signal, so every wait in the crate goes
/// through this one primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderWait {
    Fixed(Duration),
    Immediate,
}

impl RenderWait {
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            RenderWait::Immediate
        } else {
            RenderWait::Fixed(Duration::from_millis(ms))
        }
    }

    pub async fn settle(&self) {
        if let RenderWait::Fixed(duration) = self {
            tokio::time::sleep(*duration).await;
        }
    }
}

/// Options for launching Chrome
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub webdriver_url: String,
    pub headless: bool,
    /// How long to wait for an input to appear before giving up
    pub element_timeout: Duration,
}

/// Chrome over WebDriver
pub struct WebDriverBrowser {
    driver: WebDriver,
    element_timeout: Duration,
}

impl WebDriverBrowser {
    pub async fn connect(options: &BrowserOptions) -> Result<Self, BrowserError> {
        let mut caps = DesiredCapabilities::chrome();

        let mut chrome_args = vec![
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--window-size=1920,1080",
            "--disable-notifications",
        ];
        if options.headless {
            chrome_args.push("--headless=new");
        }
        for arg in chrome_args {
            caps.add_arg(arg)?;
        }

        // Selectors below target the portal's mobile layout
        caps.add_experimental_option(
            "mobileEmulation",
            serde_json::json!({
                "deviceMetrics": {"width": 375, "height": 812, "pixelRatio": 3.0},
                "userAgent": MOBILE_USER_AGENT,
            }),
        )?;
        caps.add_experimental_option("excludeSwitches", vec!["enable-logging"])?;

        let driver = WebDriver::new(options.webdriver_url.as_str(), caps)
            .await
            .map_err(|e| BrowserError::Connect {
                url: options.webdriver_url.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!("Chrome WebDriver session started");

        Ok(Self {
            driver,
            element_timeout: options.element_timeout,
        })
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        Ok(self.driver.source().await?)
    }

    async fn eval(&self, script: &str) -> Result<Value, BrowserError> {
        let ret = self.driver.execute(script, Vec::new()).await?;
        Ok(ret.json().clone())
    }

    async fn fill(&self, element_id: &str, text: &str) -> Result<(), BrowserError> {
        let input = self
            .driver
            .query(By::Id(element_id))
            .wait(self.element_timeout, Duration::from_millis(500))
            .first()
            .await
            .map_err(|_| BrowserError::ElementNotFound(format!("#{}", element_id)))?;
        input.clear().await?;
        input.send_keys(text).await?;
        Ok(())
    }

    async fn click(&self, css: &str) -> Result<(), BrowserError> {
        let element = self
            .driver
            .find(By::Css(css))
            .await
            .map_err(|_| BrowserError::ElementNotFound(css.to_string()))?;
        element.click().await?;
        Ok(())
    }

    async fn displayed_texts(&self, css: &str) -> Result<Vec<String>, BrowserError> {
        let mut texts = Vec::new();
        for element in self.driver.find_all(By::Css(css)).await? {
            if element.is_displayed().await.unwrap_or(false) {
                texts.push(element.text().await.unwrap_or_default());
            }
        }
        Ok(texts)
    }

    async fn quit(&self) -> Result<(), BrowserError> {
        self.driver.clone().quit().await?;
        tracing::debug!("WebDriver session closed");
        Ok(())
    }
}
