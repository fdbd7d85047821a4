//! Page extraction
//!
//! Each page visit is navigate -> settle -> ordered strategies. Strategies
//! return `Option`s and the first present value wins; a value no strategy finds
//! is recorded as absent and the run carries on.

mod device;
mod history;
mod monitoring;

use crate::browser::{Browser, RenderWait};
use crate::error::BrowserError;
use crate::portal::{Endpoints, Session};
use serde_json::Value;

/// Waits applied around every page visit
#[derive(Debug, Clone, Copy)]
pub struct PageWaits {
    /// After navigation
    pub settle: RenderWait,
    /// Before in-page script evaluation, for data loaded by late API calls
    pub extra: RenderWait,
}

impl PageWaits {
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            settle: RenderWait::Immediate,
            extra: RenderWait::Immediate,
        }
    }
}

/// Reads pages through an authenticated session, one page at a time
pub struct Collector<'a> {
    browser: &'a dyn Browser,
    endpoints: &'a Endpoints,
    waits: PageWaits,
}

impl<'a> Collector<'a> {
    pub fn new(session: &'a Session, waits: PageWaits) -> Result<Self, BrowserError> {
        Ok(Self {
            browser: session.browser()?,
            endpoints: session.endpoints(),
            waits,
        })
    }

    async fn visit(&self, path: &str) -> Result<(), BrowserError> {
        let url = self.endpoints.url(path);
        tracing::debug!("Visiting {}", url);
        self.browser.goto(&url).await?;
        self.waits.settle.settle().await;
        Ok(())
    }
}

/// Script results as display text: non-blank strings and numbers only
pub(crate) fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_text() {
        assert_eq!(value_as_text(&json!(" 12.5 ")).as_deref(), Some("12.5"));
        assert_eq!(value_as_text(&json!(42)).as_deref(), Some("42"));
        assert_eq!(value_as_text(&json!("  ")), None);
        assert_eq!(value_as_text(&Value::Null), None);
        assert_eq!(value_as_text(&json!({"a": 1})), None);
    }
}
