//! Converter/inverter health from the device-status page

use super::Collector;
use crate::models::{DeviceStatus, Normalcy};
use crate::parser;
use crate::portal::heviton;

const ERROR_ELEMENTS: &str = ".error";
const ERROR_ICONS: &str = ".status.error, .status.off, .ico_off, .ico_error";

/// Phrases that only appear when the portal reports an actual fault. Bare words
/// like "에러" or "Error" also show up in ordinary UI copy.
const FAULT_PHRASES: &[&str] = &["에러 발생", "통신 오류"];

impl Collector<'_> {
    pub async fn device_status(&self) -> DeviceStatus {
        tracing::info!("Reading device status");

        if let Err(e) = self.visit(heviton::DEVICE_STATUS_PAGE).await {
            tracing::warn!("Device status page unavailable: {}", e);
            return DeviceStatus::default();
        }
        self.waits.extra.settle().await;

        let error_texts = self
            .browser
            .displayed_texts(ERROR_ELEMENTS)
            .await
            .unwrap_or_default();
        let error_icons = self
            .browser
            .displayed_texts(ERROR_ICONS)
            .await
            .map(|found| found.len())
            .unwrap_or(0);
        let source = self.browser.page_source().await.unwrap_or_default();

        let status = assess_device_page(&error_texts, error_icons, &source);
        tracing::info!(
            "Device status: {} ({} devices)",
            status.normalcy.label(),
            status.devices.len()
        );
        status
    }
}

/// Any displayed error element, displayed error icon or fault phrase makes the
/// status abnormal; otherwise it is normal.
pub fn assess_device_page(
    error_texts: &[String],
    error_icon_count: usize,
    source: &str,
) -> DeviceStatus {
    let fault_phrase = FAULT_PHRASES.iter().any(|p| source.contains(p));
    let abnormal = !error_texts.is_empty() || error_icon_count > 0 || fault_phrase;

    DeviceStatus {
        normalcy: if abnormal {
            Normalcy::Abnormal
        } else {
            Normalcy::Normal
        },
        error_messages: error_texts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        devices: parser::parse_device_entries(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{FakeBrowser, FakePage};
    use crate::portal::{Endpoints, Session};
    use crate::scrape::PageWaits;
    use std::sync::Arc;

    #[test]
    fn test_clean_page_is_normal() {
        let source = r#"<div class="inverter_box"><p class="name">INV-1</p><i class="status on"></i></div>
                        <p>Error log</p><p>에러 이력 보기</p>"#;
        let status = assess_device_page(&[], 0, source);
        assert_eq!(status.normalcy, Normalcy::Normal);
        assert_eq!(status.devices.len(), 1);
        assert!(status.error_messages.is_empty());
    }

    #[test]
    fn test_each_signal_flips_to_abnormal() {
        let texts = vec!["인버터 1 통신 두절".to_string()];
        let status = assess_device_page(&texts, 0, "");
        assert_eq!(status.normalcy, Normalcy::Abnormal);
        assert_eq!(status.error_messages, texts);

        assert_eq!(assess_device_page(&[], 2, "").normalcy, Normalcy::Abnormal);
        assert_eq!(
            assess_device_page(&[], 0, "<p>인버터 통신 오류</p>").normalcy,
            Normalcy::Abnormal
        );
    }

    #[test]
    fn test_blank_error_element_still_counts() {
        let status = assess_device_page(&["  ".to_string()], 0, "");
        assert_eq!(status.normalcy, Normalcy::Abnormal);
        assert!(status.error_messages.is_empty());
    }

    #[tokio::test]
    async fn test_device_status_from_page() {
        let page = FakePage::with_source("<div>ok</div>").displayed(".error", &["PCS fault"]);
        let fake = Arc::new(FakeBrowser::new().page("inverter.do", page));
        let session = Session::new(fake.clone(), Endpoints::new("https://portal.test"));
        let collector = Collector::new(&session, PageWaits::immediate()).unwrap();

        let status = collector.device_status().await;
        assert_eq!(status.normalcy, Normalcy::Abnormal);
        assert_eq!(status.error_messages, vec!["PCS fault"]);
    }

    #[tokio::test]
    async fn test_unreachable_page_is_unknown() {
        let fake = Arc::new(FakeBrowser::new().failing_goto("inverter.do"));
        let session = Session::new(fake.clone(), Endpoints::new("https://portal.test"));
        let collector = Collector::new(&session, PageWaits::immediate()).unwrap();

        assert_eq!(collector.device_status().await.normalcy, Normalcy::Unknown);
    }
}
