//! Jandi incoming-webhook notifier

use crate::error::DeliveryError;
use crate::http::HttpClient;
use crate::models::{DailyPoint, Normalcy, Report};
use crate::utils;
use chrono::{DateTime, Local};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Serialize;

const JANDI_ACCEPT: &str = "application/vnd.tosslab.jandi-v2+json";

const REPORT_COLOR: &str = "#F5A623";
const ERROR_COLOR: &str = "#E74C3C";
pub const DEFAULT_COLOR: &str = "#2ECC71";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectInfo {
    pub title: String,
    pub description: String,
}

impl ConnectInfo {
    fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Webhook payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JandiMessage {
    pub body: String,
    pub connect_color: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub connect_info: Vec<ConnectInfo>,
}

/// Format a report: title line, then only the sections that have data
pub fn report_message(report: &Report) -> JandiMessage {
    let dashboard = &report.dashboard;
    let mut sections = Vec::new();

    if let Some(power) = &dashboard.current_power {
        sections.push(ConnectInfo::new("⚡ 현재 발전량", utils::format_power(power)));
    }

    if let Some(today) = &dashboard.today_generation {
        sections.push(ConnectInfo::new(
            format!("📅 오늘 발전량 ({})", report.daily.date.format("%Y-%m-%d")),
            format!("{} kWh", today),
        ));
    }

    if let Some(month) = &dashboard.month_generation {
        sections.push(ConnectInfo::new(
            format!("📊 이번달 발전량 ({})", report.monthly.year_month),
            format!("{} kWh", month),
        ));
    }

    if let Some(total) = &dashboard.total_generation {
        sections.push(ConnectInfo::new("📈 누적 발전량", format!("{} MWh", total)));
    }

    match report.device_status.normalcy {
        Normalcy::Normal => {
            sections.push(ConnectInfo::new("🟢 설비 상태", "컨버터 정상 작동 중"));
        }
        Normalcy::Abnormal => {
            let messages = &report.device_status.error_messages;
            let detail = if messages.is_empty() {
                "상태 확인 필요".to_string()
            } else {
                messages.join(", ")
            };
            sections.push(ConnectInfo::new("🔴 설비 상태", format!("이상 감지: {}", detail)));
        }
        Normalcy::Unknown => {}
    }

    if let Some(line) = recent_days_line(&report.recent_days) {
        sections.push(ConnectInfo::new(
            format!("📋 최근 {}일 발전량", report.recent_days.len()),
            line,
        ));
    }

    if sections.is_empty() {
        sections.push(ConnectInfo::new("⚠️ 알림", "수집된 발전량 데이터가 없습니다."));
    }

    JandiMessage {
        body: format!(
            "🌞 Heviton 발전량 리포트 ({})",
            report.collected_at.format("%Y-%m-%d %H:%M")
        ),
        connect_color: REPORT_COLOR.to_string(),
        connect_info: sections,
    }
}

/// `MM/DD: 12.3kWh | MM/DD: -`, or `None` when no day has data
fn recent_days_line(days: &[DailyPoint]) -> Option<String> {
    if !days.iter().any(DailyPoint::has_data) {
        return None;
    }
    let parts: Vec<String> = days
        .iter()
        .map(|day| {
            let date = day.date.format("%m/%d");
            match &day.generation {
                Some(generation) => format!("{}: {}kWh", date, generation),
                None => format!("{}: -", date),
            }
        })
        .collect();
    Some(parts.join(" | "))
}

pub fn error_message(message: &str, now: DateTime<Local>) -> JandiMessage {
    JandiMessage {
        body: format!("🚨 Heviton 크롤러 에러 발생 ({})", now.format("%Y-%m-%d %H:%M")),
        connect_color: ERROR_COLOR.to_string(),
        connect_info: vec![ConnectInfo::new("에러 내용", message)],
    }
}

/// A free-form message; with a title, the body is repeated as a single section
pub fn plain_message(body: &str, title: Option<&str>, color: &str) -> JandiMessage {
    JandiMessage {
        body: body.to_string(),
        connect_color: color.to_string(),
        connect_info: title
            .map(|t| vec![ConnectInfo::new(t, body)])
            .unwrap_or_default(),
    }
}

pub struct JandiWebhook {
    url: String,
    http: HttpClient,
}

impl JandiWebhook {
    pub fn new(url: &str, http: HttpClient) -> Self {
        Self {
            url: url.to_string(),
            http,
        }
    }

    pub async fn deliver(&self, message: &JandiMessage) -> Result<(), DeliveryError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JANDI_ACCEPT));
        self.http
            .post_json(&self.url, message, headers, None)
            .await?;
        Ok(())
    }

    /// Best-effort single attempt; failures are logged and reported as `false`
    pub async fn send(&self, message: &JandiMessage) -> bool {
        match self.deliver(message).await {
            Ok(()) => {
                tracing::info!("Jandi message sent");
                true
            }
            Err(e) => {
                tracing::error!("Jandi message failed: {}", e);
                false
            }
        }
    }

    pub async fn send_report(&self, report: &Report) -> bool {
        self.send(&report_message(report)).await
    }

    pub async fn send_error_alert(&self, message: &str) -> bool {
        self.send(&error_message(message, Local::now())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DashboardMetrics, DeviceStatus};
    use crate::report;
    use chrono::{NaiveDate, TimeZone};
    use std::time::Duration;

    fn collected_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 12, 26, 18, 5, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, d).unwrap()
    }

    fn make_report(
        dashboard: DashboardMetrics,
        status: DeviceStatus,
        recent: Vec<DailyPoint>,
    ) -> Report {
        report::assemble(collected_at(), dashboard, status, recent)
    }

    fn descriptions(message: &JandiMessage) -> Vec<&str> {
        message
            .connect_info
            .iter()
            .map(|c| c.description.as_str())
            .collect()
    }

    #[test]
    fn test_empty_report_has_single_no_data_section() {
        let placeholders = vec![DailyPoint::no_data(day(26)), DailyPoint::no_data(day(25))];
        let message = report_message(&make_report(
            DashboardMetrics::default(),
            DeviceStatus::default(),
            placeholders,
        ));

        assert_eq!(message.connect_info.len(), 1);
        assert_eq!(message.connect_info[0].title, "⚠️ 알림");
        assert_eq!(message.body, "🌞 Heviton 발전량 리포트 (2024-12-26 18:05)");
    }

    #[test]
    fn test_full_report_sections() {
        let dashboard = DashboardMetrics {
            current_power: Some("50000".into()),
            today_generation: Some("123.45".into()),
            month_generation: Some("3456.78".into()),
            total_generation: Some("28.90".into()),
        };
        let status = DeviceStatus {
            normalcy: Normalcy::Normal,
            ..Default::default()
        };
        let recent = vec![DailyPoint::new(day(26), "123.45"), DailyPoint::no_data(day(25))];
        let message = report_message(&make_report(dashboard, status, recent));

        assert_eq!(
            descriptions(&message),
            vec![
                "50.00 kW",
                "123.45 kWh",
                "3456.78 kWh",
                "28.90 MWh",
                "컨버터 정상 작동 중",
                "12/26: 123.45kWh | 12/25: -",
            ]
        );
        assert_eq!(message.connect_info[1].title, "📅 오늘 발전량 (2024-12-26)");
        assert_eq!(message.connect_info[2].title, "📊 이번달 발전량 (2024-12)");
        assert_eq!(message.connect_info[5].title, "📋 최근 2일 발전량");
    }

    #[test]
    fn test_non_numeric_power_and_abnormal_status() {
        let dashboard = DashboardMetrics {
            current_power: Some("N/A".into()),
            ..Default::default()
        };
        let status = DeviceStatus {
            normalcy: Normalcy::Abnormal,
            error_messages: vec!["INV-1 통신 두절".into(), "INV-2 과열".into()],
            devices: Vec::new(),
        };
        let message = report_message(&make_report(dashboard, status, Vec::new()));

        assert_eq!(
            descriptions(&message),
            vec!["N/A W", "이상 감지: INV-1 통신 두절, INV-2 과열"]
        );
        assert_eq!(message.connect_info[1].title, "🔴 설비 상태");

        let status = DeviceStatus {
            normalcy: Normalcy::Abnormal,
            ..Default::default()
        };
        let message = report_message(&make_report(DashboardMetrics::default(), status, Vec::new()));
        assert_eq!(descriptions(&message), vec!["이상 감지: 상태 확인 필요"]);
    }

    #[test]
    fn test_payload_wire_shape() {
        let message = error_message("로그인 실패", collected_at());
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["body"], "🚨 Heviton 크롤러 에러 발생 (2024-12-26 18:05)");
        assert_eq!(json["connectColor"], "#E74C3C");
        assert_eq!(json["connectInfo"][0]["title"], "에러 내용");
        assert_eq!(json["connectInfo"][0]["description"], "로그인 실패");

        let plain = serde_json::to_value(plain_message("hi", None, DEFAULT_COLOR)).unwrap();
        assert_eq!(plain["connectColor"], "#2ECC71");
        assert!(plain.get("connectInfo").is_none());

        let titled = plain_message("가져오기 완료", Some("📥 과거 데이터"), DEFAULT_COLOR);
        assert_eq!(titled.connect_info[0].description, "가져오기 완료");
    }

    #[tokio::test]
    async fn test_send_failure_is_false() {
        let http = HttpClient::new(Duration::from_secs(2), Duration::from_secs(1)).unwrap();
        let webhook = JandiWebhook::new("http://127.0.0.1:9/webhook", http);
        assert!(!webhook.send_error_alert("unreachable").await);
    }
}
