//! Data models for collected generation data

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use std::fmt;

/// Portal login credentials, loaded once from configuration
#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"***")
            .finish()
    }
}

/// Lifecycle of a browser session: open -> use -> close, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Closed,
}

/// Named dashboard metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    CurrentPower,
    TodayGeneration,
    MonthGeneration,
    TotalGeneration,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::CurrentPower,
        Metric::TodayGeneration,
        Metric::MonthGeneration,
        Metric::TotalGeneration,
    ];

    /// Class of the dashboard block holding this metric's `.num` element
    pub fn scope_class(self) -> &'static str {
        match self {
            Metric::CurrentPower => "now",
            Metric::TodayGeneration => "today",
            Metric::MonthGeneration => "month",
            Metric::TotalGeneration => "accrue",
        }
    }
}

/// Dashboard values as displayed by the portal.
///
/// Values stay raw text since the portal varies precision and units. `None` means
/// the value was not observed, which is different from a reading of zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardMetrics {
    pub current_power: Option<String>,
    pub today_generation: Option<String>,
    pub month_generation: Option<String>,
    pub total_generation: Option<String>,
}

impl DashboardMetrics {
    pub fn get(&self, metric: Metric) -> Option<&str> {
        match metric {
            Metric::CurrentPower => self.current_power.as_deref(),
            Metric::TodayGeneration => self.today_generation.as_deref(),
            Metric::MonthGeneration => self.month_generation.as_deref(),
            Metric::TotalGeneration => self.total_generation.as_deref(),
        }
    }

    pub fn set(&mut self, metric: Metric, value: Option<String>) {
        let slot = match metric {
            Metric::CurrentPower => &mut self.current_power,
            Metric::TodayGeneration => &mut self.today_generation,
            Metric::MonthGeneration => &mut self.month_generation,
            Metric::TotalGeneration => &mut self.total_generation,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        Metric::ALL.iter().all(|m| self.get(*m).is_none())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalcy {
    Normal,
    Abnormal,
    #[default]
    Unknown,
}

impl Normalcy {
    /// Label written to the spreadsheet status column
    pub fn label(self) -> &'static str {
        match self {
            Normalcy::Normal => "정상",
            Normalcy::Abnormal => "이상",
            Normalcy::Unknown => "확인필요",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEntry {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub normalcy: Normalcy,
    pub error_messages: Vec<String>,
    pub devices: Vec<DeviceEntry>,
}

/// Generation for one calendar day, in kWh as displayed. `None` is "no data".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub generation: Option<String>,
}

impl DailyPoint {
    pub fn new(date: NaiveDate, generation: impl Into<String>) -> Self {
        Self {
            date,
            generation: Some(generation.into()),
        }
    }

    pub fn no_data(date: NaiveDate) -> Self {
        Self {
            date,
            generation: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.generation.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total: Option<String>,
    pub current: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklySummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub year_month: String,
    pub total: Option<String>,
}

/// One ISO week of summed generation, for the historical import
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyTotal {
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total: f64,
}

/// One month of summed generation with the running cumulative total in MWh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    pub year_month: String,
    pub total: f64,
    pub cumulative_mwh: f64,
}

/// The immutable per-run record handed to the notifier and the recorder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub collected_at: DateTime<Local>,
    pub daily: DailySummary,
    pub weekly: WeeklySummary,
    pub monthly: MonthlySummary,
    pub dashboard: DashboardMetrics,
    pub device_status: DeviceStatus,
    pub recent_days: Vec<DailyPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials {
            identifier: "plant01".into(),
            secret: "hunter2".into(),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("plant01"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_metrics_default_is_absent_not_zero() {
        let metrics = DashboardMetrics::default();
        assert!(metrics.is_empty());
        assert_eq!(metrics.get(Metric::TodayGeneration), None);
    }

    #[test]
    fn test_metrics_set_and_get() {
        let mut metrics = DashboardMetrics::default();
        metrics.set(Metric::TodayGeneration, Some("0".into()));
        assert_eq!(metrics.get(Metric::TodayGeneration), Some("0"));
        assert!(!metrics.is_empty());
    }
}
