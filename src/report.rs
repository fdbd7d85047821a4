//! Report aggregation
//!
//! Pure field copying: whatever the extractors did not find stays absent.

use crate::models::{
    DailyPoint, DailySummary, DashboardMetrics, DeviceStatus, MonthlySummary, Report,
    WeeklySummary,
};
use crate::utils;
use chrono::{DateTime, Local};

pub fn assemble(
    collected_at: DateTime<Local>,
    dashboard: DashboardMetrics,
    device_status: DeviceStatus,
    recent_days: Vec<DailyPoint>,
) -> Report {
    let today = collected_at.date_naive();

    Report {
        collected_at,
        daily: DailySummary {
            date: today,
            total: dashboard.today_generation.clone(),
            current: dashboard.current_power.clone(),
        },
        weekly: WeeklySummary {
            start_date: utils::week_start(today),
            end_date: today,
        },
        monthly: MonthlySummary {
            year_month: utils::year_month_label(today),
            total: dashboard.month_generation.clone(),
        },
        dashboard,
        device_status,
        recent_days,
    }
}

impl Report {
    /// Sum of the numeric recent-day values that fall in this report's week
    pub fn week_total(&self) -> Option<f64> {
        utils::sum_numeric(
            self.recent_days
                .iter()
                .filter(|p| p.date >= self.weekly.start_date && p.date <= self.weekly.end_date)
                .filter_map(|p| p.generation.as_deref()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Normalcy;
    use chrono::{NaiveDate, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, 18, 30, 0).unwrap()
    }

    #[test]
    fn test_assemble_copies_fields() {
        let dashboard = DashboardMetrics {
            current_power: Some("50000".into()),
            today_generation: Some("123.45".into()),
            month_generation: Some("3456.78".into()),
            total_generation: None,
        };
        let report = assemble(at(2024, 12, 26), dashboard, DeviceStatus::default(), Vec::new());

        assert_eq!(report.daily.date, NaiveDate::from_ymd_opt(2024, 12, 26).unwrap());
        assert_eq!(report.daily.total.as_deref(), Some("123.45"));
        assert_eq!(report.daily.current.as_deref(), Some("50000"));
        assert_eq!(report.monthly.year_month, "2024-12");
        assert_eq!(report.monthly.total.as_deref(), Some("3456.78"));
        assert_eq!(report.weekly.start_date, NaiveDate::from_ymd_opt(2024, 12, 23).unwrap());
        assert_eq!(report.dashboard.total_generation, None);
        assert_eq!(report.device_status.normalcy, Normalcy::Unknown);
    }

    #[test]
    fn test_week_total_only_counts_this_week() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 12, d).unwrap();
        let recent = vec![
            DailyPoint::new(day(26), "10.5"),
            DailyPoint::new(day(24), "4.5"),
            DailyPoint::no_data(day(23)),
            DailyPoint::new(day(22), "100"),
        ];
        let report = assemble(
            at(2024, 12, 26),
            DashboardMetrics::default(),
            DeviceStatus::default(),
            recent,
        );
        assert_eq!(report.week_total(), Some(15.0));
    }

    #[test]
    fn test_report_serializes_to_collected_shape() {
        let report = assemble(
            at(2024, 12, 26),
            DashboardMetrics::default(),
            DeviceStatus::default(),
            vec![DailyPoint::no_data(NaiveDate::from_ymd_opt(2024, 12, 26).unwrap())],
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["daily"]["date"], "2024-12-26");
        assert!(json["daily"]["total"].is_null());
        assert_eq!(json["monthly"]["year_month"], "2024-12");
        assert_eq!(json["device_status"]["normalcy"], "unknown");
        assert!(json["recent_days"][0]["generation"].is_null());
    }
}
