//! Spreadsheet recording
//!
//! The `Recorder` turns reports into rows and writes them through a
//! `SheetBackend`. Monthly and weekly rows are upserted by their column-A label;
//! the scan-then-write is not transactional, which is fine for one run per tick.

pub mod google;

pub use google::GoogleSheets;

use crate::error::DeliveryError;
use crate::models::{DailyPoint, MonthlyTotal, Normalcy, Report, WeeklyTotal};
use crate::utils;
use async_trait::async_trait;

pub const DAILY_HEADERS: &[&str] = &["날짜", "발전량(kWh)", "현재출력(kW)", "설비상태", "기록시간"];
pub const WEEKLY_HEADERS: &[&str] = &["주차", "시작일", "종료일", "총발전량(kWh)", "기록시간"];
pub const MONTHLY_HEADERS: &[&str] = &["년월", "총발전량(kWh)", "누적발전량(MWh)", "기록시간"];

/// Row-level operations on a spreadsheet made of named tabs
#[async_trait]
pub trait SheetBackend: Send + Sync {
    async fn sheet_titles(&self) -> Result<Vec<String>, DeliveryError>;

    async fn add_sheet(&self, title: &str) -> Result<(), DeliveryError>;

    /// Column A, one entry per row starting at row 1; blank cells are empty strings
    async fn key_column(&self, sheet: &str) -> Result<Vec<String>, DeliveryError>;

    async fn append_rows(&self, sheet: &str, rows: &[Vec<String>]) -> Result<(), DeliveryError>;

    /// Overwrite the 1-based `row_number`
    async fn update_row(
        &self,
        sheet: &str,
        row_number: usize,
        row: &[String],
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone)]
pub struct SheetNames {
    pub daily: String,
    pub weekly: String,
    pub monthly: String,
}

/// Which rows a run writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub daily: bool,
    pub weekly: bool,
    pub monthly: bool,
}

impl Selection {
    pub const ALL: Selection = Selection {
        daily: true,
        weekly: true,
        monthly: true,
    };

    /// No flag selected means everything
    pub fn from_flags(daily: bool, weekly: bool, monthly: bool) -> Self {
        if !daily && !weekly && !monthly {
            Self::ALL
        } else {
            Self {
                daily,
                weekly,
                monthly,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Updated(usize),
    Appended,
}

pub struct Recorder<B> {
    backend: B,
    names: SheetNames,
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn format_kwh(value: f64) -> String {
    format!("{:.2}", value)
}

impl<B: SheetBackend> Recorder<B> {
    pub fn new(backend: B, names: SheetNames) -> Self {
        Self { backend, names }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create the tab with its header row if it does not exist yet
    async fn ensure_sheet(&self, sheet: &str, headers: &[&str]) -> Result<(), DeliveryError> {
        let titles = self.backend.sheet_titles().await?;
        if titles.iter().any(|t| t == sheet) {
            return Ok(());
        }
        self.backend.add_sheet(sheet).await?;
        self.backend.update_row(sheet, 1, &row(headers)).await?;
        tracing::info!("Created sheet '{}'", sheet);
        Ok(())
    }

    /// Overwrite the row whose column A equals `key`, or append a new one.
    ///
    /// Assumes at most one row per key; with duplicates the first match is updated.
    async fn upsert(&self, sheet: &str, key: &str, values: Vec<String>) -> Result<Upsert, DeliveryError> {
        let keys = self.backend.key_column(sheet).await?;
        match keys.iter().position(|k| k == key) {
            Some(index) => {
                self.backend.update_row(sheet, index + 1, &values).await?;
                Ok(Upsert::Updated(index + 1))
            }
            None => {
                self.backend.append_rows(sheet, &[values]).await?;
                Ok(Upsert::Appended)
            }
        }
    }

    pub async fn append_daily(&self, report: &Report) -> Result<(), DeliveryError> {
        let sheet = &self.names.daily;
        self.ensure_sheet(sheet, DAILY_HEADERS).await?;

        let date = report.daily.date.format("%Y-%m-%d").to_string();
        let generation = report.dashboard.today_generation.clone().unwrap_or_default();
        let current = report
            .dashboard
            .current_power
            .as_deref()
            .map(|w| utils::watts_to_kw(w).unwrap_or_else(|| w.to_string()))
            .unwrap_or_default();
        let values = vec![
            date.clone(),
            generation.clone(),
            current,
            report.device_status.normalcy.label().to_string(),
            report.collected_at.format("%H:%M:%S").to_string(),
        ];

        self.backend.append_rows(sheet, &[values]).await?;
        tracing::info!("Daily row recorded: {} - {} kWh", date, generation);
        Ok(())
    }

    pub async fn upsert_weekly(&self, report: &Report) -> Result<Upsert, DeliveryError> {
        let sheet = &self.names.weekly;
        self.ensure_sheet(sheet, WEEKLY_HEADERS).await?;

        let label = utils::week_label(report.weekly.end_date);
        let values = vec![
            label.clone(),
            report.weekly.start_date.format("%Y-%m-%d").to_string(),
            report.weekly.end_date.format("%Y-%m-%d").to_string(),
            report.week_total().map(format_kwh).unwrap_or_default(),
            report.collected_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ];

        let result = self.upsert(sheet, &label, values).await?;
        tracing::info!("Weekly row {:?}: {}", result, label);
        Ok(result)
    }

    pub async fn upsert_monthly(&self, report: &Report) -> Result<Upsert, DeliveryError> {
        let sheet = &self.names.monthly;
        self.ensure_sheet(sheet, MONTHLY_HEADERS).await?;

        let label = report.monthly.year_month.clone();
        let values = vec![
            label.clone(),
            report.monthly.total.clone().unwrap_or_default(),
            report.dashboard.total_generation.clone().unwrap_or_default(),
            report.collected_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ];

        let result = self.upsert(sheet, &label, values).await?;
        tracing::info!(
            "Monthly row {:?}: {} - {} kWh",
            result,
            label,
            report.monthly.total.as_deref().unwrap_or("-")
        );
        Ok(result)
    }

    /// Write the selected rows. Each write is attempted even if an earlier one
    /// failed; returns whether all of them succeeded.
    pub async fn record(&self, report: &Report, selection: Selection) -> bool {
        let mut ok = true;

        if selection.daily {
            if let Err(e) = self.append_daily(report).await {
                tracing::error!("Daily row failed: {}", e);
                ok = false;
            }
        }
        if selection.weekly {
            if let Err(e) = self.upsert_weekly(report).await {
                tracing::error!("Weekly row failed: {}", e);
                ok = false;
            }
        }
        if selection.monthly {
            if let Err(e) = self.upsert_monthly(report).await {
                tracing::error!("Monthly row failed: {}", e);
                ok = false;
            }
        }
        ok
    }

    pub async fn bulk_insert_daily(
        &self,
        points: &[DailyPoint],
        recorded_at: &str,
    ) -> Result<usize, DeliveryError> {
        let sheet = &self.names.daily;
        self.ensure_sheet(sheet, DAILY_HEADERS).await?;

        let rows: Vec<Vec<String>> = points
            .iter()
            .filter_map(|p| {
                let generation = p.generation.clone()?;
                Some(vec![
                    p.date.format("%Y-%m-%d").to_string(),
                    generation,
                    String::new(),
                    Normalcy::Normal.label().to_string(),
                    recorded_at.to_string(),
                ])
            })
            .collect();
        self.append_if_any(sheet, rows).await
    }

    pub async fn bulk_insert_weekly(
        &self,
        weeks: &[WeeklyTotal],
        recorded_at: &str,
    ) -> Result<usize, DeliveryError> {
        let sheet = &self.names.weekly;
        self.ensure_sheet(sheet, WEEKLY_HEADERS).await?;

        let rows = weeks
            .iter()
            .map(|w| {
                vec![
                    w.label.clone(),
                    w.start_date.format("%Y-%m-%d").to_string(),
                    w.end_date.format("%Y-%m-%d").to_string(),
                    format_kwh(w.total),
                    recorded_at.to_string(),
                ]
            })
            .collect();
        self.append_if_any(sheet, rows).await
    }

    pub async fn bulk_insert_monthly(
        &self,
        months: &[MonthlyTotal],
        recorded_at: &str,
    ) -> Result<usize, DeliveryError> {
        let sheet = &self.names.monthly;
        self.ensure_sheet(sheet, MONTHLY_HEADERS).await?;

        let rows = months
            .iter()
            .map(|m| {
                vec![
                    m.year_month.clone(),
                    format_kwh(m.total),
                    format_kwh(m.cumulative_mwh),
                    recorded_at.to_string(),
                ]
            })
            .collect();
        self.append_if_any(sheet, rows).await
    }

    async fn append_if_any(&self, sheet: &str, rows: Vec<Vec<String>>) -> Result<usize, DeliveryError> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.backend.append_rows(sheet, &rows).await?;
        tracing::info!("Appended {} rows to '{}'", rows.len(), sheet);
        Ok(rows.len())
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory spreadsheet

    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemorySheets {
        sheets: Mutex<BTreeMap<String, Vec<Vec<String>>>>,
        fail_writes: bool,
    }

    impl MemorySheets {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every write is rejected
        pub fn failing() -> Self {
            Self {
                fail_writes: true,
                ..Self::default()
            }
        }

        pub fn with_rows(sheet: &str, rows: &[&[&str]]) -> Self {
            let memory = Self::new();
            memory.sheets.lock().unwrap().insert(
                sheet.to_string(),
                rows.iter().map(|r| row(r)).collect(),
            );
            memory
        }

        pub fn rows(&self, sheet: &str) -> Vec<Vec<String>> {
            self.sheets
                .lock()
                .unwrap()
                .get(sheet)
                .cloned()
                .unwrap_or_default()
        }

        fn check_write(&self) -> Result<(), DeliveryError> {
            if self.fail_writes {
                return Err(DeliveryError::Response("write rejected".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SheetBackend for MemorySheets {
        async fn sheet_titles(&self) -> Result<Vec<String>, DeliveryError> {
            Ok(self.sheets.lock().unwrap().keys().cloned().collect())
        }

        async fn add_sheet(&self, title: &str) -> Result<(), DeliveryError> {
            self.check_write()?;
            self.sheets
                .lock()
                .unwrap()
                .entry(title.to_string())
                .or_default();
            Ok(())
        }

        async fn key_column(&self, sheet: &str) -> Result<Vec<String>, DeliveryError> {
            Ok(self
                .rows(sheet)
                .iter()
                .map(|r| r.first().cloned().unwrap_or_default())
                .collect())
        }

        async fn append_rows(&self, sheet: &str, rows: &[Vec<String>]) -> Result<(), DeliveryError> {
            self.check_write()?;
            self.sheets
                .lock()
                .unwrap()
                .entry(sheet.to_string())
                .or_default()
                .extend(rows.iter().cloned());
            Ok(())
        }

        async fn update_row(
            &self,
            sheet: &str,
            row_number: usize,
            row: &[String],
        ) -> Result<(), DeliveryError> {
            self.check_write()?;
            let mut sheets = self.sheets.lock().unwrap();
            let rows = sheets.entry(sheet.to_string()).or_default();
            if rows.len() < row_number {
                rows.resize(row_number, Vec::new());
            }
            rows[row_number - 1] = row.to_vec();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemorySheets;
    use super::*;
    use crate::models::{DashboardMetrics, DeviceStatus};
    use crate::report;
    use chrono::{DateTime, Local, NaiveDate, TimeZone};

    fn names() -> SheetNames {
        SheetNames {
            daily: "일별".into(),
            weekly: "주별".into(),
            monthly: "월별".into(),
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, 18, 5, 9).unwrap()
    }

    fn sample_report(collected_at: DateTime<Local>) -> Report {
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
        let today = collected_at.date_naive();
        report::assemble(
            collected_at,
            dashboard,
            status,
            vec![DailyPoint::new(today, "123.45")],
        )
    }

    #[test]
    fn test_selection_from_flags() {
        assert_eq!(Selection::from_flags(false, false, false), Selection::ALL);
        let monthly_only = Selection::from_flags(false, false, true);
        assert!(!monthly_only.daily && !monthly_only.weekly && monthly_only.monthly);
    }

    #[tokio::test]
    async fn test_daily_row_created_with_headers() {
        let recorder = Recorder::new(MemorySheets::new(), names());
        recorder.append_daily(&sample_report(at(2024, 12, 26))).await.unwrap();

        let rows = recorder.backend().rows("일별");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], row(DAILY_HEADERS));
        assert_eq!(rows[1], row(&["2024-12-26", "123.45", "50.00", "정상", "18:05:09"]));
    }

    #[tokio::test]
    async fn test_monthly_upsert_updates_existing_row() {
        let memory = MemorySheets::with_rows(
            "월별",
            &[
                MONTHLY_HEADERS,
                &["2024-11", "4000", "25.00", "2024-11-30 18:00:00"],
                &["2024-12", "100", "25.10", "2024-12-01 18:00:00"],
            ],
        );
        let recorder = Recorder::new(memory, names());

        let result = recorder.upsert_monthly(&sample_report(at(2024, 12, 26))).await.unwrap();

        assert_eq!(result, Upsert::Updated(3));
        let rows = recorder.backend().rows("월별");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], row(&["2024-12", "3456.78", "28.90", "2024-12-26 18:05:09"]));
        assert_eq!(rows[1][0], "2024-11");
    }

    #[tokio::test]
    async fn test_monthly_upsert_appends_new_month() {
        let memory = MemorySheets::with_rows(
            "월별",
            &[MONTHLY_HEADERS, &["2024-12", "4500", "28.90", "2024-12-31 18:00:00"]],
        );
        let recorder = Recorder::new(memory, names());

        let result = recorder.upsert_monthly(&sample_report(at(2025, 1, 2))).await.unwrap();

        assert_eq!(result, Upsert::Appended);
        let rows = recorder.backend().rows("월별");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2][0], "2025-01");
    }

    #[tokio::test]
    async fn test_weekly_upsert_uses_week_label() {
        let recorder = Recorder::new(MemorySheets::new(), names());
        let report = sample_report(at(2024, 12, 26));

        assert_eq!(recorder.upsert_weekly(&report).await.unwrap(), Upsert::Appended);
        assert_eq!(recorder.upsert_weekly(&report).await.unwrap(), Upsert::Updated(2));

        let rows = recorder.backend().rows("주별");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][..4], row(&["2024년 52주차", "2024-12-23", "2024-12-26", "123.45"])[..]);
    }

    #[tokio::test]
    async fn test_record_reports_failure() {
        let recorder = Recorder::new(MemorySheets::failing(), names());
        assert!(!recorder.record(&sample_report(at(2024, 12, 26)), Selection::ALL).await);

        let recorder = Recorder::new(MemorySheets::new(), names());
        assert!(recorder.record(&sample_report(at(2024, 12, 26)), Selection::ALL).await);
        assert_eq!(recorder.backend().rows("일별").len(), 2);
        assert_eq!(recorder.backend().rows("월별").len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_insert_skips_days_without_data() {
        let recorder = Recorder::new(MemorySheets::new(), names());
        let day = |d| NaiveDate::from_ymd_opt(2024, 12, d).unwrap();
        let points = vec![DailyPoint::new(day(1), "10"), DailyPoint::no_data(day(2))];

        let written = recorder.bulk_insert_daily(&points, "2025-01-01 00:00:00").await.unwrap();

        assert_eq!(written, 1);
        assert_eq!(recorder.backend().rows("일별")[1][..2], row(&["2024-12-01", "10"])[..]);
    }
}
