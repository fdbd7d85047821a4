//! One-off import of the portal's statistics history into the spreadsheet

use crate::models::{DailyPoint, MonthlyTotal, WeeklyTotal};
use crate::scrape::Collector;
use crate::sheets::{Recorder, SheetBackend};
use crate::utils;
use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, Local, NaiveDate};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub days: usize,
    pub weeks: usize,
    pub months: usize,
}

/// Days with a numeric value, oldest first
fn numeric_days(points: &[DailyPoint]) -> Vec<(NaiveDate, f64)> {
    let mut days: Vec<(NaiveDate, f64)> = points
        .iter()
        .filter_map(|p| Some((p.date, utils::parse_number(p.generation.as_deref()?)?)))
        .collect();
    days.sort_by_key(|(date, _)| *date);
    days
}

/// Group by ISO week; start and end are the first and last days seen in that week
pub fn weekly_totals(points: &[DailyPoint]) -> Vec<WeeklyTotal> {
    let mut weeks: BTreeMap<(i32, u32), WeeklyTotal> = BTreeMap::new();

    for (date, value) in numeric_days(points) {
        let iso = date.iso_week();
        weeks
            .entry((iso.year(), iso.week()))
            .and_modify(|w| {
                w.end_date = date;
                w.total += value;
            })
            .or_insert_with(|| WeeklyTotal {
                label: utils::week_label(date),
                start_date: date,
                end_date: date,
                total: value,
            });
    }

    weeks.into_values().collect()
}

/// Group by calendar month, carrying a running cumulative total in MWh
pub fn monthly_totals(points: &[DailyPoint]) -> Vec<MonthlyTotal> {
    let mut months: BTreeMap<String, f64> = BTreeMap::new();
    for (date, value) in numeric_days(points) {
        *months.entry(utils::year_month_label(date)).or_insert(0.0) += value;
    }

    let mut cumulative_kwh = 0.0;
    months
        .into_iter()
        .map(|(year_month, total)| {
            cumulative_kwh += total;
            MonthlyTotal {
                year_month,
                total,
                cumulative_mwh: cumulative_kwh / 1000.0,
            }
        })
        .collect()
}

/// Read the statistics table and bulk-insert daily, weekly and monthly rows
pub async fn import_history<B: SheetBackend>(
    collector: &Collector<'_>,
    recorder: &Recorder<B>,
    now: DateTime<Local>,
) -> Result<ImportSummary> {
    tracing::info!("[Import] Step 1: Reading statistics history...");
    let mut points = collector.statistics_history().await;
    points.retain(DailyPoint::has_data);
    points.sort_by_key(|p| p.date);

    if points.is_empty() {
        bail!("no historical data found on the statistics page");
    }
    tracing::info!(
        "Found {} days ({} ~ {})",
        points.len(),
        points[0].date,
        points[points.len() - 1].date
    );

    let weeks = weekly_totals(&points);
    let months = monthly_totals(&points);
    let recorded_at = now.format("%Y-%m-%d %H:%M:%S").to_string();

    tracing::info!("[Import] Step 2: Writing daily rows...");
    let days = recorder.bulk_insert_daily(&points, &recorded_at).await?;

    tracing::info!("[Import] Step 3: Writing {} weekly rows...", weeks.len());
    let week_count = recorder.bulk_insert_weekly(&weeks, &recorded_at).await?;

    tracing::info!("[Import] Step 4: Writing {} monthly rows...", months.len());
    let month_count = recorder.bulk_insert_monthly(&months, &recorded_at).await?;

    Ok(ImportSummary {
        days,
        weeks: week_count,
        months: month_count,
    })
}
