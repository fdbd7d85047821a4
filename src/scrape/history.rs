//! Daily generation history: recent-days list and the full statistics table

use super::{value_as_text, Collector};
use crate::models::DailyPoint;
use crate::parser;
use crate::portal::heviton;
use chrono::{Duration, NaiveDate};
use serde_json::Value;

const CHART_SCRIPT: &str = r#"
    if (typeof chartData !== 'undefined') return chartData;
    if (typeof dayData !== 'undefined') return dayData;
    if (typeof dailyData !== 'undefined') return dailyData;
    return null;
"#;

const TABLE_HEADER: &[&str] = &["기간", "발전량"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryStrategy {
    ChartVariable,
    StatisticsTable,
    Placeholder,
}

const HISTORY_STRATEGIES: &[HistoryStrategy] = &[
    HistoryStrategy::ChartVariable,
    HistoryStrategy::StatisticsTable,
    HistoryStrategy::Placeholder,
];

impl Collector<'_> {
    /// Exactly `days` entries, most recent first; days without data say so explicitly
    pub async fn recent_days(&self, days: usize, today: NaiveDate) -> Vec<DailyPoint> {
        tracing::info!("Reading generation for the last {} days", days);

        for strategy in HISTORY_STRATEGIES {
            let points = match strategy {
                HistoryStrategy::ChartVariable => self.chart_points(days, today).await,
                HistoryStrategy::StatisticsTable => self.table_points(days, today).await,
                HistoryStrategy::Placeholder => Some(placeholder_days(today, days)),
            };
            if let Some(points) = points.filter(|p| !p.is_empty()) {
                tracing::info!("Recent days via {:?}: {} entries", strategy, points.len());
                return fit_to_length(points, days, today);
            }
        }
        placeholder_days(today, days)
    }

    /// Every day row of the statistics table, oldest first
    pub async fn statistics_history(&self) -> Vec<DailyPoint> {
        if let Err(e) = self.visit(heviton::STATISTICS_PAGE).await {
            tracing::warn!("Statistics page unavailable: {}", e);
            return Vec::new();
        }
        self.waits.extra.settle().await;

        let source = self.browser.page_source().await.unwrap_or_default();
        let mut points = points_from_full_table(&source);
        points.sort_by_key(|p| p.date);
        tracing::info!("Statistics table: {} daily rows", points.len());
        points
    }

    async fn chart_points(&self, days: usize, today: NaiveDate) -> Option<Vec<DailyPoint>> {
        self.visit(heviton::HISTORY_PAGE).await.ok()?;
        self.waits.extra.settle().await;
        match self.browser.eval(CHART_SCRIPT).await {
            Ok(value) => points_from_chart(&value, days, today),
            Err(e) => {
                tracing::debug!("Chart data lookup failed: {}", e);
                None
            }
        }
    }

    async fn table_points(&self, days: usize, today: NaiveDate) -> Option<Vec<DailyPoint>> {
        self.visit(heviton::STATISTICS_PAGE).await.ok()?;
        let source = self.browser.page_source().await.ok()?;
        points_from_table(&source, days, today)
    }
}

/// Last `days` entries of a chart data array, most recent first
pub fn points_from_chart(value: &Value, days: usize, today: NaiveDate) -> Option<Vec<DailyPoint>> {
    let items = value.as_array()?;
    let start = items.len().saturating_sub(days);

    let points: Vec<DailyPoint> = items[start..]
        .iter()
        .rev()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let date = ["date", "day"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(value_as_text))
                .and_then(|text| parser::parse_portal_date(&text, today))?;
            let generation = ["generation", "value", "amount"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(value_as_text));
            Some(DailyPoint { date, generation })
        })
        .collect();

    (!points.is_empty()).then_some(points)
}

/// The first `days` dated rows of the statistics table
pub fn points_from_table(html: &str, days: usize, today: NaiveDate) -> Option<Vec<DailyPoint>> {
    let rows = parser::find_table_rows(html, TABLE_HEADER)?;
    let points: Vec<DailyPoint> = rows
        .iter()
        .filter_map(|cells| row_point(cells, |text| parser::parse_portal_date(text, today)))
        .take(days)
        .collect();
    (!points.is_empty()).then_some(points)
}

/// All rows with a full `YYYY.MM.DD` date; totals rows are skipped
pub fn points_from_full_table(html: &str) -> Vec<DailyPoint> {
    parser::find_table_rows(html, TABLE_HEADER)
        .unwrap_or_default()
        .iter()
        .filter(|cells| {
            cells
                .first()
                .map(|c| !c.contains("합계") && !c.contains("기간"))
                .unwrap_or(false)
        })
        .filter_map(|cells| row_point(cells, parser::parse_full_date))
        .collect()
}

fn row_point(cells: &[String], parse_date: impl Fn(&str) -> Option<NaiveDate>) -> Option<DailyPoint> {
    let [date, value, ..] = cells else {
        return None;
    };
    if value.is_empty() {
        return None;
    }
    Some(DailyPoint::new(parse_date(date.as_str())?, value.clone()))
}

/// `days` no-data entries: today, yesterday, ...
pub fn placeholder_days(today: NaiveDate, days: usize) -> Vec<DailyPoint> {
    (0..days)
        .map(|i| DailyPoint::no_data(today - Duration::days(i as i64)))
        .collect()
}

/// Most recent first, one entry per date, exactly `days` long. Short lists are
/// padded with no-data days going back from the oldest entry.
pub fn fit_to_length(mut points: Vec<DailyPoint>, days: usize, today: NaiveDate) -> Vec<DailyPoint> {
    points.sort_by(|a, b| b.date.cmp(&a.date));
    points.dedup_by_key(|p| p.date);
    points.truncate(days);

    let mut next = match points.last() {
        Some(oldest) => oldest.date - Duration::days(1),
        None => today,
    };
    while points.len() < days {
        points.push(DailyPoint::no_data(next));
        next -= Duration::days(1);
    }
    points
}
