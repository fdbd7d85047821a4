//! Number and calendar helpers shared by the notifier, recorder and importer

use chrono::{Datelike, Duration, NaiveDate};

/// Parse a displayed number, tolerating surrounding whitespace and thousands separators.
/// Returns `None` for anything that is not a finite number.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Convert a watt reading to kilowatts with two decimals, or `None` if not numeric
pub fn watts_to_kw(watts: &str) -> Option<String> {
    parse_number(watts).map(|w| format!("{:.2}", w / 1000.0))
}

/// Current power as shown to people: `X.XX kW` when numeric, else the raw text in watts
pub fn format_power(watts: &str) -> String {
    match watts_to_kw(watts) {
        Some(kw) => format!("{} kW", kw),
        None => format!("{} W", watts),
    }
}

pub fn year_month_label(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// ISO week label used as the weekly sheet key, e.g. `2024년 52주차`
pub fn week_label(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}년 {}주차", week.year(), week.week())
}

pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Sum the numeric values, or `None` if none of them parse
pub fn sum_numeric<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<f64> {
    values
        .into_iter()
        .filter_map(parse_number)
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}
