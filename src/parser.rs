//! HTML parsing utilities for rendered portal pages
//!
//! Every lookup here is optional: the portal's markup is not under our control,
//! so a missing element is reported as `None` or an empty list, never an error.

use crate::models::DeviceEntry;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Concatenated, whitespace-trimmed text of an element
fn element_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect::<Vec<_>>().join("")
}

/// Text of the first element matching `css`, if any and non-empty
pub fn text_of(html: &str, css: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = selector(css)?;
    doc.select(&sel)
        .map(element_text)
        .find(|text| !text.is_empty())
}

const DEVICE_CONTAINERS: &str = ".converter, .device_box, .inverter_box";
const DEVICE_NAME: &str = ".name, .title, .device_name";
const DEVICE_STATE: &str = ".status, .state";

/// Per-device name/status pairs from the device-status page
pub fn parse_device_entries(html: &str) -> Vec<DeviceEntry> {
    let doc = Html::parse_document(html);
    let (Some(containers), Some(name_sel), Some(state_sel)) = (
        selector(DEVICE_CONTAINERS),
        selector(DEVICE_NAME),
        selector(DEVICE_STATE),
    ) else {
        return Vec::new();
    };

    doc.select(&containers)
        .filter_map(|section| {
            let name = section.select(&name_sel).next().map(element_text)?;
            let healthy = section
                .select(&state_sel)
                .next()
                .map(|state| !state.value().classes().any(|c| c.contains("error")))
                .unwrap_or(false);
            Some(DeviceEntry {
                name,
                status: if healthy { "정상" } else { "확인필요" }.to_string(),
            })
        })
        .collect()
}

/// Body rows (header excluded) of the first table whose header row mentions every label.
/// Each row is the list of its cell texts.
pub fn find_table_rows(html: &str, header_labels: &[&str]) -> Option<Vec<Vec<String>>> {
    let doc = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td, th")?;

    doc.select(&table_sel).find_map(|table| {
        let mut rows = table.select(&row_sel);
        let header = element_text(rows.next()?);
        if !header_labels.iter().all(|label| header.contains(label)) {
            return None;
        }
        Some(
            rows.map(|row| row.select(&cell_sel).map(element_text).collect())
                .collect(),
        )
    })
}

/// Parse a full `YYYY.MM.DD` or `YYYY-MM-DD` date
pub fn parse_full_date(text: &str) -> Option<NaiveDate> {
    let caps = Regex::new(r"(\d{4})[.\-](\d{1,2})[.\-](\d{1,2})")
        .ok()?
        .captures(text.trim())?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

/// Parse a date as the portal displays it: full dates, or `MM/DD` relative to `today`.
///
/// A year-less date lands in the current year unless that would be in the future,
/// in which case it belongs to the previous year.
pub fn parse_portal_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(date) = parse_full_date(text) {
        return Some(date);
    }

    let caps = Regex::new(r"^(\d{1,2})/(\d{1,2})$")
        .ok()?
        .captures(text.trim())?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;

    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(date) if date <= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() - 1, month, day),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_text_of() {
        let html = r#"
            <div class="today"><span class="num"> 123.45 </span><span class="unit">kWh</span></div>
            <div class="month"><span class="num"></span></div>
        "#;
        assert_eq!(text_of(html, ".today .num").as_deref(), Some("123.45"));
        assert_eq!(text_of(html, ".month .num"), None);
        assert_eq!(text_of(html, ".accrue .num"), None);
    }

    #[test]
    fn test_parse_device_entries() {
        let html = r#"
            <div class="inverter_box"><p class="name">INV-1</p><span class="status on"></span></div>
            <div class="inverter_box"><p class="name">INV-2</p><span class="status error"></span></div>
            <div class="device_box"><p class="device_name">INV-3</p></div>
            <div class="device_box"><span class="status on"></span></div>
        "#;
        let entries = parse_device_entries(html);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "INV-1");
        assert_eq!(entries[0].status, "정상");
        assert_eq!(entries[1].status, "확인필요");
        assert_eq!(entries[2].name, "INV-3");
        assert_eq!(entries[2].status, "확인필요");
    }

    #[test]
    fn test_find_table_rows_matches_header() {
        let html = r#"
            <table><tr><th>설비</th><th>상태</th></tr><tr><td>A</td><td>on</td></tr></table>
            <table>
                <tr><th>기간</th><th>총발전량</th></tr>
                <tr><td>2024.12.26</td><td>150.5</td></tr>
                <tr><td>2024.12.25</td><td>98.1</td></tr>
            </table>
        "#;
        let rows = find_table_rows(html, &["기간", "발전량"]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["2024.12.26", "150.5"]);
        assert!(find_table_rows(html, &["없는", "헤더"]).is_none());
    }

    #[test]
    fn test_parse_portal_date() {
        let today = ymd(2025, 1, 3);
        assert_eq!(parse_portal_date("2024.12.26", today), Some(ymd(2024, 12, 26)));
        assert_eq!(parse_portal_date("2024-12-26", today), Some(ymd(2024, 12, 26)));
        assert_eq!(parse_portal_date("01/02", today), Some(ymd(2025, 1, 2)));
        assert_eq!(parse_portal_date("12/31", today), Some(ymd(2024, 12, 31)));
        assert_eq!(parse_portal_date("합계", today), None);
        assert_eq!(parse_portal_date("13/40", today), None);
    }
}
