//! Human-readable console lines for analysis results.

use chrono::TimeZone;

use crate::analyzer::{Analysis, ThresholdEvent};

const NO_DATA: &str = "No valid prices available in the data.";

/// Alert line for one event, with the timestamp rendered in `tz`.
pub fn format_event_in<Tz>(event: &ThresholdEvent, tz: &Tz, threshold_percent: f64) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "Price dropped below {:.0}% of the average on {}",
        threshold_percent,
        event.timestamp.with_timezone(tz).format("%Y-%m-%d %H:%M:%S")
    )
}

/// Lines the watch loop prints after one check.
pub fn alert_lines_in<Tz>(analysis: &Analysis, tz: &Tz, threshold_percent: f64) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if !analysis.has_valid_prices() {
        return vec![NO_DATA.to_string()];
    }
    if analysis.events.is_empty() {
        return vec!["No price drops found.".to_string()];
    }
    analysis
        .events
        .iter()
        .map(|e| format_event_in(e, tz, threshold_percent))
        .collect()
}

/// Summary the chart command prints: one `YYYY-MM-DD` per event under a header.
pub fn drop_dates_in<Tz>(analysis: &Analysis, tz: &Tz, drop_percent: f64) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if !analysis.has_valid_prices() {
        return vec![NO_DATA.to_string()];
    }
    if analysis.events.is_empty() {
        return vec![format!(
            "No dates found where the price was at least {drop_percent:.0}% lower than the average."
        )];
    }
    let mut lines = Vec::with_capacity(analysis.events.len() + 1);
    lines.push(format!("Dates when the price was at least {drop_percent:.0}% lower than the average:"));
    lines.extend(
        analysis
            .events
            .iter()
            .map(|e| e.timestamp.with_timezone(tz).format("%Y-%m-%d").to_string()),
    );
    lines
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
