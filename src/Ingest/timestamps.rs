//! Timestamp and cell parsing shared by the file parsers.
//!
//! Instrument software writes dates in whatever locale the acquisition PC runs, so the shape
//! of the text is matched first and the chrono format picked from it:
//!
//! | shape | format |
//! |-------|--------|
//! | `2024-05-01 08:00:00` | `%Y-%m-%d %H:%M:%S%.f` |
//! | `05/01/2024 08:00:00 AM` | `%m/%d/%Y %I:%M:%S %p` |
//! | `05/01/2024 08:00:00` | `%m/%d/%Y %H:%M:%S%.f` |
//! | `01.05.2024 08:00:00` | `%d.%m.%Y %H:%M:%S%.f` |
use crate::Ingest::ingest_error::IngestError;
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

/// Format of the reactor-controller `Timestamp` column
pub const REACTOR_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

static DATE_SHAPES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"^\d{4}-\d{1,2}-\d{1,2}[ T]\d{1,2}:\d{2}(:\d{2}(\.\d+)?)?$", "%Y-%m-%d %H:%M:%S%.f"),
        (
            r"^\d{1,2}/\d{1,2}/\d{4} \d{1,2}:\d{2}(:\d{2}(\.\d+)?)? ?[AaPp][Mm]$",
            "%m/%d/%Y %I:%M:%S %p",
        ),
        (r"^\d{1,2}/\d{1,2}/\d{4} \d{1,2}:\d{2}(:\d{2}(\.\d+)?)?$", "%m/%d/%Y %H:%M:%S%.f"),
        (r"^\d{1,2}\.\d{1,2}\.\d{4} \d{1,2}:\d{2}(:\d{2}(\.\d+)?)?$", "%d.%m.%Y %H:%M:%S%.f"),
    ]
    .into_iter()
    .filter_map(|(pattern, format)| Regex::new(pattern).ok().map(|re| (re, format)))
    .collect()
});

/// Parses a `date time` text of any of the supported shapes
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, IngestError> {
    let text = text.trim().replacen('T', " ", 1);
    let (re, format) = DATE_SHAPES
        .iter()
        .find(|(re, _)| re.is_match(&text))
        .ok_or_else(|| IngestError::Timestamp(text.clone()))?;
    let completed = complete_seconds(re, &text);
    NaiveDateTime::parse_from_str(&completed, format)
        .map_err(|_| IngestError::Timestamp(text.clone()))
}

/// Adds `:00` to a time written without seconds so one format per shape suffices
fn complete_seconds(re: &Regex, text: &str) -> String {
    let has_seconds = re.captures(text).and_then(|c| c.get(1)).is_some();
    if has_seconds {
        return text.to_string();
    }
    match text.rsplit_once(' ') {
        Some((head, meridiem))
            if meridiem.eq_ignore_ascii_case("am") || meridiem.eq_ignore_ascii_case("pm") =>
        {
            format!("{}:00 {}", head, meridiem)
        }
        _ => format!("{}:00", text),
    }
}

/// Parses a reactor-controller `Timestamp` cell
pub fn parse_reactor_timestamp(text: &str) -> Result<NaiveDateTime, IngestError> {
    NaiveDateTime::parse_from_str(text.trim(), REACTOR_TIMESTAMP_FORMAT)
        .map_err(|_| IngestError::Timestamp(text.to_string()))
}

/// Numeric cell; empty or non-numeric text is a missing value
pub fn parse_cell(text: &str) -> f64 {
    text.trim().parse::<f64>().unwrap_or(f64::NAN)
}
