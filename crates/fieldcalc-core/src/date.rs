//! Date parsing helpers
//!
//! Dates are instants in UTC. Text is accepted in the handful of layouts that
//! table imports and date pickers produce; anything else is not a date.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse date text into a UTC instant
///
/// Accepts RFC 3339 (`2024-03-01T10:00:00Z`, with any offset), `YYYY-MM-DD`,
/// and `YYYY-MM-DD[T ]HH:MM[:SS[.fff]]` which is read as UTC.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Build an instant from milliseconds since the Unix epoch
pub fn from_timestamp_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(millis.trunc() as i64).single()
}

/// Milliseconds since the Unix epoch
pub fn timestamp_millis(date: &DateTime<Utc>) -> f64 {
    date.timestamp_millis() as f64
}

/// ISO-8601 rendering with millisecond precision (`2024-03-01T10:00:00.000Z`)
pub fn format_iso(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}
