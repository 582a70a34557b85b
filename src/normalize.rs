//! Turns loosely shaped alert payloads into [`Alert`] values.
//!
//! Normalization never fails: missing or malformed fields fall back to safe
//! defaults so a bad payload from the server cannot take the client down.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::types::{Alert, Level};

pub const DEFAULT_SOURCE: &str = "edge";

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Normalize a raw alert, using the current time for missing timestamps.
pub fn normalize_alert(raw: &Value) -> Alert {
    normalize_alert_at(raw, Utc::now())
}

/// Normalize a raw alert, using `now` for missing or unparsable timestamps.
pub fn normalize_alert_at(raw: &Value, now: DateTime<Utc>) -> Alert {
    let empty = Map::new();
    let record = raw.as_object().unwrap_or(&empty);

    let id = record
        .get("id")
        .and_then(scalar_text)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let level = record
        .get("level")
        .and_then(scalar_text)
        .map_or(Level::Info, Level::from);
    let message = record
        .get("message")
        .and_then(scalar_text)
        .unwrap_or_default();
    let llm_summary = record
        .get("llm_summary")
        .or_else(|| record.get("llmSummary"))
        .and_then(scalar_text);
    let source = record
        .get("source")
        .and_then(scalar_text)
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
    let timestamp = record
        .get("ts")
        .filter(|v| !v.is_null())
        .or_else(|| record.get("timestamp"))
        .and_then(parse_timestamp)
        .unwrap_or(now);

    Alert {
        id,
        level,
        message,
        llm_summary,
        source,
        timestamp,
    }
}

/// Parse a timestamp given as RFC 3339, a naive ISO-8601 date-time (taken as
/// UTC), a bare date, or milliseconds since the Unix epoch.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(f64_millis))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // offsets written without a colon, e.g. `+0900`
    for fmt in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

/// Newest-first ordering on alert timestamps.
pub fn by_newest(a: &Alert, b: &Alert) -> Ordering {
    b.timestamp.cmp(&a.timestamp)
}

/// Normalize a batch and sort it newest-first. Equal timestamps keep their
/// input order.
pub fn normalize_batch<'a, I>(raw: I) -> Vec<Alert>
where
    I: IntoIterator<Item = &'a Value>,
{
    let now = Utc::now();
    let mut alerts: Vec<Alert> = raw
        .into_iter()
        .map(|value| normalize_alert_at(value, now))
        .collect();
    alerts.sort_by(by_newest);
    alerts
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn f64_millis(value: f64) -> i64 {
    value as i64
}
