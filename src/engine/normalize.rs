//! Record normalization
//!
//! Bulk results carry datetimes as epoch milliseconds while the standard
//! query returns ISO-8601 text with a numeric offset. Both are rewritten to
//! one canonical UTC form so downstream cursors compare as plain strings.

use crate::error::{Error, Result};
use crate::types::{JsonValue, QueryPath, Record};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Canonical datetime output, microsecond precision
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Format returned by the standard query endpoint
const STANDARD_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Per-record metadata key the API attaches
const ATTRIBUTES: &str = "attributes";

/// Strip metadata and rewrite datetime fields in place
pub fn normalize_record(
    record: &mut Record,
    datetime_fields: &HashSet<String>,
    path: QueryPath,
) -> Result<()> {
    record.shift_remove(ATTRIBUTES);

    for field in datetime_fields {
        let Some(value) = record.get_mut(field) else {
            continue;
        };
        if is_blank(value) {
            continue;
        }
        let parsed = match path {
            QueryPath::Bulk => parse_epoch_millis(value),
            QueryPath::Standard => parse_standard(value),
        }
        .map_err(|message| Error::Normalization {
            field: field.clone(),
            value: value_text(value),
            message,
        })?;
        *value = JsonValue::String(format_canonical(&parsed));
    }
    Ok(())
}

/// Format a UTC timestamp in the canonical form
pub fn format_canonical(value: &DateTime<Utc>) -> String {
    value.format(CANONICAL_FORMAT).to_string()
}

/// Rewrite a datetime cursor value in the canonical form
///
/// Values that do not parse as a datetime are returned unchanged.
pub fn canonical_cursor(value: &str) -> String {
    match parse_standard(&JsonValue::String(value.to_string())) {
        Ok(parsed) => format_canonical(&parsed),
        Err(_) => value.to_string(),
    }
}

fn is_blank(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        _ => false,
    }
}

fn value_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_epoch_millis(value: &JsonValue) -> std::result::Result<DateTime<Utc>, String> {
    let millis = match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| "epoch milliseconds out of range".to_string())?,
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("expected epoch milliseconds: {e}"))?,
        _ => return Err("expected epoch milliseconds".to_string()),
    };
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| "epoch milliseconds out of range".to_string())
}

fn parse_standard(value: &JsonValue) -> std::result::Result<DateTime<Utc>, String> {
    let JsonValue::String(text) = value else {
        return Err("expected datetime text".to_string());
    };
    DateTime::parse_from_str(text, STANDARD_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}
