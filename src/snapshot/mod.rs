//! Snapshot module.
//!
//! Wire types for the backend's state payload and the timestamp helpers
//! shared by the views built from it.

mod models;

pub use models::*;

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 and naive ISO-8601 (treated as UTC). Returns `None`
/// for anything else, including empty strings.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Format a timestamp for display, passing unparsable values through.
pub fn format_timestamp(value: &str) -> String {
    match parse_timestamp(value) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => value.to_string(),
    }
}
