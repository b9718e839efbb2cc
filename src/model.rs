use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// A feed post that passed the group/user/day filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Raw `create_time` as sent by the feed: ISO-8601 or epoch seconds.
    pub create_time: String,
    pub text: String,
    pub group_id: String,
    pub user_id: String,
}

impl Message {
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        parse_create_time(&self.create_time)
    }
}

/// Parse a feed timestamp into a wall-clock date and time.
///
/// ISO-8601 input (optional fractional seconds, optional `+0800`/`+08:00`/`Z`
/// offset) yields the date and time written in the string; the offset is
/// ignored. Unix epoch seconds are converted to local time. Returns `None`
/// for anything else.
pub fn parse_create_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.contains('T') {
        if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
            return Some(dt.naive_local());
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_local());
        }
        return NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok();
    }

    let secs: i64 = raw.parse().ok()?;
    Local
        .timestamp_opt(secs, 0)
        .single()
        .map(|t| t.naive_local())
}

/// True when `raw` parses and its wall-clock date is `today`.
pub fn is_on_date(raw: &str, today: NaiveDate) -> bool {
    parse_create_time(raw)
        .map(|t| t.date() == today)
        .unwrap_or(false)
}
