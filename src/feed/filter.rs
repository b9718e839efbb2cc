//! Selects today's posts by the configured author in the configured group.
//!
//! The feed payload is navigated as an untyped JSON document. Every lookup
//! returns `Option`, so an entry with a missing or oddly-typed field is simply
//! skipped and never aborts the pass.

use chrono::{DateTime, Local, NaiveDate};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::identity::identity_of;
use crate::ledger::SentLedger;
use crate::model::{is_on_date, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFilter {
    target_group_id: String,
    target_user_id: String,
}

impl FeedFilter {
    pub fn new(target_group_id: impl Into<String>, target_user_id: impl Into<String>) -> Self {
        Self {
            target_group_id: target_group_id.into(),
            target_user_id: target_user_id.into(),
        }
    }

    /// Matching, not-yet-delivered messages from `payload`, in feed order.
    pub fn filter(&self, payload: &Value, ledger: &SentLedger) -> Vec<Message> {
        self.filter_at(payload, ledger, Local::now())
    }

    #[instrument(skip_all)]
    pub fn filter_at(
        &self,
        payload: &Value,
        ledger: &SentLedger,
        now: DateTime<Local>,
    ) -> Vec<Message> {
        let Some(entries) = payload
            .pointer("/resp_data/dynamics")
            .and_then(Value::as_array)
        else {
            debug!("payload has no resp_data.dynamics");
            return Vec::new();
        };

        let today = now.date_naive();
        let mut out = Vec::new();
        for entry in entries {
            let Some(msg) = self.candidate(entry, today) else {
                continue;
            };
            if ledger.contains_on(today, &identity_of(&msg)) {
                debug!(create_time = %msg.create_time, "skipping already delivered message");
                continue;
            }
            out.push(msg);
        }
        out
    }

    fn candidate(&self, entry: &Value, today: NaiveDate) -> Option<Message> {
        let create_time = entry.get("create_time")?.as_str()?;
        let topic = entry.get("topic")?;
        let group_id = stringify(topic.pointer("/group/group_id")?)?;
        let talk = topic.get("talk")?;
        let user_id = stringify(talk.pointer("/owner/user_id")?)?;
        let text = talk.get("text").and_then(Value::as_str).unwrap_or_default();

        if !is_on_date(create_time, today)
            || group_id != self.target_group_id
            || user_id != self.target_user_id
        {
            return None;
        }

        Some(Message {
            create_time: create_time.to_string(),
            text: decode_text(text),
            group_id,
            user_id,
        })
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn decode_text(raw: &str) -> String {
    if !raw.contains("\\u") {
        return raw.to_string();
    }
    decode_unicode_text(raw).unwrap_or_else(|| raw.to_string())
}

/// Unescape backslash sequences (`\uXXXX`, surrogate pairs, `\n`, `\t`, `\r`,
/// `\"`, `\\`, `\/`). Unknown escapes are kept as written. Returns `None` when
/// a `\u` escape is malformed.
pub fn decode_unicode_text(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('u') => {
                let unit = read_hex4(&mut chars)?;
                let ch = if (0xD800..0xDC00).contains(&unit) {
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return None;
                    }
                    let low = read_hex4(&mut chars)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return None;
                    }
                    char::from_u32(0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00))?
                } else {
                    char::from_u32(unit)?
                };
                out.push(ch);
            }
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('/') => out.push('/'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Some(out)
}

fn read_hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let mut unit = 0u32;
    for _ in 0..4 {
        unit = unit * 16 + chars.next()?.to_digit(16)?;
    }
    Some(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime, TimeZone};
    use serde_json::json;

    fn at(date: NaiveDate, h: u32, m: u32, s: u32) -> DateTime<Local> {
        let naive = date.and_time(NaiveTime::from_hms_opt(h, m, s).unwrap());
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn now() -> DateTime<Local> {
        at(today(), 12, 0, 0)
    }

    fn entry(create_time: &str, group: Value, user: Value, text: &str) -> Value {
        json!({
            "create_time": create_time,
            "topic": {
                "group": { "group_id": group },
                "talk": { "text": text, "owner": { "user_id": user } }
            }
        })
    }

    fn payload(entries: Vec<Value>) -> Value {
        json!({ "succeeded": true, "resp_data": { "dynamics": entries } })
    }

    #[test]
    fn keeps_matching_entries_in_order() {
        let filter = FeedFilter::new("5", "9");
        let feed = payload(vec![
            entry("2024-05-10T09:00:00.000", json!(5), json!(9), "first"),
            entry("2024-05-10T08:00:00.000", json!("5"), json!("9"), "second"),
        ]);
        let out = filter.filter_at(&feed, &SentLedger::in_memory(), now());
        let texts: Vec<_> = out.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(out[0].group_id, "5");
        assert_eq!(out[0].user_id, "9");
    }

    #[test]
    fn rejects_other_group_or_user() {
        let filter = FeedFilter::new("5", "9");
        let feed = payload(vec![
            entry("2024-05-10T09:00:00", json!(6), json!(9), "wrong group"),
            entry("2024-05-10T09:00:00", json!(5), json!(10), "wrong user"),
            entry("2024-05-10T09:00:00", json!(5), json!(9), "ok"),
        ]);
        let out = filter.filter_at(&feed, &SentLedger::in_memory(), now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "ok");
    }

    #[test]
    fn day_window_in_both_formats() {
        let filter = FeedFilter::new("5", "9");
        let midnight = at(today(), 0, 0, 0);
        let last_second = at(today(), 23, 59, 59);
        let yesterday = midnight - Duration::seconds(1);
        let feed = payload(vec![
            entry("2024-05-10T00:00:00.000", json!(5), json!(9), "iso start"),
            entry("2024-05-10T23:59:59.999", json!(5), json!(9), "iso end"),
            entry("2024-05-09T23:59:59.000", json!(5), json!(9), "iso yesterday"),
            entry(&midnight.timestamp().to_string(), json!(5), json!(9), "epoch start"),
            entry(&last_second.timestamp().to_string(), json!(5), json!(9), "epoch end"),
            entry(&yesterday.timestamp().to_string(), json!(5), json!(9), "epoch yesterday"),
        ]);
        let out = filter.filter_at(&feed, &SentLedger::in_memory(), now());
        let texts: Vec<_> = out.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["iso start", "iso end", "epoch start", "epoch end"]);
    }

    #[test]
    fn offset_times_match_on_their_written_date() {
        let filter = FeedFilter::new("5", "9");
        let feed = payload(vec![
            entry("2024-05-10T07:00:00.000+0800", json!(5), json!(9), "early beijing"),
            entry("2024-05-09T23:30:00.000+0800", json!(5), json!(9), "late yesterday"),
        ]);
        let out = filter.filter_at(&feed, &SentLedger::in_memory(), now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "early beijing");
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let filter = FeedFilter::new("5", "9");
        let feed = payload(vec![
            json!({ "create_time": "2024-05-10T09:00:00", "topic": { "group": { "group_id": 5 } } }),
            json!({ "topic": { "group": { "group_id": 5 }, "talk": { "owner": { "user_id": 9 } } } }),
            json!({ "create_time": 1715320800, "topic": {} }),
            json!("not an object"),
            entry("2024-05-10T09:00:00", json!(5), json!(null), "null user"),
            entry("garbage", json!(5), json!(9), "bad time"),
            entry("2024-05-10T09:00:00", json!(5), json!(9), "well formed"),
        ]);
        let out = filter.filter_at(&feed, &SentLedger::in_memory(), now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "well formed");
    }

    #[test]
    fn missing_text_becomes_empty() {
        let filter = FeedFilter::new("5", "9");
        let feed = payload(vec![json!({
            "create_time": "2024-05-10T09:00:00",
            "topic": { "group": { "group_id": 5 }, "talk": { "owner": { "user_id": 9 } } }
        })]);
        let out = filter.filter_at(&feed, &SentLedger::in_memory(), now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "");
    }

    #[test]
    fn payload_without_dynamics_is_empty() {
        let filter = FeedFilter::new("5", "9");
        let ledger = SentLedger::in_memory();
        assert!(filter.filter_at(&json!({}), &ledger, now()).is_empty());
        assert!(filter
            .filter_at(&json!({ "resp_data": { "dynamics": {} } }), &ledger, now())
            .is_empty());
    }

    #[test]
    fn already_delivered_messages_are_dropped() {
        let filter = FeedFilter::new("5", "9");
        let feed = payload(vec![
            entry("2024-05-10T09:00:00", json!(5), json!(9), "sent"),
            entry("2024-05-10T10:00:00", json!(5), json!(9), "fresh"),
        ]);
        let mut ledger = SentLedger::in_memory();
        let first = filter.filter_at(&feed, &ledger, now());
        ledger.record_on(today(), &identity_of(&first[0]));

        let out = filter.filter_at(&feed, &ledger, now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "fresh");
    }

    #[test]
    fn escaped_text_is_decoded() {
        let filter = FeedFilter::new("5", "9");
        let feed = payload(vec![entry(
            "2024-05-10T09:00:00",
            json!(5),
            json!(9),
            "\\u4f60\\u597d world",
        )]);
        let out = filter.filter_at(&feed, &SentLedger::in_memory(), now());
        assert_eq!(out[0].text, "你好 world");
    }

    #[test]
    fn decode_handles_pairs_and_plain_escapes() {
        assert_eq!(decode_unicode_text("\\ud83d\\ude00!").as_deref(), Some("😀!"));
        assert_eq!(decode_unicode_text("a\\nb\\t\\\\").as_deref(), Some("a\nb\t\\"));
        assert_eq!(decode_unicode_text("keep \\q").as_deref(), Some("keep \\q"));
    }

    #[test]
    fn malformed_escape_keeps_raw_text() {
        assert_eq!(decode_unicode_text("\\u12"), None);
        assert_eq!(decode_unicode_text("\\uzzzz"), None);
        assert_eq!(decode_unicode_text("\\ud83d alone"), None);
        assert_eq!(decode_text("bad \\uXYZW"), "bad \\uXYZW");
        assert_eq!(decode_text("already 你好"), "already 你好");
    }
}
