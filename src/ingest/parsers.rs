//! Format parsers — one per supported chat-export format, all funneling into
//! the common [`Message`] shape so downstream stages are format-agnostic.
//!
//! Contract: malformed individual lines/records are skipped, never fatal.
//! The whole file fails only on an unrecognized extension or an oversized
//! payload.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use quick_xml::events::Event;
use regex::Regex;

use crate::error::AppError;
use crate::ingest::message::{parse_epoch, parse_timestamp, Message};

// ============================================================================
// Dispatch
// ============================================================================

/// Parse one uploaded export file into messages, dispatching on extension.
///
/// Fails the whole file on an unrecognized extension or when `bytes` exceeds
/// `max_bytes`; individual malformed records inside a recognized file are
/// silently skipped.
pub fn parse_export(bytes: &[u8], filename: &str, max_bytes: usize) -> Result<Vec<Message>, AppError> {
    if bytes.len() > max_bytes {
        return Err(AppError::FileTooLarge {
            filename: filename.to_string(),
            limit_mb: max_bytes / (1024 * 1024),
        });
    }

    let extension = filename
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let now = Utc::now();
    let messages = match extension.as_str() {
        "txt" => parse_whatsapp(&String::from_utf8_lossy(bytes), now),
        "csv" => parse_csv(&String::from_utf8_lossy(bytes), now),
        "json" => parse_json(bytes, now),
        "xml" => parse_sms_xml(&String::from_utf8_lossy(bytes), now),
        _ => return Err(AppError::UnsupportedFormat(filename.to_string())),
    };

    tracing::debug!(
        filename = %filename,
        count = messages.len(),
        "Parsed export file"
    );
    Ok(messages)
}

// ============================================================================
// WhatsApp text export
// ============================================================================

/// `[timestamp] sender: message` line pattern. Continuation lines and system
/// messages don't match and are dropped — a known lossy simplification.
fn whatsapp_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[([^\]]+)\]\s*([^:]+):\s*(.*)$").expect("whatsapp line regex")
    })
}

/// Timestamp layouts WhatsApp emits depending on device locale.
const WHATSAPP_LAYOUTS: &[&str] = &[
    "%m/%d/%y, %H:%M",
    "%m/%d/%y, %H:%M:%S",
    "%m/%d/%Y, %H:%M",
    "%m/%d/%Y, %H:%M:%S",
    "%m/%d/%y, %I:%M %p",
    "%m/%d/%y, %I:%M:%S %p",
];

fn parse_whatsapp_timestamp(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let trimmed = raw.trim();
    for layout in WHATSAPP_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Utc.from_utc_datetime(&naive);
        }
    }
    parse_timestamp(trimmed, now)
}

fn parse_whatsapp(content: &str, now: DateTime<Utc>) -> Vec<Message> {
    let re = whatsapp_line_re();
    content
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line.trim_end_matches('\r'))?;
            let sender = caps[2].trim();
            let text = caps[3].trim();
            if sender.is_empty() || text.is_empty() {
                return None;
            }
            Some(Message::new(
                sender,
                text,
                parse_whatsapp_timestamp(&caps[1], now),
            ))
        })
        .collect()
}

// ============================================================================
// CSV export
// ============================================================================

/// Split one CSV record into fields, honoring double-quoted fields with
/// `""` escapes. Enough for the three-column export format; not a general
/// CSV reader.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Header-driven CSV: locates `sender`, `message`, `timestamp` columns by
/// name (case-insensitive). Rows missing sender or message are skipped;
/// missing timestamps default to `now`.
fn parse_csv(content: &str, now: DateTime<Utc>) -> Vec<Message> {
    let mut lines = content.lines().map(|l| l.trim_end_matches('\r'));

    let header = match lines.next() {
        Some(h) => split_csv_line(h),
        None => return Vec::new(),
    };
    let col = |name: &str| {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let (sender_idx, message_idx, timestamp_idx) =
        match (col("sender"), col("message"), col("timestamp")) {
            (Some(s), Some(m), t) => (s, m, t),
            // Without the two required columns every row would be skipped anyway.
            _ => return Vec::new(),
        };

    lines
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let fields = split_csv_line(line);
            let sender = fields.get(sender_idx)?.trim();
            let text = fields.get(message_idx)?.trim();
            if sender.is_empty() || text.is_empty() {
                return None;
            }
            let timestamp = timestamp_idx
                .and_then(|i| fields.get(i))
                .map(|raw| parse_timestamp(raw, now))
                .unwrap_or(now);
            Some(Message::new(sender, text, timestamp))
        })
        .collect()
}

// ============================================================================
// JSON export
// ============================================================================

/// Top-level array of `{sender, message, timestamp}`. Non-array input yields
/// an empty result rather than an error.
fn parse_json(bytes: &[u8], now: DateTime<Utc>) -> Vec<Message> {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };
    let entries = match value.as_array() {
        Some(arr) => arr,
        None => return Vec::new(),
    };

    entries
        .iter()
        .filter_map(|entry| {
            let sender = entry.get("sender")?.as_str()?.trim();
            let text = entry.get("message")?.as_str()?.trim();
            if sender.is_empty() || text.is_empty() {
                return None;
            }
            let timestamp = match entry.get("timestamp") {
                Some(v) if v.is_string() => parse_timestamp(v.as_str().unwrap_or(""), now),
                Some(v) if v.is_i64() => parse_epoch(v.as_i64().unwrap_or(0), now),
                _ => now,
            };
            Some(Message::new(sender, text, timestamp))
        })
        .collect()
}

// ============================================================================
// SMS backup XML
// ============================================================================

/// SMS Backup & Restore shape: `<smses><sms address=".." body=".."
/// date="epoch-millis"/></smses>`. Entries missing address or body are
/// skipped.
fn parse_sms_xml(content: &str, now: DateTime<Utc>) -> Vec<Message> {
    let mut reader = quick_xml::Reader::from_str(content);
    let mut messages = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"sms" => {
                let mut address = None;
                let mut body = None;
                let mut date = None;
                for attr in e.attributes().flatten() {
                    let value = match attr.unescape_value() {
                        Ok(v) => v.into_owned(),
                        Err(_) => continue,
                    };
                    match attr.key.as_ref() {
                        b"address" => address = Some(value),
                        b"body" => body = Some(value),
                        b"date" => date = Some(value),
                        _ => {}
                    }
                }
                let (sender, text) = match (address, body) {
                    (Some(a), Some(b)) if !a.trim().is_empty() && !b.trim().is_empty() => (a, b),
                    _ => continue,
                };
                let timestamp = date
                    .and_then(|d| d.trim().parse::<i64>().ok())
                    .map(|millis| Utc.timestamp_millis_opt(millis).single().unwrap_or(now))
                    .unwrap_or(now);
                messages.push(Message::new(sender.trim(), text.trim(), timestamp));
            }
            Ok(Event::Eof) => break,
            // Malformed XML past this point: keep what we already have.
            Err(_) => break,
            _ => {}
        }
    }

    messages
}

// ============================================================================
// Tests
// ============================================================================
