use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One chat message, normalized across all supported export formats.
/// Immutable once created; ordering is by `timestamp` ascending with ties
/// broken by input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: impl Into<String>, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            timestamp,
        }
    }
}

/// Datetime layouts seen across real exports. Tried in order.
const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%y %H:%M",
];

/// Parse a free-form timestamp string, falling back to `now`.
///
/// The fallback is deliberate: a message with an unreadable timestamp is
/// still worth keeping for style profiling, and downstream stages only need
/// a total order, not exact wall-clock truth.
pub fn parse_timestamp(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return now;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.with_timezone(&Utc);
    }

    for layout in DATETIME_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Utc.from_utc_datetime(&naive);
        }
    }

    // Bare date
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Utc.from_utc_datetime(&naive);
        }
    }

    // Numeric epoch: seconds or milliseconds
    if let Ok(n) = trimmed.parse::<i64>() {
        return parse_epoch(n, now);
    }

    now
}

/// Interpret a numeric epoch value, auto-detecting seconds vs milliseconds.
pub fn parse_epoch(n: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    // Anything past ~year 33658 as seconds is really milliseconds.
    let result = if n > 10_000_000_000 {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    };
    result.unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_timestamp("2023-01-02T10:30:00Z", fixed_now());
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 1, 2, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_common_layouts() {
        let ts = parse_timestamp("2023-01-02 10:30:00", fixed_now());
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 1, 2, 10, 30, 0).unwrap());

        let ts = parse_timestamp("1/2/2023 10:30", fixed_now());
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 1, 2, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_epoch_millis_and_secs() {
        let millis = 1_672_655_400_000_i64; // 2023-01-02T10:30:00Z
        assert_eq!(
            parse_epoch(millis, fixed_now()),
            Utc.with_ymd_and_hms(2023, 1, 2, 10, 30, 0).unwrap()
        );
        let secs = 1_672_655_400_i64;
        assert_eq!(
            parse_epoch(secs, fixed_now()),
            Utc.with_ymd_and_hms(2023, 1, 2, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_unparseable_defaults_to_now() {
        let now = fixed_now();
        assert_eq!(parse_timestamp("not a date", now), now);
        assert_eq!(parse_timestamp("", now), now);
    }
}
