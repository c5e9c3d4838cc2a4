//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
///
/// This is the format every timestamp column in the database uses.
pub fn now_rfc3339() -> String {
    to_rfc3339(&now())
}

/// Format a timestamp the way the database stores it
pub fn to_rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert a Unix epoch in milliseconds to an RFC 3339 string.
///
/// Returns `None` for values chrono cannot represent.
pub fn epoch_millis_to_rfc3339(millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(millis).single().map(|ts| to_rfc3339(&ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_rfc3339_roundtrips_through_chrono() {
        let s = now_rfc3339();
        let parsed = DateTime::parse_from_rfc3339(&s);
        assert!(parsed.is_ok(), "not RFC 3339: {}", s);
    }

    #[test]
    fn test_epoch_millis_conversion() {
        assert_eq!(
            epoch_millis_to_rfc3339(1_700_000_000_000).as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
    }

    #[test]
    fn test_epoch_millis_out_of_range() {
        assert_eq!(epoch_millis_to_rfc3339(i64::MAX), None);
    }
}
