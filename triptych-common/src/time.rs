//! Timestamp and calendar-date utilities

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Calendar date key used to identify daily bundles (`YYYY-MM-DD`)
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a `YYYY-MM-DD` date key
pub fn parse_date_key(key: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d")
        .map_err(|e| Error::InvalidInput(format!("Invalid date key '{}': {}", key, e)))
}

/// Fixed-width RFC 3339 form stored in the database
///
/// Fixed width keeps lexical order equal to chronological order, which the
/// trailing-window queries rely on.
pub fn to_db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`to_db_timestamp`]
pub fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Start of a trailing window of `days` ending at `at`
///
/// Errors instead of overflowing when the window reaches past the
/// representable calendar.
pub fn window_start(at: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(days))
        .and_then(|span| at.checked_sub_signed(span))
        .ok_or_else(|| Error::InvalidInput(format!("Window of {} days is out of range", days)))
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
    fn test_date_key_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(date_key(date), "2024-03-09");
        assert_eq!(parse_date_key("2024-03-09").unwrap(), date);
    }

    #[test]
    fn test_parse_date_key_rejects_garbage() {
        assert!(matches!(parse_date_key("03/09/2024"), Err(Error::InvalidInput(_))));
        assert!(parse_date_key("2024-02-30").is_err());
    }

    #[test]
    fn test_db_timestamps_sort_lexically() {
        let earlier = now();
        let later = earlier + Duration::milliseconds(1500);
        let (a, b) = (to_db_timestamp(earlier), to_db_timestamp(later));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_db_timestamp(&a).unwrap().timestamp_micros(), earlier.timestamp_micros());
    }

    #[test]
    fn test_window_start_subtracts_days() {
        let at = now();
        let start = window_start(at, 14).unwrap();
        assert_eq!((at - start).num_days(), 14);
    }

    #[test]
    fn test_window_start_out_of_range_is_error() {
        let result = window_start(now(), 200_000_000);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
