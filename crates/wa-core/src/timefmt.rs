//! The fixed `YYYY-MM-DDTHH:MM:SSZ` datetime format.
//!
//! Used both for the `timestamp` field of web-log records and for the
//! reference time of a compaction tick. Only the zero-padded UTC form is
//! accepted; anything else (spaces, offsets, fractional seconds, short
//! fields) is rejected, as are well-formed strings naming impossible dates.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// strftime pattern of the fixed format.
pub const FIXED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

static FIXED_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$").expect("fixed timestamp regex")
});

/// Parse a string in the fixed format. `None` if the shape or the calendar
/// value is wrong.
pub fn parse_fixed(value: &str) -> Option<DateTime<Utc>> {
    if !FIXED_SHAPE.is_match(value) {
        return None;
    }
    NaiveDateTime::parse_from_str(value, FIXED_FORMAT)
        .ok()
        // chrono reads second 60 as a leap second; seconds stop at 59 here
        .filter(|naive| naive.nanosecond() < 1_000_000_000)
        .map(|naive| naive.and_utc())
}

/// Render a UTC instant in the fixed format.
pub fn format_fixed(value: &DateTime<Utc>) -> String {
    value.format(FIXED_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_accepts_canonical() {
        let dt = parse_fixed("2022-09-16T07:35:46Z").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2022, 9, 16));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (7, 35, 46));
    }

    #[test]
    fn test_rejects_other_layouts() {
        for bad in [
            "2022-09-16 07:35:46",
            "2022-09-16T07:35:46",
            "2022-09-16T07:35:46+00:00",
            "2022-09-16T07:35:46.123Z",
            "2022-9-16T07:35:46Z",
            " 2022-09-16T07:35:46Z",
            "2022-09-16T07:35:46Z\n",
            "",
        ] {
            assert!(parse_fixed(bad).is_none(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_rejects_impossible_dates() {
        assert!(parse_fixed("2022-02-30T00:00:00Z").is_none());
        assert!(parse_fixed("2022-13-01T00:00:00Z").is_none());
        assert!(parse_fixed("2022-01-01T24:00:00Z").is_none());
        assert!(parse_fixed("2022-01-01T00:00:60Z").is_none());
        assert!(parse_fixed("2016-12-31T23:59:60Z").is_none());
    }

    #[test]
    fn test_format_roundtrip() {
        let dt = parse_fixed("2020-02-28T03:05:00Z").unwrap();
        assert_eq!(format_fixed(&dt), "2020-02-28T03:05:00Z");
    }
}
