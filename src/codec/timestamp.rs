//! Legacy note timestamps.
//!
//! Note lines carry a locale-formatted date-time such as
//! `1/1/2024, 10:00:00 AM` rather than an ISO instant. These strings do not
//! sort lexically, so the timeline parses them back into [`NaiveDateTime`].

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

/// Format used when stamping new notes.
pub const NOTE_TIMESTAMP_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Date-time layouts accepted when parsing, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y, %I:%M:%S %p",
    "%m/%d/%Y, %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y, %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Date-only layouts, interpreted as midnight.
const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

/// Format an instant the way note lines store it.
#[must_use]
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(NOTE_TIMESTAMP_FORMAT).to_string()
}

/// The current local time in note format.
#[must_use]
pub fn now_timestamp() -> String {
    format_timestamp(Local::now().naive_local())
}

/// Parse a stored note timestamp into a comparable instant.
///
/// Returns `None` when no known layout matches. RFC 3339 strings keep their
/// wall-clock reading; the offset is dropped so they compare against the
/// offset-less locale strings.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn test_format_matches_legacy_layout() {
        assert_eq!(format_timestamp(at(2024, 1, 1, 10, 0, 0)), "1/1/2024, 10:00:00 AM");
        assert_eq!(format_timestamp(at(2024, 12, 31, 23, 5, 9)), "12/31/2024, 11:05:09 PM");
        assert_eq!(format_timestamp(at(2024, 3, 7, 0, 30, 0)), "3/7/2024, 12:30:00 AM");
    }

    #[test]
    fn test_parse_legacy_layout() {
        assert_eq!(parse_timestamp("1/1/2024, 10:00:00 AM"), Some(at(2024, 1, 1, 10, 0, 0)));
        assert_eq!(parse_timestamp("12/31/2024, 11:05:09 PM"), Some(at(2024, 12, 31, 23, 5, 9)));
        assert_eq!(parse_timestamp("01/02/2024, 12:00:00 PM"), Some(at(2024, 1, 2, 12, 0, 0)));
    }

    #[test]
    fn test_parse_24_hour_and_iso_layouts() {
        assert_eq!(parse_timestamp("1/2/2024, 13:15:00"), Some(at(2024, 1, 2, 13, 15, 0)));
        assert_eq!(parse_timestamp("2024-02-01 08:00:00"), Some(at(2024, 2, 1, 8, 0, 0)));
        assert_eq!(parse_timestamp("2024-02-01T08:00:00"), Some(at(2024, 2, 1, 8, 0, 0)));
        assert_eq!(parse_timestamp("2024-02-01T08:00:00+02:00"), Some(at(2024, 2, 1, 8, 0, 0)));
    }

    #[test]
    fn test_parse_date_only() {
        assert_eq!(parse_timestamp("2024-03-01"), Some(at(2024, 3, 1, 0, 0, 0)));
        assert_eq!(parse_timestamp("3/1/2024"), Some(at(2024, 3, 1, 0, 0, 0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("13/45/2024, 10:00:00 AM"), None);
    }

    #[test]
    fn test_formatted_timestamp_parses_back() {
        let instant = at(2023, 7, 4, 16, 20, 30);
        assert_eq!(parse_timestamp(&format_timestamp(instant)), Some(instant));
    }

    #[test]
    fn test_now_timestamp_is_parseable() {
        assert!(parse_timestamp(&now_timestamp()).is_some());
    }
}
