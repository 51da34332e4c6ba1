// SPDX-License-Identifier: MIT

//! Shared helpers for date/time formatting.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time as RFC3339.
pub fn now_rfc3339() -> String {
    format_utc_rfc3339(Utc::now())
}

/// Parse an RFC3339 timestamp into UTC.
pub fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The UTC calendar date of a timestamp, as `YYYY-MM-DD`.
pub fn utc_date_string(ts: DateTime<Utc>) -> String {
    ts.date_naive().format("%Y-%m-%d").to_string()
}

/// Start of a UTC calendar day.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc()
}

/// End of a UTC calendar day (inclusive upper bound for range fetches).
pub fn day_end(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(23, 59, 59)
        .expect("valid time of day")
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_date_string() {
        let ts = parse_rfc3339("2026-03-01T23:45:00Z").unwrap();
        assert_eq!(utc_date_string(ts), "2026-03-01");

        // Offset timestamps are normalized to UTC before taking the date
        let ts = parse_rfc3339("2026-03-01T23:45:00-05:00").unwrap();
        assert_eq!(utc_date_string(ts), "2026-03-02");
    }

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(format_utc_rfc3339(day_start(date)), "2026-03-01T00:00:00Z");
        assert_eq!(format_utc_rfc3339(day_end(date)), "2026-03-01T23:59:59Z");
    }
}
