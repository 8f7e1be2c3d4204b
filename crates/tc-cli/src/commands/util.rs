//! Shared utilities for CLI commands.

use chrono::{Datelike, NaiveDate};

/// Parse a `YYYY-MM-DD` report bound.
///
/// Years outside 1970..=9999 are rejected along with anything that is not a
/// real calendar date.
pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    let s = s.trim();
    let well_formed = s.len() == 10 && s.as_bytes()[4] == b'-' && s.as_bytes()[7] == b'-';
    let parsed = well_formed
        .then(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .flatten();
    match parsed {
        Some(date) if (1970..=9999).contains(&date.year()) => Ok(date),
        _ => anyhow::bail!("Invalid date: {s}. Dates must be YYYY-MM-DD"),
    }
}

/// Formats whole seconds for display.
///
/// Rounded output is `Xm` to the nearest minute. Exact output is `Xh Ym Zs`,
/// or `Ym Zs` under an hour. Negative values are shown as zero.
pub fn format_duration(seconds: i64, round_to_nearest_minute: bool) -> String {
    let seconds = seconds.max(0);
    if round_to_nearest_minute {
        return format!("{}m", (seconds + 30) / 60);
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else {
        format!("{minutes}m {secs}s")
    }
}

/// Shortens `text` to at most `max` characters, ending in `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_dates() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date(" 2024-01-15 ").is_ok());
    }

    #[test]
    fn rejects_malformed_dates() {
        for input in [
            "2024-1-15",
            "2024/01/15",
            "20240115",
            "2023-02-29",
            "2024-13-01",
            "1969-12-31",
            "",
        ] {
            assert!(parse_date(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn rounds_to_nearest_minute() {
        assert_eq!(format_duration(0, true), "0m");
        assert_eq!(format_duration(29, true), "0m");
        assert_eq!(format_duration(30, true), "1m");
        assert_eq!(format_duration(3600, true), "60m");
        assert_eq!(format_duration(-5, true), "0m");
    }

    #[test]
    fn exact_durations_show_seconds() {
        assert_eq!(format_duration(59, false), "0m 59s");
        assert_eq!(format_duration(2400, false), "40m 0s");
        assert_eq!(format_duration(3725, false), "1h 2m 5s");
    }

    #[test]
    fn truncates_long_text() {
        assert_eq!(truncate("short", 30), "short");
        let long = "a".repeat(40);
        let cut = truncate(&long, 30);
        assert_eq!(cut.chars().count(), 30);
        assert!(cut.ends_with("..."));
    }
}
