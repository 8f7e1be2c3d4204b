//! Splitting closed intervals into per-day durations.
//!
//! Durations are always measured between UTC instants, so a segment that
//! crosses a daylight-saving transition counts the real elapsed seconds. Each
//! segment is labeled with the local calendar date on which it starts.
//!
//! # Conservation
//!
//! Segments are contiguous from `start` to `end`, so the sum of emitted
//! durations always equals `end - start` in whole seconds.

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

/// Portion of an interval attributed to one local calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaySpan {
    pub date: NaiveDate,
    pub seconds: i64,
}

impl DaySpan {
    /// Date label in `YYYY-MM-DD` form, as stored in `interval_days`.
    pub fn date_label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Splits `[start, end)` at every local midnight of `zone`.
///
/// Returns an empty vector when `start >= end`. Zero-length segments are never
/// emitted.
pub fn slice_days<Tz: TimeZone>(start: DateTime<Utc>, end: DateTime<Utc>, zone: &Tz) -> Vec<DaySpan> {
    let mut spans = Vec::new();
    if start >= end {
        return spans;
    }

    let mut cursor = start;
    while cursor < end {
        let date = cursor.with_timezone(zone).date_naive();
        let boundary = date
            .checked_add_days(Days::new(1))
            .map(|next| local_midnight_to_utc(next, zone));
        let segment_end = match boundary {
            Some(boundary) if boundary > cursor && boundary < end => boundary,
            _ => end,
        };

        let seconds = segment_end.timestamp() - cursor.timestamp();
        if seconds > 0 {
            spans.push(DaySpan { date, seconds });
        }
        cursor = segment_end;
    }
    spans
}

/// Converts local midnight of `date` in `zone` to UTC.
///
/// Ambiguous midnights (fall-back) resolve to the earlier instant. When
/// midnight falls in a spring-forward gap, the first local second of the day
/// that exists is used instead.
pub fn local_midnight_to_utc<Tz: TimeZone>(date: NaiveDate, zone: &Tz) -> DateTime<Utc> {
    let resolve = |secs: u32| {
        let local = date.and_time(NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)?);
        match zone.from_local_datetime(&local) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
            LocalResult::None => None,
        }
    };

    if let Some(midnight) = resolve(0) {
        return midnight;
    }
    // Find the first whole hour past the gap, then narrow to the second the
    // gap ends. Existence is monotonic across that one hour.
    let Some(hour) = (1..24_u32).find(|&hour| resolve(hour * 3600).is_some()) else {
        // No zone skips an entire day; treat the date as UTC if one ever does.
        return date.and_time(NaiveTime::MIN).and_utc();
    };
    let (mut missing, mut present) = ((hour - 1) * 3600, hour * 3600);
    while present - missing > 1 {
        let mid = missing + (present - missing) / 2;
        if resolve(mid).is_some() {
            present = mid;
        } else {
            missing = mid;
        }
    }
    resolve(present).unwrap_or_else(|| date.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{FixedOffset, NaiveDateTime};
    use chrono_tz::America::{New_York, Santiago};

    /// UTC until 2024-09-08T00:00Z, then UTC+00:30, so local clocks jump
    /// from 00:00 to 00:30 on 2024-09-08.
    #[derive(Debug, Clone, Copy)]
    struct HalfHourGap;

    impl HalfHourGap {
        fn transition() -> NaiveDateTime {
            date("2024-09-08").and_time(NaiveTime::MIN)
        }

        fn offset(seconds: i32) -> FixedOffset {
            FixedOffset::east_opt(seconds).unwrap()
        }
    }

    impl TimeZone for HalfHourGap {
        type Offset = FixedOffset;

        fn from_offset(_offset: &FixedOffset) -> Self {
            Self
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let before = *local < Self::transition();
            let after = *local - chrono::Duration::minutes(30) >= Self::transition();
            match (before, after) {
                (true, true) => LocalResult::Ambiguous(Self::offset(0), Self::offset(1800)),
                (true, false) => LocalResult::Single(Self::offset(0)),
                (false, true) => LocalResult::Single(Self::offset(1800)),
                (false, false) => LocalResult::None,
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_time(NaiveTime::MIN))
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc < Self::transition() {
                Self::offset(0)
            } else {
                Self::offset(1800)
            }
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn total(spans: &[DaySpan]) -> i64 {
        spans.iter().map(|span| span.seconds).sum()
    }

    #[test]
    fn empty_when_start_not_before_end() {
        let t = utc("2024-01-15T10:00:00Z");
        assert!(slice_days(t, t, &Utc).is_empty());
        assert!(slice_days(t, utc("2024-01-15T09:00:00Z"), &Utc).is_empty());
    }

    #[test]
    fn same_day_interval_produces_single_span() {
        let spans = slice_days(
            utc("2024-01-15T09:00:00Z"),
            utc("2024-01-15T10:30:00Z"),
            &Utc,
        );
        assert_eq!(
            spans,
            vec![DaySpan {
                date: date("2024-01-15"),
                seconds: 5400
            }]
        );
    }

    #[test]
    fn labels_by_local_date_not_utc_date() {
        // Local 00:30 to 01:10 on the 16th at UTC+1, though 23:30Z is the 15th.
        let zone = FixedOffset::east_opt(3600).unwrap();
        let spans = slice_days(
            utc("2024-01-15T23:30:00Z"),
            utc("2024-01-16T00:10:00Z"),
            &zone,
        );
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].date_label(), "2024-01-16");
        assert_eq!(spans[0].seconds, 2400);
    }

    #[test]
    fn splits_at_local_midnight() {
        let zone = FixedOffset::east_opt(3600).unwrap();
        // Local 22:00 on the 15th to 02:00 on the 16th.
        let spans = slice_days(
            utc("2024-01-15T21:00:00Z"),
            utc("2024-01-16T01:00:00Z"),
            &zone,
        );
        assert_eq!(
            spans,
            vec![
                DaySpan {
                    date: date("2024-01-15"),
                    seconds: 7200
                },
                DaySpan {
                    date: date("2024-01-16"),
                    seconds: 7200
                },
            ]
        );
    }

    #[test]
    fn multi_day_interval_covers_every_day() {
        let start = utc("2024-02-27T18:00:00Z");
        let end = utc("2024-03-02T06:00:00Z");
        let spans = slice_days(start, end, &Utc);

        let dates: Vec<_> = spans.iter().map(DaySpan::date_label).collect();
        assert_eq!(
            dates,
            ["2024-02-27", "2024-02-28", "2024-02-29", "2024-03-01", "2024-03-02"]
        );
        assert_eq!(spans[1].seconds, 86_400);
        assert_eq!(total(&spans), (end - start).num_seconds());
    }

    #[test]
    fn interval_ending_exactly_at_midnight_has_no_empty_tail() {
        let spans = slice_days(
            utc("2024-01-15T22:00:00Z"),
            utc("2024-01-16T00:00:00Z"),
            &Utc,
        );
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].seconds, 7200);
    }

    #[test]
    fn spring_forward_conserves_real_seconds() {
        // 01:30 EST on the transition day; three real hours later is 05:30 EDT.
        let start = utc("2024-03-10T06:30:00Z");
        let end = utc("2024-03-10T09:30:00Z");
        let spans = slice_days(start, end, &New_York);

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].date_label(), "2024-03-10");
        assert_eq!(total(&spans), 3 * 3600);
    }

    #[test]
    fn spring_forward_day_is_23_hours_long() {
        // Local midnight to local midnight across the spring-forward day.
        let start = utc("2024-03-10T05:00:00Z");
        let end = utc("2024-03-11T04:00:00Z");
        let spans = slice_days(start, end, &New_York);

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].seconds, 23 * 3600);
    }

    #[test]
    fn fall_back_conserves_and_splits_correctly() {
        // 23:00 EDT on Nov 2 to 03:00 EST on Nov 3: five real hours.
        let start = utc("2024-11-03T03:00:00Z");
        let end = utc("2024-11-03T08:00:00Z");
        let spans = slice_days(start, end, &New_York);

        assert_eq!(
            spans,
            vec![
                DaySpan {
                    date: date("2024-11-02"),
                    seconds: 3600
                },
                DaySpan {
                    date: date("2024-11-03"),
                    seconds: 4 * 3600
                },
            ]
        );
        assert_eq!(total(&spans), 5 * 3600);
    }

    #[test]
    fn midnight_inside_dst_gap_uses_first_existing_instant() {
        // Santiago skips 00:00-01:00 on 2024-09-08.
        let boundary = local_midnight_to_utc(date("2024-09-08"), &Santiago);
        assert_eq!(boundary, utc("2024-09-08T04:00:00Z"));

        // 22:00 -04 on Sep 7 to 02:00 -03 on Sep 8.
        let start = utc("2024-09-08T02:00:00Z");
        let end = utc("2024-09-08T05:00:00Z");
        let spans = slice_days(start, end, &Santiago);
        assert_eq!(
            spans,
            vec![
                DaySpan {
                    date: date("2024-09-07"),
                    seconds: 7200
                },
                DaySpan {
                    date: date("2024-09-08"),
                    seconds: 3600
                },
            ]
        );
    }

    #[test]
    fn gap_ending_off_the_hour_starts_day_at_transition() {
        let boundary = local_midnight_to_utc(date("2024-09-08"), &HalfHourGap);
        assert_eq!(boundary, utc("2024-09-08T00:00:00Z"));

        let spans = slice_days(
            utc("2024-09-07T23:00:00Z"),
            utc("2024-09-08T01:00:00Z"),
            &HalfHourGap,
        );
        assert_eq!(
            spans,
            vec![
                DaySpan {
                    date: date("2024-09-07"),
                    seconds: 3600
                },
                DaySpan {
                    date: date("2024-09-08"),
                    seconds: 3600
                },
            ]
        );
    }

    #[test]
    fn whole_interval_after_local_midnight_keeps_full_duration() {
        // 23:30Z to 01:10Z is local 00:30 to 02:10 on the 16th at UTC+1.
        let zone = FixedOffset::east_opt(3600).unwrap();
        let spans = slice_days(
            utc("2024-01-15T23:30:00Z"),
            utc("2024-01-16T01:10:00Z"),
            &zone,
        );
        assert_eq!(
            spans,
            vec![DaySpan {
                date: date("2024-01-16"),
                seconds: 6000
            }]
        );
    }

    #[test]
    fn conservation_holds_for_many_intervals() {
        let base = utc("2024-10-30T00:00:00Z");
        for start_offset in (0..72).map(|h| chrono::Duration::minutes(h * 47)) {
            for length in [1, 59, 3_600, 86_399, 200_000] {
                let start = base + start_offset;
                let end = start + chrono::Duration::seconds(length);
                let spans = slice_days(start, end, &New_York);
                assert_eq!(total(&spans), length, "start={start} length={length}");
                assert!(spans.iter().all(|span| span.seconds > 0));
            }
        }
    }
}
