//! Splits a [`TimeRange`] into calendar-day [`Interval`]s.
//!
//! Day boundaries are local midnights in the range's own time zone, so a
//! day around a DST change is 23 or 25 hours long. The first interval
//! starts at the range start (which need not be midnight) and the last one
//! ends exactly at the range end.

use chrono::{DateTime, NaiveTime, TimeDelta, TimeZone};

use chicago_requests_models::{Interval, TimeRange};

/// How far past a missing local midnight to look for the first valid
/// instant. Real-world DST gaps are at most an hour or two.
const MAX_GAP_STEPS: u32 = 8;
const GAP_STEP_MINUTES: i64 = 30;

/// Lazy sequence of day intervals. Cloning it restarts nothing: each clone
/// continues from the same position independently.
#[derive(Clone)]
pub struct DayIntervals<Tz: TimeZone> {
    next_start: Option<DateTime<Tz>>,
    end: DateTime<Tz>,
}

/// Returns the day intervals covering `range`.
///
/// Pure function of its input: calling it twice yields identical
/// sequences.
#[must_use]
pub fn day_intervals<Tz: TimeZone>(range: &TimeRange<Tz>) -> DayIntervals<Tz> {
    DayIntervals {
        next_start: Some(range.start().clone()),
        end: range.end().clone(),
    }
}

impl<Tz: TimeZone> Iterator for DayIntervals<Tz> {
    type Item = Interval;

    fn next(&mut self) -> Option<Interval> {
        let start = self.next_start.take()?;
        if start >= self.end {
            return None;
        }

        let end = match next_local_midnight(&start) {
            Some(boundary) if boundary < self.end => {
                self.next_start = Some(boundary.clone());
                boundary
            }
            _ => self.end.clone(),
        };

        Some(Interval {
            start: start.fixed_offset(),
            end: end.fixed_offset(),
        })
    }
}

/// The first instant of the local day after `instant`'s day.
fn next_local_midnight<Tz: TimeZone>(instant: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = instant.timezone();
    let mut local = instant.date_naive().succ_opt()?.and_time(NaiveTime::MIN);

    for _ in 0..=MAX_GAP_STEPS {
        if let Some(found) = tz.from_local_datetime(&local).earliest() {
            return Some(found);
        }
        local += TimeDelta::minutes(GAP_STEP_MINUTES);
    }

    None
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};
    use chrono_tz::America::Chicago;

    use super::*;

    fn chicago(s: &str) -> DateTime<chrono_tz::Tz> {
        let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap();
        Chicago.from_local_datetime(&naive).earliest().unwrap()
    }

    fn chicago_range(start: &str, end: &str) -> TimeRange<chrono_tz::Tz> {
        TimeRange::new(chicago(start), chicago(end)).unwrap()
    }

    fn assert_tiles<Tz: TimeZone>(range: &TimeRange<Tz>) -> Vec<Interval> {
        let intervals: Vec<_> = day_intervals(range).collect();
        assert!(!intervals.is_empty());
        assert_eq!(intervals[0].start, range.start().fixed_offset());
        assert_eq!(intervals.last().unwrap().end, range.end().fixed_offset());
        for interval in &intervals {
            assert!(interval.start < interval.end, "empty interval {interval}");
            assert!(interval.end - interval.start <= TimeDelta::hours(25));
        }
        for pair in intervals.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap");
        }
        intervals
    }

    #[test]
    fn whole_days() {
        let range = chicago_range("2024-01-01 00:00", "2024-01-04 00:00");
        let intervals = assert_tiles(&range);
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[1].label(), "2024-01-02");
        assert_eq!(intervals[1].end - intervals[1].start, TimeDelta::days(1));
    }

    #[test]
    fn partial_first_and_last_day() {
        let range = chicago_range("2024-01-01 15:30", "2024-01-03 06:00");
        let intervals = assert_tiles(&range);
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[0].end, chicago("2024-01-02 00:00").fixed_offset());
        assert_eq!(intervals[2].end - intervals[2].start, TimeDelta::hours(6));
    }

    #[test]
    fn range_inside_one_day() {
        let range = chicago_range("2024-01-01 01:00", "2024-01-01 02:00");
        let intervals = assert_tiles(&range);
        assert_eq!(intervals.len(), 1);
    }

    #[test]
    fn dst_days_follow_local_midnight() {
        let range = chicago_range("2024-03-09 00:00", "2024-11-04 00:00");
        let intervals = assert_tiles(&range);

        let spring = intervals.iter().find(|i| i.label() == "2024-03-10").unwrap();
        assert_eq!(spring.end - spring.start, TimeDelta::hours(23));
        let fall = intervals.iter().find(|i| i.label() == "2024-11-03").unwrap();
        assert_eq!(fall.end - fall.start, TimeDelta::hours(25));
        assert_eq!(fall.start.offset(), &FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(fall.end.offset(), &FixedOffset::west_opt(6 * 3600).unwrap());
    }

    #[test]
    fn restartable_and_pure() {
        let range = chicago_range("2024-02-27 08:00", "2024-03-02 00:00");
        let first: Vec<_> = day_intervals(&range).collect();
        let second: Vec<_> = day_intervals(&range).collect();
        assert_eq!(first, second);

        let mut iter = day_intervals(&range);
        iter.next();
        assert_eq!(iter.clone().count(), first.len() - 1);
        assert_eq!(iter.collect::<Vec<_>>(), first[1..].to_vec());
    }

    #[test]
    fn tiles_for_many_ranges() {
        let base = Utc.with_ymd_and_hms(2023, 12, 30, 0, 0, 0).unwrap();
        for start_hours in [0_i64, 1, 7, 23] {
            for len_hours in [1_i64, 5, 24, 25, 47, 48, 24 * 10 + 3] {
                let start = base + TimeDelta::hours(start_hours);
                let end = start + TimeDelta::hours(len_hours);
                let range = TimeRange::new(start, end).unwrap();
                assert_tiles(&range);

                let range = TimeRange::new(
                    start.with_timezone(&Chicago),
                    end.with_timezone(&Chicago),
                )
                .unwrap();
                assert_tiles(&range);
            }
        }
    }
}
