//! Turns the date flags into the day ranges to fetch.
//!
//! Dates are local days in `America/Chicago`. A range covers its first
//! day from midnight through the end of its last day.

use chicago_requests_models::{TimeRange, UpdatedRange};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeDelta, TimeZone as _};
use chrono_tz::America::Chicago;
use chrono_tz::Tz;

/// No service requests exist before this day.
pub const EARLIEST_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2018, 7, 1) {
    Some(date) => date,
    None => panic!("invalid earliest date"),
};

/// The date flags as given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateArgs {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub updated_start: Option<NaiveDate>,
    pub updated_end: Option<NaiveDate>,
}

/// An inclusive range of local days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DayRange {
    const fn new(first: NaiveDate, last: NaiveDate) -> Self {
        Self { first, last }
    }

    /// Half-open instant range from the first midnight to the midnight
    /// after the last day.
    ///
    /// # Errors
    ///
    /// Returns [`DateError::NoMidnight`] if a boundary does not exist in
    /// Chicago, or [`DateError::OutOfRange`] past the end of the calendar.
    pub fn to_time_range(self) -> Result<TimeRange<Tz>, DateError> {
        let start = local_midnight(self.first)?;
        let end = local_midnight(day_after(self.last)?)?;
        TimeRange::new(start, end).ok_or(DateError::OutOfRange { date: self.first })
    }

    /// The `updated_after`/`updated_before` filter covering these days.
    ///
    /// # Errors
    ///
    /// Same as [`Self::to_time_range`].
    pub fn to_updated_range(self) -> Result<UpdatedRange, DateError> {
        let after = local_midnight(self.first)?;
        let before = local_midnight(day_after(self.last)?)? - TimeDelta::microseconds(1);
        Ok(UpdatedRange {
            after: after.fixed_offset(),
            before: before.fixed_offset(),
        })
    }
}

/// What to fetch once every default has been filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDates {
    pub created: DayRange,
    pub updated: Option<DayRange>,
}

#[derive(Debug, thiserror::Error)]
pub enum DateError {
    #[error("--end-date must be after --start-date")]
    CreatedOrder,

    #[error("--updated-end-date must be after --updated-start-date")]
    UpdatedOrder,

    #[error("{date} has no midnight in America/Chicago")]
    NoMidnight { date: NaiveDate },

    #[error("{date} is out of range")]
    OutOfRange { date: NaiveDate },
}

/// Fills in the defaults for the date flags, given the current local day.
///
/// * No dates at all means today only.
/// * A start without an end runs through today; an end without a start
///   starts at [`EARLIEST_DATE`].
/// * Starts before [`EARLIEST_DATE`] are moved up to it and ends after
///   today are moved back to today.
/// * With only an updated range, requests created from [`EARLIEST_DATE`]
///   through the updated end are fetched.
///
/// Returns `Ok(None)` when there is nothing to fetch: an end before
/// [`EARLIEST_DATE`], or a start that lies in the future.
///
/// # Errors
///
/// Returns [`DateError::CreatedOrder`] or [`DateError::UpdatedOrder`] when
/// a start date falls after its end date.
pub fn resolve_dates(args: DateArgs, today: NaiveDate) -> Result<Option<ResolvedDates>, DateError> {
    let Some(created) = fill_bounds(args.start, args.end, today, DateError::CreatedOrder)? else {
        return Ok(None);
    };
    let Some(updated) = fill_bounds(
        args.updated_start,
        args.updated_end,
        today,
        DateError::UpdatedOrder,
    )?
    else {
        return Ok(None);
    };

    let created = match (created, updated) {
        (Some(created), _) => created,
        (None, Some(updated)) => DayRange::new(EARLIEST_DATE, updated.last),
        (None, None) => DayRange::new(today, today),
    };

    if created.first > created.last || updated.is_some_and(|u| u.first > u.last) {
        log::debug!("Resolved range {created:?} / {updated:?} is empty");
        return Ok(None);
    }

    Ok(Some(ResolvedDates { created, updated }))
}

/// Defaults one start/end pair. The outer `None` means nothing to fetch,
/// the inner one that neither flag was given.
fn fill_bounds(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
    order: DateError,
) -> Result<Option<Option<DayRange>>, DateError> {
    match (start, end) {
        (None, None) => Ok(Some(None)),
        (Some(first), Some(last)) if first > last => Err(order),
        (_, Some(last)) if last < EARLIEST_DATE => Ok(None),
        (first, last) => Ok(Some(Some(DayRange::new(
            first.map_or(EARLIEST_DATE, |d| d.max(EARLIEST_DATE)),
            last.map_or(today, |d| d.min(today)),
        )))),
    }
}

fn local_midnight(date: NaiveDate) -> Result<DateTime<Tz>, DateError> {
    Chicago
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .ok_or(DateError::NoMidnight { date })
}

fn day_after(date: NaiveDate) -> Result<NaiveDate, DateError> {
    date.checked_add_days(Days::new(1))
        .ok_or(DateError::OutOfRange { date })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn today() -> NaiveDate {
        d("2024-06-15")
    }

    fn resolve(args: DateArgs) -> Option<ResolvedDates> {
        resolve_dates(args, today()).unwrap()
    }

    fn created(first: &str, last: &str) -> DayRange {
        DayRange::new(d(first), d(last))
    }

    #[test]
    fn no_dates_means_today() {
        let dates = resolve(DateArgs::default()).unwrap();
        assert_eq!(dates.created, created("2024-06-15", "2024-06-15"));
        assert_eq!(dates.updated, None);
    }

    #[test]
    fn explicit_range_is_kept() {
        let dates = resolve(DateArgs {
            start: Some(d("2020-01-01")),
            end: Some(d("2020-01-31")),
            ..DateArgs::default()
        })
        .unwrap();
        assert_eq!(dates.created, created("2020-01-01", "2020-01-31"));
    }

    #[test]
    fn same_start_and_end_is_one_day() {
        let dates = resolve(DateArgs {
            start: Some(d("2020-01-01")),
            end: Some(d("2020-01-01")),
            ..DateArgs::default()
        })
        .unwrap();
        assert_eq!(dates.created, created("2020-01-01", "2020-01-01"));
    }

    #[test]
    fn start_after_end_is_rejected() {
        let err = resolve_dates(
            DateArgs {
                start: Some(d("2020-02-01")),
                end: Some(d("2020-01-01")),
                ..DateArgs::default()
            },
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, DateError::CreatedOrder));

        let err = resolve_dates(
            DateArgs {
                updated_start: Some(d("2020-02-01")),
                updated_end: Some(d("2020-01-01")),
                ..DateArgs::default()
            },
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, DateError::UpdatedOrder));
    }

    #[test]
    fn end_before_earliest_date_fetches_nothing() {
        assert_eq!(
            resolve(DateArgs {
                end: Some(d("2018-06-30")),
                ..DateArgs::default()
            }),
            None
        );
        assert_eq!(
            resolve(DateArgs {
                updated_end: Some(d("2017-01-01")),
                ..DateArgs::default()
            }),
            None
        );
    }

    #[test]
    fn bounds_are_clamped() {
        let dates = resolve(DateArgs {
            start: Some(d("2015-01-01")),
            end: Some(d("2030-01-01")),
            ..DateArgs::default()
        })
        .unwrap();
        assert_eq!(dates.created, DayRange::new(EARLIEST_DATE, today()));
    }

    #[test]
    fn lone_start_runs_through_today() {
        let dates = resolve(DateArgs {
            start: Some(d("2024-06-01")),
            ..DateArgs::default()
        })
        .unwrap();
        assert_eq!(dates.created, created("2024-06-01", "2024-06-15"));
    }

    #[test]
    fn lone_end_starts_at_earliest_date() {
        let dates = resolve(DateArgs {
            end: Some(d("2019-01-01")),
            ..DateArgs::default()
        })
        .unwrap();
        assert_eq!(dates.created, DayRange::new(EARLIEST_DATE, d("2019-01-01")));

        let dates = resolve(DateArgs {
            end: Some(d("2030-01-01")),
            ..DateArgs::default()
        })
        .unwrap();
        assert_eq!(dates.created, DayRange::new(EARLIEST_DATE, today()));
    }

    #[test]
    fn future_start_fetches_nothing() {
        assert_eq!(
            resolve(DateArgs {
                start: Some(d("2025-01-01")),
                ..DateArgs::default()
            }),
            None
        );
    }

    #[test]
    fn updated_range_alone_drives_created_range() {
        let dates = resolve(DateArgs {
            updated_start: Some(d("2024-01-01")),
            updated_end: Some(d("2024-02-01")),
            ..DateArgs::default()
        })
        .unwrap();
        assert_eq!(dates.updated, Some(created("2024-01-01", "2024-02-01")));
        assert_eq!(dates.created, DayRange::new(EARLIEST_DATE, d("2024-02-01")));

        let dates = resolve(DateArgs {
            updated_start: Some(d("2024-01-01")),
            ..DateArgs::default()
        })
        .unwrap();
        assert_eq!(dates.updated, Some(created("2024-01-01", "2024-06-15")));
        assert_eq!(dates.created, DayRange::new(EARLIEST_DATE, today()));
    }

    #[test]
    fn both_ranges_are_independent() {
        let dates = resolve(DateArgs {
            start: Some(d("2023-01-01")),
            end: Some(d("2023-01-31")),
            updated_start: Some(d("2024-01-01")),
            updated_end: None,
        })
        .unwrap();
        assert_eq!(dates.created, created("2023-01-01", "2023-01-31"));
        assert_eq!(dates.updated, Some(created("2024-01-01", "2024-06-15")));
    }

    #[test]
    fn time_range_spans_local_days() {
        // 2024-03-10 is the spring-forward day in Chicago.
        let range = created("2024-03-09", "2024-03-10").to_time_range().unwrap();
        assert_eq!(range.start().to_rfc3339(), "2024-03-09T00:00:00-06:00");
        assert_eq!(range.end().to_rfc3339(), "2024-03-11T00:00:00-05:00");
        assert_eq!(range.end().timestamp() - range.start().timestamp(), 47 * 3600);
    }

    #[test]
    fn updated_range_ends_at_last_microsecond_of_the_day() {
        let updated = created("2024-07-01", "2024-07-02").to_updated_range().unwrap();
        assert_eq!(updated.after.to_rfc3339(), "2024-07-01T00:00:00-05:00");
        assert_eq!(
            updated.before.to_rfc3339_opts(chrono::SecondsFormat::Micros, false),
            "2024-07-02T23:59:59.999999-05:00"
        );
    }
}
