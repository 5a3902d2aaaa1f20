#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data types shared by the Chicago 311 service request extractor.
//!
//! A run starts from a [`TimeRange`], which is split into day-sized
//! [`Interval`]s. Each interval is paginated with [`PageWindow`]s, and every
//! request to the backend is described by an immutable [`FetchArgs`].
//! Windows that could not be recovered are reported as [`MissedWindow`]s.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, SecondsFormat, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Open311 endpoint for Chicago service requests.
pub const DEFAULT_BASE_URL: &str = "http://311api.cityofchicago.org/open311/v2/requests.json";

/// Records requested per page. Must stay a power of two so failing pages
/// can be halved down to single records.
pub const DEFAULT_PAGE_SIZE: u32 = 128;

/// Number of intervals fetched concurrently.
pub const DEFAULT_PARALLELISM: usize = 10;

/// Total attempts per request (one try plus two retries).
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Fixed wait between attempts of the same request.
pub const DEFAULT_RETRY_WAIT_SECS: u64 = 10;

/// Per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A non-empty span of time, `[start, end)`.
#[derive(Debug, Clone)]
pub struct TimeRange<Tz: TimeZone> {
    start: DateTime<Tz>,
    end: DateTime<Tz>,
}

impl<Tz: TimeZone> TimeRange<Tz> {
    /// Creates a range, or `None` unless `start < end`.
    #[must_use]
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    #[must_use]
    pub const fn start(&self) -> &DateTime<Tz> {
        &self.start
    }

    #[must_use]
    pub const fn end(&self) -> &DateTime<Tz> {
        &self.end
    }
}

/// One unit of a [`TimeRange`], fetched independently of its siblings.
///
/// Intervals are half-open: `start` is covered, `end` is not. The offset of
/// both instants is the one in effect at that moment in the range's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Interval {
    /// The last instant covered by this interval, at microsecond precision.
    ///
    /// The backend treats `end_date` as inclusive, so this is what goes on
    /// the wire.
    #[must_use]
    pub fn inclusive_end(&self) -> DateTime<FixedOffset> {
        self.end - TimeDelta::microseconds(1)
    }

    /// Short `YYYY-MM-DD` label of the interval's first day.
    #[must_use]
    pub fn label(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            self.end.to_rfc3339_opts(SecondsFormat::AutoSi, false)
        )
    }
}

/// A contiguous slice `[start_record, start_record + page_size)` of the
/// backend's paginated result set. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    pub page: u32,
    pub page_size: u32,
}

impl PageWindow {
    /// The first page of a paginated listing.
    #[must_use]
    pub const fn first(page_size: u32) -> Self {
        Self { page: 1, page_size }
    }

    /// The page directly after this one, same size.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            page: self.page + 1,
            page_size: self.page_size,
        }
    }

    /// 0-based offset of the first record covered.
    #[must_use]
    pub fn start_record(self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// 0-based offset one past the last record covered.
    #[must_use]
    pub fn end_record(self) -> u64 {
        self.start_record() + u64::from(self.page_size)
    }

    /// A single-record window cannot be split any further.
    #[must_use]
    pub const fn is_irreducible(self) -> bool {
        self.page_size <= 1
    }

    /// Whether [`Self::children`] can split this window exactly.
    #[must_use]
    pub const fn is_bisectable(self) -> bool {
        self.page_size > 1 && self.page_size.is_power_of_two()
    }

    /// Splits the window into two halves that cover exactly the same
    /// records: no gap, no overlap.
    ///
    /// Returns `None` for irreducible windows and for sizes that are not a
    /// power of two (a window of size `2k` starting at a multiple of `2k`
    /// always starts at a multiple of `k`, which is what makes the halves
    /// addressable as pages).
    #[must_use]
    pub fn children(self) -> Option<[Self; 2]> {
        if !self.is_bisectable() {
            return None;
        }

        let half = self.page_size / 2;
        let page = u32::try_from(self.start_record() / u64::from(half))
            .ok()?
            .checked_add(1)?;

        Some([
            Self {
                page,
                page_size: half,
            },
            Self {
                page: page.checked_add(1)?,
                page_size: half,
            },
        ])
    }

    /// Every single-record window covered by this one, in record order.
    #[must_use]
    pub fn units(self) -> Vec<Self> {
        (self.start_record()..self.end_record())
            .filter_map(|record| u32::try_from(record + 1).ok())
            .map(|page| Self { page, page_size: 1 })
            .collect()
    }
}

impl fmt::Display for PageWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records {}-{} (page {}, size {})",
            self.start_record(),
            self.end_record(),
            self.page,
            self.page_size
        )
    }
}

/// Restricts results to requests updated within `[after, before]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedRange {
    pub after: DateTime<FixedOffset>,
    pub before: DateTime<FixedOffset>,
}

/// Optional request filters applied to every page of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    /// Open311 service codes; empty means all types.
    pub service_codes: Vec<String>,
    pub updated: Option<UpdatedRange>,
}

/// Immutable parameters for one page request.
///
/// Narrower windows are derived with [`FetchArgs::with_window`], which
/// returns an owned copy; nothing is ever mutated in place, so concurrent
/// branches never observe each other's windows.
#[derive(Debug, Clone)]
pub struct FetchArgs {
    interval: Interval,
    filters: Arc<Filters>,
    window: PageWindow,
}

impl FetchArgs {
    #[must_use]
    pub const fn new(interval: Interval, filters: Arc<Filters>, window: PageWindow) -> Self {
        Self {
            interval,
            filters,
            window,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Interval {
        self.interval
    }

    #[must_use]
    pub const fn window(&self) -> PageWindow {
        self.window
    }

    /// Same interval and filters, different window.
    #[must_use]
    pub fn with_window(&self, window: PageWindow) -> Self {
        Self {
            interval: self.interval,
            filters: Arc::clone(&self.filters),
            window,
        }
    }

    /// Query parameters for the Open311 `requests.json` endpoint.
    #[must_use]
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            (
                "start_date",
                self.interval
                    .start
                    .to_rfc3339_opts(SecondsFormat::AutoSi, false),
            ),
            (
                "end_date",
                self.interval
                    .inclusive_end()
                    .to_rfc3339_opts(SecondsFormat::AutoSi, false),
            ),
            ("page", self.window.page.to_string()),
            ("page_size", self.window.page_size.to_string()),
            ("extensions", "true".to_owned()),
        ];

        if !self.filters.service_codes.is_empty() {
            query.push(("service_code", self.filters.service_codes.join(",")));
        }

        if let Some(updated) = &self.filters.updated {
            query.push((
                "updated_after",
                updated.after.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            ));
            query.push((
                "updated_before",
                updated.before.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            ));
        }

        query
    }
}

/// Why a request ultimately failed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, reset, DNS failure and the like.
    Transport,
    Timeout,
    /// HTTP 5xx.
    ServerError,
    /// HTTP 429.
    RateLimited,
    /// HTTP 4xx other than 429.
    ClientError,
    /// A 2xx response whose body is not a JSON array.
    Malformed,
    Other,
}

/// A single-record window that could not be loaded, i.e. accepted data loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedWindow {
    pub interval: Interval,
    pub window: PageWindow,
    /// Full request URL of the final attempt, when one was built.
    pub url: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

/// Tunables for a run. Every field has a default, so a config file only
/// needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub base_url: String,
    pub page_size: u32,
    pub parallelism: usize,
    pub attempts: u32,
    pub retry_wait_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            page_size: DEFAULT_PAGE_SIZE,
            parallelism: DEFAULT_PARALLELISM,
            attempts: DEFAULT_ATTEMPTS,
            retry_wait_secs: DEFAULT_RETRY_WAIT_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ExtractConfig {
    /// Checks the invariants the fetcher relies on.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        if !self.page_size.is_power_of_two() {
            return Err(format!(
                "page_size must be a power of two, got {}",
                self.page_size
            ));
        }
        if self.parallelism == 0 {
            return Err("parallelism must be at least 1".to_owned());
        }
        if self.attempts == 0 {
            return Err("attempts must be at least 1".to_owned());
        }
        if self.base_url.trim().is_empty() {
            return Err("base_url must not be empty".to_owned());
        }
        Ok(())
    }

    #[must_use]
    pub const fn retry_wait(&self) -> Duration {
        Duration::from_secs(self.retry_wait_secs)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
