//! In-memory backends shared by the unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chicago_requests_models::{FailureKind, FetchArgs, Interval, MissedWindow, PageWindow};
use chrono::{NaiveDate, NaiveTime, TimeZone};
use chrono_tz::America::Chicago;
use serde_json::{Value, json};

use crate::RequestsError;
use crate::client::PageSource;
use crate::diagnostics::MissSink;

/// The Chicago calendar day starting on `day` (`YYYY-MM-DD`).
pub fn interval(day: &str) -> Interval {
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap();
    let midnight = |d: NaiveDate| {
        Chicago
            .from_local_datetime(&d.and_time(NaiveTime::MIN))
            .earliest()
            .unwrap()
            .fixed_offset()
    };
    Interval {
        start: midnight(date),
        end: midnight(date.succ_opt().unwrap()),
    }
}

type FailRule = Box<dyn Fn(&FetchArgs) -> bool + Send + Sync>;

/// A paginated backend holding a fixed number of records per day.
///
/// Requests for which `fails` returns `true` error out; everything else is
/// served from the day's record list, like the real endpoint would.
pub struct FakeBackend {
    days: BTreeMap<String, usize>,
    fails: FailRule,
    requests: AtomicU64,
    windows: Mutex<Vec<PageWindow>>,
}

impl FakeBackend {
    pub fn new(days: &[(&str, usize)]) -> Self {
        Self {
            days: days.iter().map(|(d, n)| ((*d).to_owned(), *n)).collect(),
            fails: Box::new(|_| false),
            requests: AtomicU64::new(0),
            windows: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn failing_when(
        mut self,
        rule: impl Fn(&FetchArgs) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fails = Box::new(rule);
        self
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn windows(&self) -> Vec<PageWindow> {
        self.windows.lock().unwrap().clone()
    }

    pub fn record(day: &str, index: usize) -> Value {
        json!({ "service_request_id": format!("{day}-{index:05}"), "day": day })
    }
}

impl PageSource for FakeBackend {
    async fn fetch_page(&self, args: &FetchArgs) -> Result<Vec<Value>, RequestsError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().unwrap().push(args.window());

        let day = args.interval().label();
        if (self.fails)(args) {
            let window = args.window();
            return Err(RequestsError::Persistent {
                url: format!("fake://{day}?page={}&page_size={}", window.page, window.page_size),
                attempts: 1,
                kind: FailureKind::ServerError,
                message: "HTTP 500 Internal Server Error".to_owned(),
            });
        }

        let total = self.days.get(&day).copied().unwrap_or(0) as u64;
        let window = args.window();
        let start = window.start_record().min(total);
        let end = window.end_record().min(total);
        Ok((start..end)
            .map(|i| Self::record(&day, usize::try_from(i).unwrap()))
            .collect())
    }
}

/// Collects every miss it is told about.
#[derive(Default)]
pub struct CollectingSink {
    pub misses: Mutex<Vec<MissedWindow>>,
}

impl CollectingSink {
    pub fn count(&self) -> usize {
        self.misses.lock().unwrap().len()
    }
}

impl MissSink for CollectingSink {
    fn missed(&self, miss: &MissedWindow) {
        self.misses.lock().unwrap().push(miss.clone());
    }
}
