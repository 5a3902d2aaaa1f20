//! Full pagination of a single interval.
//!
//! Pages of `page_size` records are requested in order until the backend
//! runs out. A page that still fails after the client's retries is handed
//! to [`bisect`] and pagination carries on with the next page; this
//! includes the very first page, in which case the whole interval is
//! recovered through bisection page by page.

use std::sync::Arc;

use chicago_requests_models::{FetchArgs, Filters, Interval, PageWindow};
use serde_json::Value;

use crate::bisect::bisect;
use crate::client::PageSource;
use crate::diagnostics::MissSink;

/// Everything one interval produced.
#[derive(Debug)]
pub struct IntervalResult {
    pub interval: Interval,
    pub records: Vec<Value>,
    /// Records given up on within this interval.
    pub missed: u64,
    /// Page windows requested directly (bisection requests not included).
    pub pages: u32,
}

/// Paginates intervals against a [`PageSource`].
pub struct IntervalFetcher<S> {
    source: S,
    filters: Arc<Filters>,
    page_size: u32,
    sink: Arc<dyn MissSink>,
}

impl<S: PageSource> IntervalFetcher<S> {
    /// `page_size` should be a power of two so that failing pages can be
    /// halved exactly (see [`chicago_requests_models::ExtractConfig::validate`]).
    #[must_use]
    pub fn new(source: S, filters: Filters, page_size: u32, sink: Arc<dyn MissSink>) -> Self {
        Self {
            source,
            filters: Arc::new(filters),
            page_size: page_size.max(1),
            sink,
        }
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Fetches every retrievable record of `interval`.
    ///
    /// Never fails: losses are reported to the sink and counted in
    /// [`IntervalResult::missed`].
    pub async fn fetch(&self, interval: Interval) -> IntervalResult {
        let label = interval.label();
        let full_page = self.page_size as usize;
        let mut args = FetchArgs::new(
            interval,
            Arc::clone(&self.filters),
            PageWindow::first(self.page_size),
        );
        let mut result = IntervalResult {
            interval,
            records: Vec::new(),
            missed: 0,
            pages: 0,
        };

        loop {
            result.pages += 1;

            let fetched = self.source.fetch_page(&args).await;
            let more = match fetched {
                Ok(records) => {
                    let more = records.len() >= full_page;
                    result.records.extend(records);
                    more
                }
                Err(e) => {
                    log::info!(
                        "[{label}] page {} failed, bisecting: {e}",
                        args.window().page
                    );
                    let recovery = bisect(&self.source, &args, self.sink.as_ref()).await;
                    let recovered = recovery.records.len();
                    log::debug!(
                        "[{label}] recovered {recovered} record(s) in {} request(s)",
                        recovery.requests
                    );
                    result.missed += recovery.missed;
                    result.records.extend(recovery.records);

                    // A lossless short recovery is the genuine last page; a
                    // lossy one may still have records after it.
                    recovered > 0 && (recovered >= full_page || recovery.missed > 0)
                }
            };

            if !more {
                break;
            }

            args = args.with_window(args.window().next());
        }

        log::debug!(
            "[{label}] {} record(s) in {} page(s), {} missed",
            result.records.len(),
            result.pages,
            result.missed
        );

        result
    }
}
