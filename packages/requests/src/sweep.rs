//! Bounded-concurrency sweep over a sequence of intervals.
//!
//! At most `parallelism` intervals are in flight at once. Intervals are
//! pulled lazily from the generator as slots free up, and results are
//! consumed in completion order by a single loop that writes each
//! interval's records to the output in one contiguous block. Nothing is
//! kept once it has been written.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use chicago_requests_models::Interval;
use futures::stream::{self, StreamExt as _};

use crate::RequestsError;
use crate::client::PageSource;
use crate::fetcher::{IntervalFetcher, IntervalResult};
use crate::output::write_json_lines;
use crate::progress::ProgressCallback;

/// Anything that can fetch one whole interval.
pub trait FetchInterval: Send + Sync {
    fn fetch_interval(&self, interval: Interval) -> impl Future<Output = IntervalResult> + Send;
}

impl<S: PageSource> FetchInterval for IntervalFetcher<S> {
    fn fetch_interval(&self, interval: Interval) -> impl Future<Output = IntervalResult> + Send {
        self.fetch(interval)
    }
}

/// Totals for a finished sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub intervals: u64,
    pub records: u64,
    pub missed: u64,
}

/// Fetches every interval with at most `parallelism` in flight and writes
/// records to `out` as JSON lines as each interval completes.
///
/// Progress is reported in intervals completed out of the total.
///
/// # Errors
///
/// Returns [`RequestsError::Io`] if writing to `out` fails. Fetch failures
/// never end the sweep; they surface as missed records.
pub async fn sweep<F, I, W>(
    fetcher: &F,
    intervals: I,
    parallelism: usize,
    out: &mut W,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<SweepSummary, RequestsError>
where
    F: FetchInterval,
    I: Iterator<Item = Interval> + Clone,
    W: Write + ?Sized,
{
    let total = intervals.clone().count() as u64;
    progress.set_total(total);
    log::info!("Fetching {total} interval(s), {parallelism} at a time");

    let mut results = stream::iter(intervals)
        .map(|interval| fetcher.fetch_interval(interval))
        .buffer_unordered(parallelism.max(1));

    let mut summary = SweepSummary::default();

    while let Some(result) = results.next().await {
        write_json_lines(out, &result.records)?;
        out.flush()?;

        summary.intervals += 1;
        summary.records += result.records.len() as u64;
        summary.missed += result.missed;

        log::info!(
            "[{}] {} record(s), {} missed ({}/{total})",
            result.interval.label(),
            result.records.len(),
            result.missed,
            summary.intervals
        );
        progress.advance(&result.interval.label());
    }

    Ok(summary)
}
