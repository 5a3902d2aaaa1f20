//! Recovery of a page that keeps failing.
//!
//! The backend fails in proportion to how heavy a request is, not because
//! of any particular record, so a page that fails at 128 records usually
//! loads as two pages of 64, or four of 32. [`bisect`] keeps halving the
//! failing part of a window until it loads or is a single record. A single
//! record gets one more attempt; if that fails too it is reported as
//! missed and skipped.
//!
//! The work is an explicit stack of owned [`FetchArgs`], first half on top,
//! so records come back in backend order whenever every half succeeds.
//! Halving a power-of-two window bottoms out after `log2(page_size)`
//! levels, which bounds both the stack depth and the run time.

use chicago_requests_models::{FetchArgs, MissedWindow};
use serde_json::Value;

use crate::RequestsError;
use crate::client::PageSource;
use crate::diagnostics::MissSink;

/// What [`bisect`] managed to get back for one window.
#[derive(Debug, Default)]
pub struct Recovery {
    pub records: Vec<Value>,
    /// Records given up on; one [`MissSink::missed`] call was made for each.
    pub missed: u64,
    /// Requests issued during recovery.
    pub requests: u64,
    /// Deepest halving level reached; the window itself is level 0.
    pub max_depth: u32,
}

struct Pending {
    args: FetchArgs,
    depth: u32,
    /// Set once a single-record window has already failed once.
    last_chance: bool,
}

/// Recovers as much as possible of the window in `args`, which has just
/// failed.
///
/// Never fails: whatever cannot be loaded is reported to `sink` record by
/// record and left out of the result.
pub async fn bisect<S: PageSource + ?Sized>(
    source: &S,
    args: &FetchArgs,
    sink: &dyn MissSink,
) -> Recovery {
    let mut recovery = Recovery::default();
    let mut pending = Vec::new();
    let window = args.window();

    if window.is_irreducible() {
        // The failure that brought us here was the first attempt.
        pending.push(Pending {
            args: args.clone(),
            depth: 0,
            last_chance: true,
        });
    } else if window.is_bisectable() {
        push_halves(&mut pending, args, 1);
    } else {
        log::warn!(
            "[{}] {window} cannot be halved exactly, retrying it one record at a time",
            args.interval().label()
        );
        for unit in window.units().into_iter().rev() {
            pending.push(Pending {
                args: args.with_window(unit),
                depth: 1,
                last_chance: false,
            });
        }
    }

    while let Some(job) = pending.pop() {
        recovery.max_depth = recovery.max_depth.max(job.depth);
        recovery.requests += 1;
        log::debug!(
            "[{}] bisecting into {}",
            job.args.interval().label(),
            job.args.window()
        );

        let result = source.fetch_page(&job.args).await;
        match result {
            Ok(records) => recovery.records.extend(records),
            Err(_) if job.args.window().is_bisectable() => {
                push_halves(&mut pending, &job.args, job.depth + 1);
            }
            Err(_) if !job.last_chance => pending.push(Pending {
                last_chance: true,
                ..job
            }),
            Err(e) => {
                report_miss(sink, &job.args, &e);
                recovery.missed += u64::from(job.args.window().page_size);
            }
        }
    }

    if recovery.missed > 0 {
        log::info!(
            "[{}] recovered {} record(s) of {window}, missed {}",
            args.interval().label(),
            recovery.records.len(),
            recovery.missed
        );
    }

    recovery
}

fn push_halves(pending: &mut Vec<Pending>, args: &FetchArgs, depth: u32) {
    if let Some([first, second]) = args.window().children() {
        pending.push(Pending {
            args: args.with_window(second),
            depth,
            last_chance: false,
        });
        pending.push(Pending {
            args: args.with_window(first),
            depth,
            last_chance: false,
        });
    }
}

fn report_miss(sink: &dyn MissSink, args: &FetchArgs, error: &RequestsError) {
    sink.missed(&MissedWindow {
        interval: args.interval(),
        window: args.window(),
        url: error.url().map(str::to_owned),
        kind: error.failure_kind(),
        message: error.to_string(),
    });
}
