//! Progress of a sweep, counted in intervals.
//!
//! The core only reports; how progress is shown (an `indicatif` bar in the
//! binary, nothing in tests) is up to the [`ProgressCallback`] it is given.

use std::sync::Arc;

/// Receives progress updates from [`crate::sweep::sweep`].
pub trait ProgressCallback: Send + Sync {
    /// Number of intervals the sweep will fetch.
    fn set_total(&self, total: u64);

    /// One more interval has been written out; `label` names it.
    fn advance(&self, label: &str);

    /// The sweep is over; remove any indicator.
    fn finish_and_clear(&self);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn advance(&self, _label: &str) {}
    fn finish_and_clear(&self) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
