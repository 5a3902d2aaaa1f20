//! Reporting of accepted data loss.
//!
//! When a single-record window still fails after its last attempt the
//! record is given up on and a [`MissedWindow`] is handed to the run's
//! [`MissSink`]. Sinks are constructed by the binary and injected into the
//! fetcher; the core never configures logging itself.

use chicago_requests_models::MissedWindow;

/// Log target of every missed-request event. Filter on it to route losses
/// to a dedicated file.
pub const REQUEST_MISSED_TARGET: &str = "request_missed";

/// Receives one call per record that could not be loaded.
pub trait MissSink: Send + Sync {
    fn missed(&self, miss: &MissedWindow);
}

/// Sink that only logs, under [`REQUEST_MISSED_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMissSink;

impl MissSink for LogMissSink {
    fn missed(&self, miss: &MissedWindow) {
        log_miss(miss);
    }
}

/// Emits the `request_missed` warning for `miss`.
pub fn log_miss(miss: &MissedWindow) {
    log::warn!(
        target: REQUEST_MISSED_TARGET,
        "Could not load {}. We will miss this request from {} ({}, record {} of {}): {}",
        miss.url.as_deref().unwrap_or("<unbuilt request>"),
        miss.interval.label(),
        miss.kind,
        miss.window.start_record(),
        miss.interval,
        miss.message,
    );
}
