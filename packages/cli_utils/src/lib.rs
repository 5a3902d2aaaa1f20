#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the Chicago 311 extractor.
//!
//! Provides an `indicatif`-backed progress bar behind the
//! [`ProgressCallback`] trait, [`init_logger`] which sets up
//! `indicatif-log-bridge` so that `log::info!` and friends are suspended
//! while the bar redraws, and [`MissedRequestFile`], the sink that keeps a
//! record of every request the run had to give up on.

use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write as _};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chicago_requests::diagnostics::{MissSink, log_miss};
use chicago_requests::progress::ProgressCallback;
use chicago_requests_models::MissedWindow;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// Creates a progress bar for step-level progress (e.g., days 3/31).
    /// The length is filled in by [`ProgressCallback::set_total()`].
    #[must_use]
    pub fn steps_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new(0));
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} {wide_bar:.green/dim} {pos}/{len} days [{elapsed_precise}<{eta}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        bar.set_message(message.to_string());

        Arc::new(Self { bar })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn advance(&self, label: &str) {
        self.bar.inc(1);
        self.bar.set_message(label.to_owned());
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Maps `-v`/`-q` counts to a level: warn by default, one `-v` for info,
/// two or more for debug, `-q` for errors only.
#[must_use]
pub const fn verbosity_level(verbose: u8, quiet: u8) -> LevelFilter {
    match (verbose, quiet) {
        (0, 0) => LevelFilter::Warn,
        (0, _) => LevelFilter::Error,
        (1, _) => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// `level` is the default filter; `RUST_LOG`, when set, refines it.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger(level: LevelFilter) -> MultiProgress {
    let multi = MultiProgress::new();

    // Build the pretty-env-logger logger manually so we can wrap it.
    let logger = pretty_env_logger::formatted_builder()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .build();
    let max_level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Ignore error if logger was already set (e.g., in tests)

    log::set_max_level(max_level);

    multi
}

/// Appends one JSON object per missed record to a file, on top of the
/// usual `request_missed` log event.
pub struct MissedRequestFile {
    file: Mutex<LineWriter<File>>,
}

impl MissedRequestFile {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns any error from opening the file.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(LineWriter::new(file)),
        })
    }

    fn append(&self, miss: &MissedWindow) -> io::Result<()> {
        let line = serde_json::to_string(miss)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("missed-request file lock poisoned"))?;
        writeln!(file, "{line}")
    }
}

impl MissSink for MissedRequestFile {
    fn missed(&self, miss: &MissedWindow) {
        log_miss(miss);
        if let Err(e) = self.append(miss) {
            log::error!(
                "Failed to record missed request from {}: {e}",
                miss.interval.label()
            );
        }
    }
}
