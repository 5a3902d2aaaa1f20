#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loss-aware bulk extraction of Chicago 311 service requests.
//!
//! A time range is split into days ([`intervals`]), days are swept with
//! bounded concurrency ([`sweep`]), each day is paginated ([`fetcher`]) and
//! any page that keeps failing is halved until it either loads or shrinks
//! to a single record ([`bisect`]). Single records that still fail are
//! reported to a [`diagnostics::MissSink`] and the run carries on.
//!
//! All network access goes through the [`client::PageSource`] trait, so
//! every layer above it can run against an in-memory backend.

pub mod bisect;
pub mod client;
pub mod diagnostics;
pub mod fetcher;
pub mod intervals;
pub mod output;
pub mod progress;
pub mod request_types;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

pub use chicago_requests_models as models;

use chicago_requests_models::FailureKind;

/// Errors that can occur while extracting service requests.
#[derive(Debug, thiserror::Error)]
pub enum RequestsError {
    /// HTTP client construction or request building failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error (writing output).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every attempt for one request failed.
    #[error("{kind} after {attempts} attempt(s): {message} ({url})")]
    Persistent {
        /// The request that failed, for logging.
        url: String,
        /// Attempts actually made.
        attempts: u32,
        /// Failure of the last attempt.
        kind: FailureKind,
        /// Description of the last failure.
        message: String,
    },

    /// A user-supplied request type is not in the registry.
    #[error(
        "{name} is not a valid request type. To see valid types run \
         'chicagorequests --list-request-types'"
    )]
    UnknownRequestType {
        /// The rejected name.
        name: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

impl RequestsError {
    /// Classifies the error for missed-request reports.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Persistent { kind, .. } => *kind,
            Self::Http(e) if e.is_timeout() => FailureKind::Timeout,
            Self::Http(_) | Self::Io(_) => FailureKind::Transport,
            Self::UnknownRequestType { .. } | Self::Config { .. } => FailureKind::Other,
        }
    }

    /// The URL of the failed request, if known.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Persistent { url, .. } => Some(url),
            Self::Http(e) => e.url().map(reqwest::Url::as_str),
            _ => None,
        }
    }
}
