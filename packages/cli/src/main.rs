#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line extractor for Chicago 311 service requests.
//!
//! Writes service requests as line-delimited JSON to stdout; logging and
//! the progress bar go to stderr. Uses `indicatif-log-bridge` (via
//! [`chicago_requests_cli_utils::init_logger`]) so that log lines and the
//! progress bar never fight for the terminal.

mod config;
mod dates;

use std::io::{self, BufWriter, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use chicago_requests::client::RequestsClient;
use chicago_requests::diagnostics::{LogMissSink, MissSink};
use chicago_requests::fetcher::IntervalFetcher;
use chicago_requests::intervals::day_intervals;
use chicago_requests::request_types::{request_types_table, resolve_request_types};
use chicago_requests::sweep::sweep;
use chicago_requests_cli_utils::{
    IndicatifProgress, MissedRequestFile, init_logger, verbosity_level,
};
use chicago_requests_models::Filters;
use chrono::{NaiveDate, Utc};
use chrono_tz::America::Chicago;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory as _, Parser};

use crate::config::Overrides;
use crate::dates::{DateArgs, EARLIEST_DATE};

/// Download service requests from the Chicago Open311 API.
///
/// By default, today's requests of all types. Writes service requests as
/// line-delimited JSON to stdout.
#[derive(Parser)]
#[command(name = "chicagorequests")]
struct Cli {
    /// The first day of the time range to check for created service requests
    #[arg(short, long, value_name = "YYYY-MM-DD")]
    start_date: Option<NaiveDate>,

    /// The last day of the time range to check for created service requests
    #[arg(short, long, value_name = "YYYY-MM-DD")]
    end_date: Option<NaiveDate>,

    /// The first day of the time range to check for updated service requests
    #[arg(long, value_name = "YYYY-MM-DD")]
    updated_start_date: Option<NaiveDate>,

    /// The last day of the time range to check for updated service requests
    #[arg(long, value_name = "YYYY-MM-DD")]
    updated_end_date: Option<NaiveDate>,

    /// Service types to fetch (repeatable)
    #[arg(short = 't', long = "request-type", value_name = "TYPE")]
    request_types: Vec<String>,

    /// Verbosity level (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Quiet level (errors only)
    #[arg(short, long, action = ArgAction::Count)]
    quiet: u8,

    /// List valid request types and exit
    #[arg(long)]
    list_request_types: bool,

    /// Number of days to request in parallel [default: 10]
    #[arg(long, value_name = "N")]
    parallel: Option<usize>,

    /// Records per page; must be a power of two [default: 128]
    #[arg(long, value_name = "N")]
    page_size: Option<u32>,

    /// Append a JSON line for every request that could not be loaded
    #[arg(long, value_name = "PATH")]
    bad_request_file: Option<PathBuf>,

    /// TOML file with run settings
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Open311 requests endpoint
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,
}

impl Cli {
    const fn date_args(&self) -> DateArgs {
        DateArgs {
            start: self.start_date,
            end: self.end_date,
            updated_start: self.updated_start_date,
            updated_end: self.updated_end_date,
        }
    }
}

fn usage_error(kind: ErrorKind, message: impl std::fmt::Display) -> ! {
    Cli::command().error(kind, message).exit()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.list_request_types {
        print!("{}", request_types_table());
        return Ok(());
    }

    let multi = init_logger(verbosity_level(cli.verbose, cli.quiet));

    let service_codes = resolve_request_types(&cli.request_types)
        .unwrap_or_else(|e| usage_error(ErrorKind::InvalidValue, e));

    let today = Utc::now().with_timezone(&Chicago).date_naive();
    let resolved = dates::resolve_dates(cli.date_args(), today)
        .unwrap_or_else(|e| usage_error(ErrorKind::ArgumentConflict, e));
    let Some(resolved) = resolved else {
        log::warn!(
            "Nothing to fetch: no service requests exist before {EARLIEST_DATE} or after {today}"
        );
        return Ok(());
    };

    let config = config::finalize(
        config::load_config(cli.config.as_deref())?,
        Overrides {
            parallelism: cli.parallel,
            page_size: cli.page_size,
            base_url: cli.base_url.clone(),
        },
    )?;

    let range = resolved.created.to_time_range()?;
    let filters = Filters {
        service_codes,
        updated: resolved
            .updated
            .map(dates::DayRange::to_updated_range)
            .transpose()?,
    };

    log::info!(
        "Fetching requests created {} to {}{}",
        resolved.created.first,
        resolved.created.last,
        resolved.updated.map_or_else(String::new, |u| format!(
            ", updated {} to {}",
            u.first, u.last
        ))
    );

    let sink: Arc<dyn MissSink> = match &cli.bad_request_file {
        Some(path) => Arc::new(MissedRequestFile::create(path)?),
        None => Arc::new(LogMissSink),
    };

    let client = RequestsClient::new(&config)?;
    let fetcher = IntervalFetcher::new(client, filters, config.page_size, sink);
    let progress = IndicatifProgress::steps_bar(&multi, "Fetching");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let summary = sweep(
        &fetcher,
        day_intervals(&range),
        config.parallelism,
        &mut out,
        &progress,
    )
    .await?;
    out.flush()?;
    progress.finish_and_clear();

    if summary.missed > 0 {
        log::warn!(
            "Wrote {} record(s) from {} day(s); {} record(s) could not be loaded",
            summary.records,
            summary.intervals,
            summary.missed
        );
    } else {
        log::info!(
            "Wrote {} record(s) from {} day(s)",
            summary.records,
            summary.intervals
        );
    }

    Ok(())
}
