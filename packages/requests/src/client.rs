//! HTTP access to the Open311 listing endpoint.
//!
//! Everything above this module talks to a [`PageSource`]; the production
//! implementation is [`RequestsClient`], which wraps a shared
//! [`reqwest::Client`] with a fixed-wait retry loop.
//!
//! # Retry behaviour
//!
//! Each page request gets up to `attempts` attempts, separated by a fixed
//! wait. Connection failures, timeouts, HTTP 429 and HTTP 5xx are retried.
//! A 2xx response whose body is not a JSON array is not trusted: it is
//! treated exactly like a 5xx and retried. HTTP 4xx (except 429) fails
//! immediately. Once attempts run out the caller gets a single
//! [`RequestsError::Persistent`] carrying the request URL.

use std::future::Future;
use std::time::Duration;

use chicago_requests_models::{ExtractConfig, FailureKind, FetchArgs};
use serde_json::Value;

use crate::RequestsError;

const USER_AGENT: &str = concat!("chicagorequests/", env!("CARGO_PKG_VERSION"));

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 200;

/// Something that can return one page of records.
pub trait PageSource: Send + Sync {
    /// Fetches the records covered by `args.window()`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestsError`] once the page cannot be loaded; transient
    /// failures have already been retried by then.
    fn fetch_page(
        &self,
        args: &FetchArgs,
    ) -> impl Future<Output = Result<Vec<Value>, RequestsError>> + Send;
}

/// Outcome of a single failed attempt.
enum AttemptError {
    /// Worth another attempt.
    Retry(FailureKind, String),
    /// Will fail the same way again.
    Fatal(FailureKind, String),
}

/// [`PageSource`] backed by the Open311 HTTP API.
///
/// Cheap to share: one instance (and so one connection pool) serves every
/// concurrent interval of a run.
#[derive(Debug, Clone)]
pub struct RequestsClient {
    http: reqwest::Client,
    base_url: String,
    attempts: u32,
    retry_wait: Duration,
}

impl RequestsClient {
    /// Builds a client from the run configuration.
    ///
    /// The idle connection pool is sized to the configured parallelism so
    /// concurrent intervals reuse connections instead of queuing for them.
    ///
    /// # Errors
    ///
    /// Returns [`RequestsError::Http`] if the TLS backend cannot be
    /// initialized.
    pub fn new(config: &ExtractConfig) -> Result<Self, RequestsError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .pool_max_idle_per_host(config.parallelism.max(1))
            .build()?;

        Ok(Self::with_client(
            http,
            &config.base_url,
            config.attempts,
            config.retry_wait(),
        ))
    }

    /// Wraps an existing [`reqwest::Client`].
    #[must_use]
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        attempts: u32,
        retry_wait: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.to_owned(),
            attempts: attempts.max(1),
            retry_wait,
        }
    }

    /// Core retry loop.
    async fn send(&self, args: &FetchArgs) -> Result<Vec<Value>, RequestsError> {
        let query = args.query();
        let mut last = (FailureKind::Other, String::from("no attempt made"));
        let mut url = self.base_url.clone();

        for attempt in 1..=self.attempts {
            if attempt > 1 {
                log::debug!(
                    "  retry {}/{} in {:?}...",
                    attempt - 1,
                    self.attempts - 1,
                    self.retry_wait
                );
                tokio::time::sleep(self.retry_wait).await;
            }

            let request = self.http.get(&self.base_url).query(&query).build()?;
            url = request.url().to_string();

            match self.attempt(request).await {
                Ok(records) => return Ok(records),
                Err(AttemptError::Fatal(kind, message)) => {
                    return Err(RequestsError::Persistent {
                        url,
                        attempts: attempt,
                        kind,
                        message,
                    });
                }
                Err(AttemptError::Retry(kind, message)) => {
                    log::debug!("  attempt {attempt}/{} failed: {message}", self.attempts);
                    last = (kind, message);
                }
            }
        }

        let (kind, message) = last;
        Err(RequestsError::Persistent {
            url,
            attempts: self.attempts,
            kind,
            message,
        })
    }

    async fn attempt(&self, request: reqwest::Request) -> Result<Vec<Value>, AttemptError> {
        let response = self
            .http
            .execute(request)
            .await
            .map_err(classify_transport)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::Retry(
                FailureKind::RateLimited,
                format!("HTTP {status}"),
            ));
        }
        if status.is_server_error() {
            return Err(AttemptError::Retry(
                FailureKind::ServerError,
                format!("HTTP {status}"),
            ));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(
                FailureKind::ClientError,
                format!("HTTP {status}"),
            ));
        }

        let text = response.text().await.map_err(classify_transport)?;

        parse_records(&text).map_err(|message| AttemptError::Retry(FailureKind::Malformed, message))
    }
}

impl PageSource for RequestsClient {
    async fn fetch_page(&self, args: &FetchArgs) -> Result<Vec<Value>, RequestsError> {
        self.send(args).await
    }
}

fn classify_transport(e: reqwest::Error) -> AttemptError {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Transport
    };

    if is_transient(&e) {
        AttemptError::Retry(kind, e.to_string())
    } else {
        AttemptError::Fatal(kind, e.to_string())
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

/// Parses a response body that must be a JSON array of records.
fn parse_records(body: &str) -> Result<Vec<Value>, String> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(records)) => Ok(records),
        Ok(other) => Err(format!(
            "expected a JSON array of records, got {}: {}",
            json_type(&other),
            preview(body)
        )),
        Err(e) => Err(format!(
            "JSON parse failed: {e} (received {} bytes): {}",
            body.len(),
            preview(body)
        )),
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(body: &str) -> String {
    if body.chars().count() > BODY_PREVIEW_LEN {
        let head: String = body.chars().take(BODY_PREVIEW_LEN).collect();
        format!("{head}...")
    } else {
        body.to_owned()
    }
}
