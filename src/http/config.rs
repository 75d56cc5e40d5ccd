//! Request layer configuration
//!
//! Constants describe the remote service's tolerance as observed in practice;
//! [`ClientConfig`] bundles them so callers and tests can override any of them.

use once_cell::sync::Lazy;
use std::time::Duration;
use url::Url;

use super::rate_limit::RateBounds;
use super::{HttpError, HttpResult};

/// Default market front end.
pub const DEFAULT_BASE_URL: &str = "https://steamcommunity.com";

static DEFAULT_URL: Lazy<Url> =
    Lazy::new(|| Url::parse(DEFAULT_BASE_URL).expect("hardcoded base URL is valid"));

/// Browser user agent the front end expects.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/45.0.2454.101 Safari/537.36";

/// Maximum number of retries after the first attempt.
/// Attempts are numbered 0..=MAX_RETRIES, so a request is sent at most six times.
pub const MAX_RETRIES: u32 = 5;

/// Initial retry backoff in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 500;

/// Retry backoff cap in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Wall-clock ceiling for one attempt, enforced by the watchdog.
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// TCP connect timeout handed to the transport.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Interval between watchdog sweeps.
pub const WATCHDOG_TICK_MS: u64 = 1_000;

/// Simultaneous requests allowed against the remote service.
pub const MAX_CONNECTIONS: usize = 4;

/// Retry ceiling and backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Backoff before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any single backoff
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Policy that retries without sleeping in between.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Exponential backoff for the given zero-based retry count.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

/// Settings for a [`RequestExecutor`](super::RequestExecutor).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme and host every request is issued against
    pub base_url: Url,
    /// User-Agent header value
    pub user_agent: String,
    /// Per-attempt deadline enforced by the watchdog
    pub request_timeout: Duration,
    /// Transport connect timeout
    pub connect_timeout: Duration,
    /// Watchdog sweep interval
    pub watchdog_tick: Duration,
    /// Size of the connection pool
    pub max_connections: usize,
    /// Retry ceiling and backoff
    pub retry: RetryPolicy,
    /// Bounds for the adaptive rate
    pub rate: RateBounds,
}

impl ClientConfig {
    /// Configuration pointing at another base URL, defaults elsewhere.
    pub fn with_base_url(base_url: &str) -> HttpResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| HttpError::Config(format!("invalid base URL '{base_url}': {e}")))?;
        if base_url.host_str().is_none() {
            return Err(HttpError::Config(format!("base URL '{base_url}' has no host")));
        }
        Ok(Self {
            base_url,
            ..Self::default()
        })
    }

    /// Host header value, including a non-default port.
    pub fn host_header(&self) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        match self.base_url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Origin header value (`scheme://host[:port]`).
    pub fn origin(&self) -> String {
        format!("{}://{}", self.base_url.scheme(), self.host_header())
    }

    /// Resolve a path against the base URL.
    pub fn endpoint(&self, path: &str) -> HttpResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| HttpError::Config(format!("invalid endpoint '{path}': {e}")))
    }

    /// Reject values that would stall or disable the executor.
    pub fn validate(&self) -> HttpResult<()> {
        if self.max_connections == 0 {
            return Err(HttpError::Config("max_connections must be at least 1".to_string()));
        }
        if self.watchdog_tick.is_zero() {
            return Err(HttpError::Config("watchdog tick must be positive".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(HttpError::Config("request timeout must be positive".to_string()));
        }
        self.rate.validate()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.clone(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            watchdog_tick: Duration::from_millis(WATCHDOG_TICK_MS),
            max_connections: MAX_CONNECTIONS,
            retry: RetryPolicy::default(),
            rate: RateBounds::default(),
        }
    }
}
