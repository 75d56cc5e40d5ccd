//! Retry classification and log formatting.
//!
//! Every attempt ends in one of a handful of states. Only the rate-limit status
//! and connection-level transport faults are retried; everything else is
//! terminal and goes to the response handler.

use reqwest::{Error as ReqwestError, StatusCode};
use std::time::Duration;

/// Why an attempt is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// HTTP 429 from the remote service
    Throttled,
    /// Connect failure, DNS failure or refused connection
    ConnectFailed,
    /// Transport-level timeout
    TimedOut,
    /// Attempt aborted by the watchdog
    Aborted,
}

impl RetryReason {
    /// Short description used in log lines.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Throttled => "rate limited",
            Self::ConnectFailed => "connection failed",
            Self::TimedOut => "network timeout",
            Self::Aborted => "request aborted by watchdog",
        }
    }

    /// Whether the governor should be fed a throttle for this reason.
    pub fn feeds_governor(&self) -> bool {
        matches!(self, Self::Throttled)
    }
}

/// Whether a status code signals rate limiting.
pub fn is_throttled(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
}

/// Classify a transport error: `Some` when the attempt should be retried.
pub fn transport_retry_reason(error: &ReqwestError) -> Option<RetryReason> {
    if error.is_timeout() {
        Some(RetryReason::TimedOut)
    } else if error.is_connect() {
        Some(RetryReason::ConnectFailed)
    } else {
        None
    }
}

/// Log line for a scheduled retry.
pub fn format_retry(
    attempt: u32,
    max_retries: u32,
    reason: RetryReason,
    backoff: Duration,
    endpoint: &str,
) -> String {
    format!(
        "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({endpoint})",
        attempt + 1,
        max_retries,
        reason.description(),
        backoff.as_secs_f64()
    )
}

/// Log line for an exhausted retry budget.
pub fn format_exhausted(attempts: u32, reason: RetryReason, endpoint: &str) -> String {
    format!(
        "[FAILED] {endpoint} still failing after {attempts} attempts, last error: {}",
        reason.description()
    )
}
