//! Resilient request execution
//!
//! This module owns everything between a caller's [`MarketRequest`] and the
//! [`ResponseHandler`] that consumes the answer.
//!
//! # Overview
//!
//! 1. **Session**: cookies and the session token live in [`session::SessionStore`]
//! 2. **Rate control**: reads wait on the shared [`rate_limit::RateGovernor`]
//! 3. **Pooling**: at most [`config::MAX_CONNECTIONS`] requests are in flight
//! 4. **Watchdog**: [`watchdog::Watchdog`] aborts attempts that outlive their deadline
//! 5. **Retries**: 429s and connection faults are retried up to [`config::MAX_RETRIES`] times
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use steam_market_client::http::{
//!     ClientConfig, MarketRequest, RateGovernor, RequestExecutor, SessionStore, TextHandler,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let session = SessionStore::seeded(config.base_url.clone(), "sessionid=abc");
//! let governor = Arc::new(RateGovernor::new(config.rate));
//! let executor = RequestExecutor::new(config.clone(), session, governor)?;
//!
//! let request = MarketRequest::get(config.endpoint("/market/")?);
//! let html = executor.execute(&request, &mut TextHandler).await??;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - Rate-limit responses and connect/timeout faults are retried internally
//! - Statuses of 400 and above reach the handler as [`Outcome::Rejected`]
//! - Other transport faults reach the handler as [`Outcome::Failed`]
//! - An exhausted retry budget or a missing session token is returned as `Err`

use reqwest::StatusCode;
use std::time::Duration;

pub mod config;
pub mod executor;
pub mod headers;
pub mod rate_limit;
pub mod request;
pub mod response;
pub mod retry;
pub mod session;
pub mod watchdog;

pub use config::{ClientConfig, RetryPolicy};
pub use executor::RequestExecutor;
pub use rate_limit::{RateBounds, RateGovernor};
pub use request::{MarketRequest, Method, RequestOptions};
pub use response::{Outcome, ResponseBody, ResponseHandler, TextHandler};
pub use session::SessionStore;
pub use watchdog::Watchdog;

/// Request layer errors
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Request needs a session token that is not present
    #[error("no session id available for {url}")]
    MissingSession {
        /// Target of the refused request
        url: String,
    },

    /// Retry budget exhausted on throttling or transport faults
    #[error("service unavailable: {url} failed after {attempts} attempts")]
    ServiceUnavailable {
        /// Target of the failed request
        url: String,
        /// Attempts made, including the first
        attempts: u32,
    },

    /// Transport fault that is not retried
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Attempt aborted by the watchdog
    #[error("request aborted after {timeout:?}")]
    Aborted {
        /// Deadline the attempt exceeded
        timeout: Duration,
    },

    /// Reading the body failed
    #[error("body error: {0}")]
    Body(#[source] reqwest::Error),

    /// Body was not the expected JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server rejected the request
    #[error("request rejected with status {status}")]
    Rejected {
        /// Status returned
        status: StatusCode,
        /// Body returned, for diagnostics
        body: String,
    },

    /// Connection pool was shut down
    #[error("connection pool closed")]
    PoolClosed,
}

/// Result type for request layer operations
pub type HttpResult<T> = Result<T, HttpError>;
