//! Request executor
//!
//! Runs one [`MarketRequest`] to a terminal [`Outcome`]:
//!
//! - Reads wait on the shared [`RateGovernor`]; writes go out immediately
//! - A semaphore bounds how many requests are on the wire at once
//! - Every attempt is registered with the [`Watchdog`] and unregistered on
//!   every exit path through a drop guard
//! - 429 and connection-level faults are retried; everything else is terminal

use futures_util::future::Abortable;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, error, info, warn, Level};

use super::config::ClientConfig;
use super::headers::build_headers;
use super::rate_limit::RateGovernor;
use super::request::{MarketRequest, Method};
use super::response::{Outcome, ResponseBody, ResponseHandler};
use super::retry::{format_exhausted, format_retry, is_throttled, transport_retry_reason, RetryReason};
use super::session::SessionStore;
use super::watchdog::Watchdog;
use super::{HttpError, HttpResult};
use crate::metrics::{self, RequestTimer};

/// Result of a single attempt.
enum AttemptResult<T> {
    /// Terminal outcome delivered to the handler
    Done(T),
    /// Retryable failure
    Retry(RetryReason),
}

/// Executes market requests with rate control, pooling, watchdog and retries.
pub struct RequestExecutor {
    client: Client,
    config: ClientConfig,
    session: SessionStore,
    governor: Arc<RateGovernor>,
    watchdog: Watchdog,
    connections: Arc<Semaphore>,
}

impl RequestExecutor {
    /// Create an executor and start its watchdog loop.
    ///
    /// Must be called from inside a Tokio runtime. The governor is shared:
    /// pass the same `Arc` to every executor that talks to the same service.
    pub fn new(
        config: ClientConfig,
        session: SessionStore,
        governor: Arc<RateGovernor>,
    ) -> HttpResult<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current().map_err(|_| {
            HttpError::Config("request executor must be created inside a Tokio runtime".to_string())
        })?;

        let client = Client::builder()
            .cookie_provider(session.provider())
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_connections)
            .build()
            .map_err(HttpError::Client)?;

        let watchdog = Watchdog::new(config.watchdog_tick);
        watchdog.spawn();

        info!(
            base_url = %config.base_url,
            max_connections = config.max_connections,
            max_retries = config.retry.max_retries,
            "Request executor ready"
        );

        Ok(Self {
            client,
            connections: Arc::new(Semaphore::new(config.max_connections)),
            config,
            session,
            governor,
            watchdog,
        })
    }

    /// Executor configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session this executor sends and updates.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Shared rate governor.
    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Watchdog tracking this executor's attempts.
    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Run `request` to completion and hand its outcome to `handler`.
    ///
    /// # Errors
    /// - [`HttpError::MissingSession`] when a session is required but absent;
    ///   nothing is sent in that case
    /// - [`HttpError::ServiceUnavailable`] when the retry budget runs out
    pub async fn execute<H>(&self, request: &MarketRequest, handler: &mut H) -> HttpResult<H::Output>
    where
        H: ResponseHandler,
    {
        let token = self.session.session_token();
        if request.options().session_required && token.is_none() {
            error!(url = %request.url(), "Error, sessionid empty");
            return Err(HttpError::MissingSession {
                url: request.url().to_string(),
            });
        }

        let body = request
            .is_write()
            .then(|| request.encode_form(token.as_deref()));

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                method = ?request.method(),
                url = %request.url(),
                cookies = %self.session.current_cookie_header(),
                form = body.as_deref().unwrap_or_default(),
                "Executing request"
            );
        }

        let max_retries = self.config.retry.max_retries;
        let endpoint = request.url().path();
        let mut attempt = 0u32;

        loop {
            let reason = match self.attempt(request, body.as_deref(), attempt, handler).await? {
                AttemptResult::Done(output) => return Ok(output),
                AttemptResult::Retry(reason) => reason,
            };

            if reason.feeds_governor() {
                self.governor.record_throttled();
            }

            if attempt >= max_retries {
                error!("{}", format_exhausted(attempt + 1, reason, endpoint));
                return Err(HttpError::ServiceUnavailable {
                    url: request.url().to_string(),
                    attempts: attempt + 1,
                });
            }

            let backoff = self.config.retry.backoff(attempt);
            warn!("{}", format_retry(attempt, max_retries, reason, backoff, endpoint));
            metrics::record_retry_backoff(backoff, attempt + 1);
            if !backoff.is_zero() {
                sleep(backoff).await;
            }
            attempt += 1;
        }
    }

    async fn attempt<H>(
        &self,
        request: &MarketRequest,
        body: Option<&str>,
        attempt: u32,
        handler: &mut H,
    ) -> HttpResult<AttemptResult<H::Output>>
    where
        H: ResponseHandler,
    {
        if !request.is_write() {
            self.governor.acquire().await;
        }
        debug!(rate = self.governor.rate(), attempt = attempt, "Http rate");

        let _permit = self
            .connections
            .acquire()
            .await
            .map_err(|_| HttpError::PoolClosed)?;
        let (_guard, registration) = self.watchdog.watch(self.config.request_timeout);
        let timer = RequestTimer::start(request.url().path(), attempt);

        match Abortable::new(self.dispatch(request, body, handler, &timer), registration).await {
            Ok(result) => Ok(result),
            Err(_aborted) => {
                timer.record_network_error();
                warn!(
                    url = %request.url(),
                    timeout_ms = self.config.request_timeout.as_millis() as u64,
                    "Request aborted by watchdog"
                );
                Ok(AttemptResult::Retry(RetryReason::Aborted))
            }
        }
    }

    async fn dispatch<H>(
        &self,
        request: &MarketRequest,
        body: Option<&str>,
        handler: &mut H,
        timer: &RequestTimer,
    ) -> AttemptResult<H::Output>
    where
        H: ResponseHandler,
    {
        let url = request.url().clone();
        let mut builder = match request.method() {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        builder = builder.headers(build_headers(&self.config, request));
        if let Some(body) = body {
            builder = builder.body(body.to_string());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                timer.record_network_error();
                if let Some(reason) = transport_retry_reason(&e) {
                    warn!(url = %request.url(), error = %e, "Connection problem");
                    return AttemptResult::Retry(reason);
                }
                error!(url = %request.url(), error = %e, "Error in protocol");
                let output = handler.handle(Outcome::Failed(HttpError::Transport(e))).await;
                return AttemptResult::Done(output);
            }
        };

        let status = response.status();
        timer.record_complete(status.as_u16());
        if is_throttled(status) {
            return AttemptResult::Retry(RetryReason::Throttled);
        }

        self.governor.record_success();
        let body = ResponseBody::new(response);
        let outcome = if status.as_u16() >= 400 {
            info!(url = %request.url(), status = status.as_u16(), "Status code");
            Outcome::Rejected(body)
        } else {
            Outcome::Success(body)
        };
        AttemptResult::Done(handler.handle(outcome).await)
    }
}
