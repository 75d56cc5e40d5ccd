//! Observability metrics for the market client
//!
//! Counters and gauges for request volume, 429 responses, retries, watchdog
//! aborts, the governor's current rate and listings produced by crawls.
//!
//! ## Architecture
//!
//! - Uses the `metrics` facade; recording is a no-op until an exporter is installed
//! - [`init_metrics`] installs the Prometheus exporter on a scrape address

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are ignored.
///
/// # Arguments
/// * `addr` - Socket address to bind the scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP requests sent to the market"
    );

    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "Total number of 429 rate limit responses received"
    );

    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Total number of retry attempts"
    );

    describe_counter!(
        "http_watchdog_aborts_total",
        Unit::Count,
        "Total number of attempts aborted by the connection watchdog"
    );

    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );

    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );

    describe_gauge!(
        "rate_governor_permits_per_second",
        Unit::CountPerSecond,
        "Current request rate allowed by the governor"
    );

    describe_counter!(
        "listings_emitted_total",
        Unit::Count,
        "Total number of correlated listings produced"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Times one request attempt
pub struct RequestTimer {
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl RequestTimer {
    /// Start timing an attempt
    pub fn start(endpoint: impl Into<String>, attempt: u32) -> Self {
        let endpoint = endpoint.into();
        let correlation_id = generate_correlation_id();

        debug!(
            correlation_id = %correlation_id,
            endpoint = %endpoint,
            attempt = attempt,
            "Starting HTTP request"
        );

        Self {
            endpoint,
            start_time: Instant::now(),
            correlation_id,
            attempt,
        }
    }

    /// Record a response with a status line
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status_code.to_string(),
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        if status_code == 429 {
            counter!(
                "http_429_errors_total",
                "endpoint" => self.endpoint.clone(),
            )
            .increment(1);

            warn!(
                correlation_id = %self.correlation_id,
                endpoint = %self.endpoint,
                attempt = self.attempt,
                duration_ms = duration.as_millis() as u64,
                "Too many requests"
            );
        }

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            status = status_code,
            duration_ms = duration.as_millis() as u64,
            "HTTP request completed"
        );
    }

    /// Record an attempt that produced no status line
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => "network_error",
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            attempt = self.attempt,
            duration_ms = duration.as_millis() as u64,
            "Network error recorded"
        );
    }

    /// Correlation ID of this attempt
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record retry backoff duration
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!("http_retries_total").increment(1);

    histogram!(
        "retry_backoff_duration_seconds",
        "attempt" => attempt.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Publish the governor's current rate
pub fn record_rate(rate: f64) {
    gauge!("rate_governor_permits_per_second").set(rate);
}

/// Count a watchdog abort
pub fn record_watchdog_abort() {
    counter!("http_watchdog_aborts_total").increment(1);
}

/// Tracks one listings crawl
pub struct CrawlMetrics {
    item: String,
    start_time: Instant,
}

impl CrawlMetrics {
    /// Start tracking a crawl of `item`
    pub fn start(item: impl Into<String>) -> Self {
        let item = item.into();
        info!(item = %item, "Listings crawl started");
        Self {
            item,
            start_time: Instant::now(),
        }
    }

    /// Count listings produced by one page
    pub fn record_page(&self, listings: usize) {
        counter!("listings_emitted_total", "item" => self.item.clone()).increment(listings as u64);
    }

    /// Record a finished crawl
    pub fn record_success(&self, listings: u64, pages: u32) {
        info!(
            item = %self.item,
            listings = listings,
            pages = pages,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Listings crawl completed"
        );
    }

    /// Record a crawl stopped by a fatal error
    pub fn record_failure(&self, error: &str) {
        error!(
            item = %self.item,
            error = %error,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Listings crawl failed"
        );
    }
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}
