//! Adaptive rate governor
//!
//! One shared permits-per-second value for every caller. A 429 from the remote
//! service shrinks it by 5%, every other completed response grows it by 5%,
//! always within [`RateBounds`]. Permits are handed out on a smooth schedule:
//! each acquisition reserves the next free slot and sleeps until it arrives.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info};

use super::{HttpError, HttpResult};
use crate::metrics;

/// Lowest rate the governor will decay to (permits per second)
pub const DEFAULT_MIN_RATE: f64 = 0.10;

/// Highest rate the governor will grow to (permits per second)
pub const DEFAULT_MAX_RATE: f64 = 4.0;

/// Rate used before any feedback has been received
pub const DEFAULT_INITIAL_RATE: f64 = 1.0;

/// Multiplier applied on a rate-limited response
pub const THROTTLE_FACTOR: f64 = 0.95;

/// Multiplier applied on any other completed response
pub const RECOVERY_FACTOR: f64 = 1.05;

/// Bounds and starting point for the adaptive rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateBounds {
    /// Floor in permits per second
    pub min: f64,
    /// Ceiling in permits per second
    pub max: f64,
    /// Starting rate, clamped into `[min, max]`
    pub initial: f64,
}

impl RateBounds {
    /// Check the bounds describe a usable, non-empty range.
    pub fn validate(&self) -> HttpResult<()> {
        let finite = self.min.is_finite() && self.max.is_finite() && self.initial.is_finite();
        if !finite || self.min <= 0.0 || self.min > self.max {
            return Err(HttpError::Config(format!(
                "invalid rate bounds: min={} max={} initial={}",
                self.min, self.max, self.initial
            )));
        }
        Ok(())
    }
}

impl Default for RateBounds {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_RATE,
            max: DEFAULT_MAX_RATE,
            initial: DEFAULT_INITIAL_RATE,
        }
    }
}

#[derive(Debug)]
struct GovernorState {
    rate: f64,
    next_free: Instant,
}

/// Shared adaptive limiter; wrap in `Arc` and hand to every executor.
#[derive(Debug)]
pub struct RateGovernor {
    bounds: RateBounds,
    state: Mutex<GovernorState>,
}

impl RateGovernor {
    /// Create a governor; invalid bounds fall back to the defaults.
    pub fn new(bounds: RateBounds) -> Self {
        let bounds = if bounds.validate().is_ok() {
            bounds
        } else {
            RateBounds::default()
        };
        let rate = bounds.initial.clamp(bounds.min, bounds.max);
        metrics::record_rate(rate);
        Self {
            bounds,
            state: Mutex::new(GovernorState {
                rate,
                next_free: Instant::now(),
            }),
        }
    }

    /// Bounds this governor was built with.
    pub fn bounds(&self) -> RateBounds {
        self.bounds
    }

    /// Current rate in permits per second.
    pub fn rate(&self) -> f64 {
        self.lock().rate
    }

    /// Wait until one permit is available at the current rate.
    ///
    /// The lock only covers the slot reservation; the wait happens outside it.
    pub async fn acquire(&self) {
        let wait = self.reserve(Instant::now());
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate permit");
            sleep(wait).await;
        }
    }

    /// Reserve the next slot and return how long the caller has to wait for it.
    fn reserve(&self, now: Instant) -> Duration {
        let mut state = self.lock();
        let slot = state.next_free.max(now);
        state.next_free = slot + Duration::from_secs_f64(1.0 / state.rate);
        slot - now
    }

    /// Feed back a rate-limited response. Returns the new rate.
    pub fn record_throttled(&self) -> f64 {
        let rate = {
            let mut state = self.lock();
            state.rate = (state.rate * THROTTLE_FACTOR).max(self.bounds.min);
            state.rate
        };
        info!(rate = rate, "Rate limited, http rate lowered");
        metrics::record_rate(rate);
        rate
    }

    /// Feed back any other completed response. Returns the new rate.
    pub fn record_success(&self) -> f64 {
        let rate = {
            let mut state = self.lock();
            state.rate = (state.rate * RECOVERY_FACTOR).min(self.bounds.max);
            state.rate
        };
        debug!(rate = rate, "Http rate raised");
        metrics::record_rate(rate);
        rate
    }

    fn lock(&self) -> MutexGuard<'_, GovernorState> {
        // State is two plain numbers; a panic elsewhere cannot leave it torn
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(RateBounds::default())
    }
}
