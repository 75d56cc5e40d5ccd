//! Connection watchdog
//!
//! The remote service sometimes leaves a socket open without ever sending
//! anything. Every attempt registers an abort handle and a deadline here; a
//! background task sweeps the registry on a fixed tick and aborts whatever is
//! overdue. The registry only ever holds [`AbortHandle`]s, never the request.

use futures_util::future::{AbortHandle, AbortRegistration};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::metrics;
use crate::shutdown;

/// Identifier of one registered attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

#[derive(Debug)]
struct Tracked {
    deadline: Instant,
    abort: AbortHandle,
}

#[derive(Debug)]
struct Registry {
    next_id: AtomicU64,
    in_flight: Mutex<HashMap<RequestId, Tracked>>,
    tick: Duration,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, Tracked>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweep(&self, now: Instant) -> usize {
        let expired: Vec<(RequestId, Tracked)> = {
            let mut in_flight = self.lock();
            let ids: Vec<RequestId> = in_flight
                .iter()
                .filter(|(_, tracked)| tracked.deadline <= now)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| in_flight.remove(&id).map(|tracked| (id, tracked)))
                .collect()
        };

        for (id, tracked) in &expired {
            warn!(
                request_id = id.0,
                overdue_ms = now.saturating_duration_since(tracked.deadline).as_millis() as u64,
                "Aborting request past its deadline"
            );
            tracked.abort.abort();
            metrics::record_watchdog_abort();
        }
        expired.len()
    }
}

/// Tracks in-flight attempts and aborts those that outlive their deadline.
#[derive(Debug, Clone)]
pub struct Watchdog {
    registry: Arc<Registry>,
}

impl Watchdog {
    /// Create a watchdog sweeping every `tick`. Call [`Watchdog::spawn`] to start it.
    pub fn new(tick: Duration) -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                in_flight: Mutex::new(HashMap::new()),
                tick,
            }),
        }
    }

    /// Record `abort` with a deadline `timeout` from now.
    pub fn register(&self, abort: AbortHandle, timeout: Duration) -> RequestId {
        let id = RequestId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let deadline = Instant::now() + timeout;
        self.registry.lock().insert(id, Tracked { deadline, abort });
        debug!(request_id = id.0, timeout_ms = timeout.as_millis() as u64, "Request registered");
        id
    }

    /// Forget a request. Returns `false` when it was already gone (completed or aborted).
    pub fn unregister(&self, id: RequestId) -> bool {
        self.registry.lock().remove(&id).is_some()
    }

    /// Register a fresh abort pair and return the registration together with a
    /// guard that unregisters on drop, whichever way the attempt ends.
    pub fn watch(&self, timeout: Duration) -> (WatchGuard, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        let id = self.register(handle, timeout);
        (
            WatchGuard {
                watchdog: self.clone(),
                id,
            },
            registration,
        )
    }

    /// Number of requests currently tracked.
    pub fn in_flight(&self) -> usize {
        self.registry.lock().len()
    }

    /// Abort and remove every request whose deadline is at or before `now`.
    pub fn sweep(&self, now: Instant) -> usize {
        self.registry.sweep(now)
    }

    /// Start the background sweep loop.
    ///
    /// The loop keeps only a weak reference to the registry and ends once every
    /// `Watchdog` clone has been dropped or process shutdown is requested.
    pub fn spawn(&self) -> JoinHandle<()> {
        let registry: Weak<Registry> = Arc::downgrade(&self.registry);
        let tick = self.registry.tick;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let shutdown = shutdown::get_global_shutdown();

            loop {
                match &shutdown {
                    Some(shutdown) => {
                        tokio::select! {
                            _ = interval.tick() => {}
                            _ = shutdown.wait_for_shutdown() => break,
                        }
                    }
                    None => {
                        interval.tick().await;
                    }
                }

                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.sweep(Instant::now());
            }
            debug!("Watchdog loop stopped");
        })
    }
}

/// Unregisters its request when dropped.
#[derive(Debug)]
pub struct WatchGuard {
    watchdog: Watchdog,
    id: RequestId,
}

impl WatchGuard {
    /// Id of the guarded request.
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.watchdog.unregister(self.id);
    }
}
