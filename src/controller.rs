//! Admission Controller
//!
//! Gates access to the remote model API on two axes: a bounded concurrency
//! budget and two sliding rate windows (per-minute, per-hour). Callers
//! acquire a permit before issuing an inference request; the permit is a
//! guard that returns its concurrency slot when dropped, so release cannot
//! be skipped on any exit path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::AdmissionConfig;
use crate::status::{AdmissionStatus, ConcurrencyStatus, WindowStatus};
use crate::window::SlidingWindow;

const MINUTE_WINDOW: Duration = Duration::from_secs(60);
const HOUR_WINDOW: Duration = Duration::from_secs(3600);

/// Outcome of an admission attempt
///
/// `Disabled` is a pass-through, not an error: the caller proceeds exactly
/// as with `Granted` but holds no permit and releases nothing.
#[must_use = "dropping a granted admission immediately releases its permit"]
#[derive(Debug)]
pub enum Admission {
    /// Admitted; the permit releases its slot when dropped
    Granted(AdmissionPermit),

    /// Admission control is switched off; proceed untracked
    Disabled,

    /// The queue timeout elapsed before a slot and an open rate window
    /// lined up; the caller must not contact the model API
    TimedOut,
}

impl Admission {
    /// Whether the caller may proceed with the inference request
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::TimedOut)
    }

    /// Whether the attempt was rejected by the queue timeout
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Admission::TimedOut)
    }
}

/// Guard for one granted admission
///
/// Holds one unit of the concurrency budget. Dropping the guard returns
/// the unit and decrements the in-flight counter; this also happens on
/// panic and on cancellation of the holding task.
#[derive(Debug)]
pub struct AdmissionPermit {
    inner: Arc<Inner>,
    _slot: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    /// Release the permit explicitly. Equivalent to dropping it.
    pub fn release(self) {}
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        let before = self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        debug!(
            "Released inference permit, in flight: {}/{}",
            before - 1,
            self.inner.config.max_concurrent_requests
        );
    }
}

/// Both rate windows behind one lock, so checking capacity and recording
/// the grant are a single critical section.
#[derive(Debug)]
struct RateWindows {
    minute: SlidingWindow,
    hour: SlidingWindow,
}

impl RateWindows {
    /// Record a grant in both windows if both currently admit one.
    fn try_record(&mut self, now: Instant) -> bool {
        if self.minute.has_capacity(now) && self.hour.has_capacity(now) {
            self.minute.record(now);
            self.hour.record(now);
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct Inner {
    config: AdmissionConfig,
    semaphore: Arc<Semaphore>,
    in_flight: AtomicUsize,
    windows: Mutex<RateWindows>,
}

/// Admission controller for remote inference requests
///
/// Cheap to clone; all clones share one budget and one pair of rate
/// windows. Constructed once at startup from an immutable
/// [`AdmissionConfig`] and never torn down.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    inner: Arc<Inner>,
}

impl AdmissionController {
    /// Create a controller from an immutable configuration snapshot.
    pub fn new(config: AdmissionConfig) -> Self {
        if config.enabled {
            info!(
                "Admission controller initialized: concurrency={}, per-minute={}, per-hour={}, queue timeout={}s",
                config.max_concurrent_requests,
                config.max_requests_per_minute,
                config.max_requests_per_hour,
                config.queue_timeout_secs
            );
        } else {
            info!("Admission control disabled, all requests pass through");
        }

        let permits = config.max_concurrent_requests.min(Semaphore::MAX_PERMITS);
        let windows = RateWindows {
            minute: SlidingWindow::new(config.max_requests_per_minute, MINUTE_WINDOW),
            hour: SlidingWindow::new(config.max_requests_per_hour, HOUR_WINDOW),
        };

        Self {
            inner: Arc::new(Inner {
                config,
                semaphore: Arc::new(Semaphore::new(permits)),
                in_flight: AtomicUsize::new(0),
                windows: Mutex::new(windows),
            }),
        }
    }

    /// Create a disabled controller (for testing)
    pub fn disabled() -> Self {
        Self::new(AdmissionConfig::disabled())
    }

    /// The configuration this controller was built from
    pub fn config(&self) -> &AdmissionConfig {
        &self.inner.config
    }

    /// Request admission for one inference call.
    ///
    /// Waits in two stages, both bounded by the configured queue timeout:
    /// first for a unit of the concurrency budget, then for both rate
    /// windows to admit one more grant. The second stage polls every
    /// `retry_delay` and measures its budget from the moment the
    /// concurrency unit was claimed, so a fully queued caller can wait up
    /// to twice the configured timeout in the worst case.
    ///
    /// # Cancellation
    ///
    /// Cancel-safe: dropping the returned future at any await point hands
    /// back a claimed concurrency unit before the future is discarded.
    /// Cancellation therefore never leaks a permit and is distinguishable
    /// from [`Admission::TimedOut`], which is only ever returned to a
    /// caller that kept waiting.
    pub async fn acquire(&self) -> Admission {
        if !self.inner.config.enabled {
            return Admission::Disabled;
        }

        let queue_timeout = self.inner.config.queue_timeout();

        // Stage one: claim a unit of the concurrency budget.
        let slot = match timeout(
            queue_timeout,
            Arc::clone(&self.inner.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(slot)) => slot,
            _ => {
                warn!(
                    "Timed out after {}s waiting for a concurrency slot",
                    self.inner.config.queue_timeout_secs
                );
                return Admission::TimedOut;
            }
        };

        // Stage two: wait for both rate windows to open. The elapsed
        // budget restarts at the instant the slot was claimed.
        let claimed_at = Instant::now();
        let retry_delay = self.inner.config.retry_delay();

        loop {
            if self.try_record(Instant::now()) {
                let in_flight = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(
                    "Granted inference permit, in flight: {}/{}",
                    in_flight, self.inner.config.max_concurrent_requests
                );
                return Admission::Granted(AdmissionPermit {
                    inner: Arc::clone(&self.inner),
                    _slot: slot,
                });
            }

            if claimed_at.elapsed() >= queue_timeout {
                // Returning drops `slot`, which hands the unit back to
                // other waiters before the caller sees the rejection.
                warn!(
                    "Timed out after {}s waiting for a rate window to open",
                    self.inner.config.queue_timeout_secs
                );
                return Admission::TimedOut;
            }

            debug!("Rate windows full, retrying in {:?}", retry_delay);
            sleep(retry_delay).await;
        }
    }

    /// Snapshot current occupancy and configuration.
    ///
    /// Read-only apart from lazy pruning of stale window entries; calling
    /// it at any frequency never changes an admission decision.
    pub fn status(&self) -> AdmissionStatus {
        let config = &self.inner.config;
        let now = Instant::now();

        let (per_minute, per_hour) = {
            let mut windows = self.inner.windows.lock().unwrap();
            (
                WindowStatus::new(windows.minute.occupancy(now), windows.minute.cap()),
                WindowStatus::new(windows.hour.occupancy(now), windows.hour.cap()),
            )
        };

        AdmissionStatus {
            enabled: config.enabled,
            concurrent: ConcurrencyStatus::new(
                self.inner.in_flight.load(Ordering::SeqCst),
                config.max_concurrent_requests,
            ),
            per_minute,
            per_hour,
            queue_timeout_secs: config.queue_timeout_secs,
            retry_delay_secs: config.retry_delay_secs,
        }
    }

    fn try_record(&self, now: Instant) -> bool {
        self.inner.windows.lock().unwrap().try_record(now)
    }
}
