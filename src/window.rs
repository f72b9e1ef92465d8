//! Sliding-Window Request Log
//!
//! Tracks the timestamps of granted requests over a trailing time window
//! (e.g. the last 60 seconds). Stale entries are pruned lazily on every
//! read, so the stored queue may transiently exceed the cap between
//! admissions without ever affecting an admission decision.

use std::collections::VecDeque;
use tokio::time::{Duration, Instant};

/// Ordered log of grant timestamps bounded by a trailing time window.
///
/// A cap of zero means the window never has capacity: when the limiter is
/// enabled, such a window refuses every admission.
#[derive(Debug)]
pub struct SlidingWindow {
    /// Maximum entries allowed inside the window.
    cap: usize,

    /// Trailing window length.
    window: Duration,

    /// Grant timestamps, oldest at the front.
    entries: VecDeque<Instant>,
}

impl SlidingWindow {
    /// Create a window covering `window` with at most `cap` entries.
    pub fn new(cap: usize, window: Duration) -> Self {
        Self {
            cap,
            window,
            entries: VecDeque::new(),
        }
    }

    /// Drop entries strictly older than the window, measured from `now`.
    pub fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.entries.front() {
            if now.duration_since(front) > self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of entries currently inside the window.
    pub fn occupancy(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.entries.len()
    }

    /// Whether one more grant fits inside the window right now.
    pub fn has_capacity(&mut self, now: Instant) -> bool {
        self.occupancy(now) < self.cap
    }

    /// Append a grant timestamp.
    ///
    /// The caller is responsible for checking [`has_capacity`] first; the
    /// controller does both under one lock so the check and the append are
    /// a single critical section.
    ///
    /// [`has_capacity`]: SlidingWindow::has_capacity
    pub fn record(&mut self, now: Instant) {
        self.entries.push_back(now);
    }

    /// Configured cap.
    pub fn cap(&self) -> usize {
        self.cap
    }
}
