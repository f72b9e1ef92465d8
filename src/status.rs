//! Status Snapshot Types
//!
//! Read-only snapshots of the admission controller, suitable for an
//! operational health endpoint. Producing a snapshot never changes
//! admission state beyond lazy pruning of stale window entries.

use serde::Serialize;

/// Point-in-time view of the admission controller
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionStatus {
    /// Whether admission control is enabled
    pub enabled: bool,

    /// Concurrency budget occupancy
    pub concurrent: ConcurrencyStatus,

    /// Trailing-minute window occupancy
    pub per_minute: WindowStatus,

    /// Trailing-hour window occupancy
    pub per_hour: WindowStatus,

    /// Configured queue timeout in seconds
    pub queue_timeout_secs: u64,

    /// Configured retry delay in seconds
    pub retry_delay_secs: f64,
}

/// Occupancy of the concurrency budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConcurrencyStatus {
    /// Permits currently outstanding
    pub current: usize,

    /// Budget capacity
    pub max: usize,

    /// Permits still available, clamped at zero
    pub available: usize,
}

/// Occupancy of one sliding rate window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowStatus {
    /// Grants inside the trailing window
    pub current: usize,

    /// Window cap
    pub max: usize,

    /// Grants left before the cap, clamped at zero
    pub remaining: usize,
}

impl WindowStatus {
    pub(crate) fn new(current: usize, max: usize) -> Self {
        Self {
            current,
            max,
            remaining: max.saturating_sub(current),
        }
    }
}

impl ConcurrencyStatus {
    pub(crate) fn new(current: usize, max: usize) -> Self {
        Self {
            current,
            max,
            available: max.saturating_sub(current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_clamps_at_zero() {
        // Stored entries may transiently exceed the cap before pruning.
        let status = WindowStatus::new(5, 3);
        assert_eq!(status.remaining, 0);

        let status = ConcurrencyStatus::new(4, 3);
        assert_eq!(status.available, 0);
    }

    #[test]
    fn counts_are_reported_verbatim() {
        let status = WindowStatus::new(2, 30);
        assert_eq!(status.current, 2);
        assert_eq!(status.max, 30);
        assert_eq!(status.remaining, 28);
    }

    #[test]
    fn serializes_to_json() {
        let status = AdmissionStatus {
            enabled: true,
            concurrent: ConcurrencyStatus::new(1, 3),
            per_minute: WindowStatus::new(2, 30),
            per_hour: WindowStatus::new(2, 500),
            queue_timeout_secs: 30,
            retry_delay_secs: 1.0,
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["enabled"], true);
        assert_eq!(json["concurrent"]["available"], 2);
        assert_eq!(json["per_minute"]["remaining"], 28);
    }
}
