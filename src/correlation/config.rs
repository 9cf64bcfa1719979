//! Tunables for the correlator (SPEC_FULL.md §4.2 supplement).

use chrono::TimeDelta;
use std::time::Duration;

/// Construction-time configuration for a [`super::Correlator`].
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// How long `send_request` waits for a response before failing with
    /// `CorrelationError::Timeout`.
    pub default_timeout: TimeDelta,
    /// How often the background sweep checks for stale pending calls.
    pub cleanup_interval: Duration,
    /// Upper bound on simultaneously outstanding requests; exceeding it
    /// fails the new call with `CorrelationError::CapacityExceeded` rather
    /// than queuing it.
    pub max_pending_requests: usize,
    /// Emit `tracing` events at send/receive/timeout boundaries.
    pub enable_tracing: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            default_timeout: TimeDelta::seconds(30),
            cleanup_interval: Duration::from_secs(10),
            max_pending_requests: 10_000,
            enable_tracing: true,
        }
    }
}
