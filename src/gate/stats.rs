//! Counters kept by each session gate.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Snapshot of a gate's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStats {
    /// Calls to `execute`.
    pub requests: u64,
    /// First attempts classified as unauthorized.
    pub unauthorized: u64,
    /// Refresh flights started by this gate (joins are not counted).
    pub refreshes_started: u64,
    /// Refresh flights started by this gate that failed.
    pub refreshes_failed: u64,
    /// Requests re-issued after a successful refresh.
    pub retries: u64,
}

#[derive(Debug, Default)]
pub(crate) struct GateCounters {
    pub(crate) requests: AtomicU64,
    pub(crate) unauthorized: AtomicU64,
    pub(crate) refreshes_started: AtomicU64,
    pub(crate) refreshes_failed: AtomicU64,
    pub(crate) retries: AtomicU64,
}

impl GateCounters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> GateStats {
        GateStats {
            requests: self.requests.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            refreshes_started: self.refreshes_started.load(Ordering::Relaxed),
            refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}
