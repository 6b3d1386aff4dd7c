//! Single-flight bookkeeping for session refreshes.
//!
//! [`RefreshState`] holds at most one published [`RefreshFlight`]. Callers that
//! see an unauthorized response either join the published flight or start a new
//! one; every caller of the same flight awaits the same broadcast-once outcome.
//!
//! ```text
//!   Idle ──join_or_start()──> Refreshing(flight A) ──A settles──> Idle
//!                                   │
//!                                   └──join_or_start()──> (joins A, no new refresh)
//! ```
//!
//! The refresh itself runs in a spawned task, so it always runs to completion
//! even if every waiting caller is dropped. When it settles, the task clears the
//! published flight with a compare-and-clear on [`FlightId`] before releasing
//! the outcome to waiters. A holder of an old flight can never clear a newer one.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::response::ApiError;

/// Outcome shared by every caller of a flight.
pub type RefreshOutcome = std::result::Result<(), RefreshFailure>;

/// Why a refresh didn't re-establish the session.
///
/// Never returned to gate callers; they get their original unauthorized error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// The refresh request came back as a failure (any status, network error, timeout).
    #[error("refresh request failed: {0}")]
    Rejected(ApiError),

    /// The refresh task ended without reporting an outcome (panic or runtime shutdown).
    #[error("refresh task terminated unexpectedly")]
    TaskTerminated,
}

/// Unique identity of one refresh flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FlightId(pub Uuid);

impl FlightId {
    fn new() -> Self {
        FlightId(Uuid::new_v4())
    }
}

impl std::fmt::Display for FlightId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for FlightId {
    fn from(uuid: Uuid) -> Self {
        FlightId(uuid)
    }
}

/// Handle to one in-progress (or settled) refresh.
///
/// Cheap to clone; all clones resolve to the same outcome.
#[derive(Clone)]
pub struct RefreshFlight {
    id: FlightId,
    started_at: DateTime<Utc>,
    outcome: Shared<BoxFuture<'static, RefreshOutcome>>,
}

impl RefreshFlight {
    fn new(id: FlightId, rx: oneshot::Receiver<RefreshOutcome>) -> Self {
        let outcome = async move { rx.await.unwrap_or(Err(RefreshFailure::TaskTerminated)) }
            .boxed()
            .shared();
        Self {
            id,
            started_at: Utc::now(),
            outcome,
        }
    }

    pub fn id(&self) -> FlightId {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wait for the refresh to settle.
    pub async fn wait(&self) -> RefreshOutcome {
        self.outcome.clone().await
    }

    /// Outcome, if the flight has already been awaited to completion.
    pub fn peek(&self) -> Option<RefreshOutcome> {
        self.outcome.peek().cloned()
    }
}

impl std::fmt::Debug for RefreshFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshFlight")
            .field("id", &self.id)
            .field("started_at", &self.started_at)
            .field("settled", &self.outcome.peek().is_some())
            .finish()
    }
}

/// Shared refresh state for one or more gates.
///
/// Inject the same `Arc<RefreshState>` into several gates to make them share
/// refreshes; give each gate its own to keep them independent.
#[derive(Debug, Default)]
pub struct RefreshState {
    current: Mutex<Option<RefreshFlight>>,
}

impl RefreshState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The published flight, if a refresh is in progress.
    pub fn current(&self) -> Option<RefreshFlight> {
        self.current.lock().clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Join the published flight, or start and publish a new one.
    ///
    /// `refresh` is only called when no flight is published; the future it
    /// returns is spawned onto the tokio runtime. The returned flag is true
    /// when this call started the flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn join_or_start<F, Fut>(self: &Arc<Self>, refresh: F) -> (RefreshFlight, bool)
    where
        F: FnOnce(FlightId) -> Fut,
        Fut: Future<Output = RefreshOutcome> + Send + 'static,
    {
        let (flight, tx) = {
            let mut current = self.current.lock();
            if let Some(flight) = current.as_ref() {
                return (flight.clone(), false);
            }

            let (tx, rx) = oneshot::channel();
            let flight = RefreshFlight::new(FlightId::new(), rx);
            *current = Some(flight.clone());
            (flight, tx)
        };

        // Spawned outside the lock: the settle guard takes the same lock on drop.
        let settle = SettleGuard {
            state: Arc::clone(self),
            id: flight.id,
        };
        let task = refresh(flight.id);
        tokio::spawn(async move {
            let outcome = task.await;
            // Clear before waking waiters so none of them can re-join this flight.
            drop(settle);
            let _ = tx.send(outcome);
        });

        (flight, true)
    }

    /// Clear the published flight only if it is the one identified by `id`.
    ///
    /// Returns true if this call cleared it.
    pub fn clear_if_current(&self, id: FlightId) -> bool {
        let mut current = self.current.lock();
        match current.as_ref() {
            Some(flight) if flight.id == id => {
                *current = None;
                true
            }
            _ => false,
        }
    }
}

/// Clears the flight it was created for when dropped, including on panic.
struct SettleGuard {
    state: Arc<RefreshState>,
    id: FlightId,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if self.state.clear_if_current(self.id) {
            tracing::trace!(flight_id = %self.id, "Cleared settled refresh flight");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_start_publishes_and_settle_clears() {
        let state = Arc::new(RefreshState::new());
        assert!(!state.is_refreshing());

        let (release, gate) = oneshot::channel::<()>();
        let (flight, started) = state.join_or_start(|_| async move {
            let _ = gate.await;
            Ok(())
        });

        assert!(started);
        assert!(state.is_refreshing());
        assert_eq!(state.current().map(|f| f.id()), Some(flight.id()));
        assert_eq!(flight.peek(), None);

        release.send(()).unwrap();
        assert_eq!(flight.wait().await, Ok(()));
        assert_eq!(flight.peek(), Some(Ok(())));
        assert!(!state.is_refreshing());
    }

    #[tokio::test]
    async fn test_join_shares_the_published_flight() {
        let state = Arc::new(RefreshState::new());
        let starts = Arc::new(AtomicUsize::new(0));

        let (release, gate) = oneshot::channel::<()>();
        let counter = starts.clone();
        let (first, started_first) = state.join_or_start(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let _ = gate.await;
                Err(RefreshFailure::Rejected(ApiError::Http {
                    status: 401,
                    body: "refresh token expired".to_string(),
                }))
            }
        });

        let counter = starts.clone();
        let (second, started_second) = state.join_or_start(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(()) }
        });

        assert!(started_first);
        assert!(!started_second);
        assert_eq!(first.id(), second.id());
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        release.send(()).unwrap();
        let expected = Err(RefreshFailure::Rejected(ApiError::Http {
            status: 401,
            body: "refresh token expired".to_string(),
        }));
        assert_eq!(first.wait().await, expected);
        assert_eq!(second.wait().await, expected);
    }

    #[tokio::test]
    async fn test_stale_clear_does_not_wipe_newer_flight() {
        let state = Arc::new(RefreshState::new());

        // Wave A starts, settles and is cleared
        let (release_a, gate_a) = oneshot::channel::<()>();
        let (flight_a, _) = state.join_or_start(|_| async move {
            let _ = gate_a.await;
            Ok(())
        });
        release_a.send(()).unwrap();
        flight_a.wait().await.unwrap();
        assert!(!state.is_refreshing());

        // Wave B starts and stays in flight
        let (_release_b, gate_b) = oneshot::channel::<()>();
        let (flight_b, started) = state.join_or_start(|_| async move {
            let _ = gate_b.await;
            Ok(())
        });
        assert!(started);
        assert_ne!(flight_a.id(), flight_b.id());

        // A straggler from wave A runs its cleanup late
        assert!(!state.clear_if_current(flight_a.id()));
        assert_eq!(state.current().map(|f| f.id()), Some(flight_b.id()));

        assert!(state.clear_if_current(flight_b.id()));
        assert!(!state.is_refreshing());
    }

    #[tokio::test]
    async fn test_panicking_refresh_reports_task_terminated() {
        let state = Arc::new(RefreshState::new());

        let (flight, _) = state.join_or_start(|_| {
            std::future::ready(()).map(|_| -> RefreshOutcome { panic!("refresh exploded") })
        });

        assert_eq!(flight.wait().await, Err(RefreshFailure::TaskTerminated));
        assert!(!state.is_refreshing());
    }

    #[tokio::test]
    async fn test_refresh_survives_dropped_waiters() {
        let state = Arc::new(RefreshState::new());
        let completed = Arc::new(AtomicUsize::new(0));

        let (release, gate) = oneshot::channel::<()>();
        let done = completed.clone();
        let (flight, _) = state.join_or_start(move |_| async move {
            let _ = gate.await;
            done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        drop(flight);

        release.send(()).unwrap();
        for _ in 0..100 {
            if !state.is_refreshing() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert!(!state.is_refreshing());
    }

    #[test]
    fn test_flight_id_display_is_short() {
        let id = FlightId::from(Uuid::nil());
        assert_eq!(id.to_string(), "00000000");
    }
}
