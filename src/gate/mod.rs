//! Session gate: a transport wrapper that refreshes expired sessions.
//!
//! Every request goes to the wrapped transport first. When the response is
//! classified as unauthorized, the gate joins (or starts) the single shared
//! refresh flight, waits for it, and then:
//!
//! - refresh succeeded: re-issues the original request exactly once and returns
//!   that result, whatever it is;
//! - refresh failed: returns the original unauthorized error.
//!
//! The refresh request always goes straight to the wrapped transport and is
//! never itself subject to refresh.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::request::ApiRequest;
use crate::response::{ApiError, ApiResult};
use crate::transport::Transport;

pub mod flight;
mod stats;

pub use flight::{FlightId, RefreshFailure, RefreshFlight, RefreshOutcome, RefreshState};
pub use stats::GateStats;
use stats::GateCounters;

/// Predicate deciding whether a failed request should trigger a session refresh.
pub type ShouldRefreshFn = Arc<dyn Fn(&ApiError) -> bool + Send + Sync>;

/// Default refresh predicate: refresh on HTTP 401 only.
pub fn default_should_refresh(error: &ApiError) -> bool {
    error.status() == Some(401)
}

fn default_should_refresh_fn() -> ShouldRefreshFn {
    Arc::new(default_should_refresh)
}

/// Configuration for a [`SessionGate`].
#[derive(Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Request sent to re-establish the session.
    pub refresh_request: ApiRequest,

    /// Predicate function to determine if a failure means the session expired.
    /// Defaults to HTTP 401.
    #[serde(skip, default = "default_should_refresh_fn")]
    pub should_refresh: ShouldRefreshFn,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            refresh_request: auth::refresh(),
            should_refresh: default_should_refresh_fn(),
        }
    }
}

/// Transport wrapper that keeps requests working across session expiry.
///
/// Cloning a gate shares its transport, refresh state and counters.
pub struct SessionGate<T: Transport> {
    transport: Arc<T>,
    config: GateConfig,
    state: Arc<RefreshState>,
    counters: Arc<GateCounters>,
}

impl<T: Transport> Clone for SessionGate<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
            counters: self.counters.clone(),
        }
    }
}

impl<T> SessionGate<T>
where
    T: Transport + 'static,
{
    /// Create a gate with its own refresh state.
    pub fn new(transport: Arc<T>, config: GateConfig) -> Self {
        Self::with_state(transport, config, Arc::new(RefreshState::new()))
    }

    /// Create a gate that shares `state` with other gates.
    ///
    /// Gates sharing a state never run two refreshes at once.
    pub fn with_state(transport: Arc<T>, config: GateConfig, state: Arc<RefreshState>) -> Self {
        Self {
            transport,
            config,
            state,
            counters: Arc::new(GateCounters::default()),
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<RefreshState> {
        &self.state
    }

    pub fn stats(&self) -> GateStats {
        self.counters.snapshot()
    }

    /// Whether a refresh flight is currently published.
    pub fn is_refreshing(&self) -> bool {
        self.state.is_refreshing()
    }

    /// Execute a request, refreshing the session and retrying once if needed.
    #[tracing::instrument(skip(self, request), fields(request = %request))]
    pub async fn execute(&self, request: &ApiRequest) -> ApiResult {
        GateCounters::incr(&self.counters.requests);

        if *request == self.config.refresh_request {
            return self.transport.execute(request).await;
        }

        let original = match self.transport.execute(request).await {
            Err(error) if (self.config.should_refresh)(&error) => error,
            other => return other,
        };

        GateCounters::incr(&self.counters.unauthorized);
        counter!("reauth_unauthorized_total").increment(1);

        let flight = self.join_or_start_refresh();
        tracing::debug!(
            flight_id = %flight.id(),
            status = ?original.status(),
            "Request unauthorized, waiting on session refresh"
        );

        match flight.wait().await {
            Ok(()) => {
                GateCounters::incr(&self.counters.retries);
                let retried = self.transport.execute(request).await;

                counter!(
                    "reauth_retry_total",
                    "outcome" => if retried.is_ok() { "success" } else { "failure" }
                )
                .increment(1);
                tracing::debug!(
                    flight_id = %flight.id(),
                    succeeded = retried.is_ok(),
                    status = ?retried.as_ref().err().and_then(ApiError::status),
                    "Retried request after session refresh"
                );

                retried
            }
            Err(failure) => {
                tracing::debug!(
                    flight_id = %flight.id(),
                    error = %failure,
                    "Session refresh failed, returning original error"
                );
                Err(original)
            }
        }
    }

    fn join_or_start_refresh(&self) -> RefreshFlight {
        let transport = self.transport.clone();
        let refresh_request = self.config.refresh_request.clone();
        let counters = self.counters.clone();

        let (flight, _started) = self.state.join_or_start(move |flight_id| {
            GateCounters::incr(&counters.refreshes_started);
            async move {
                tracing::info!(flight_id = %flight_id, request = %refresh_request, "Starting session refresh");
                let started = Instant::now();

                let outcome = transport
                    .execute(&refresh_request)
                    .await
                    .map(|_| ())
                    .map_err(RefreshFailure::Rejected);

                let elapsed_ms = started.elapsed().as_millis() as u64;
                match &outcome {
                    Ok(()) => {
                        counter!("reauth_refresh_total", "outcome" => "success").increment(1);
                        tracing::info!(flight_id = %flight_id, elapsed_ms, "Session refreshed");
                    }
                    Err(error) => {
                        GateCounters::incr(&counters.refreshes_failed);
                        counter!("reauth_refresh_total", "outcome" => "failure").increment(1);
                        tracing::warn!(
                            flight_id = %flight_id,
                            elapsed_ms,
                            error = %error,
                            "Session refresh failed"
                        );
                    }
                }

                outcome
            }
        });

        flight
    }
}

#[async_trait]
impl<T> Transport for SessionGate<T>
where
    T: Transport + 'static,
{
    async fn execute(&self, request: &ApiRequest) -> ApiResult {
        SessionGate::execute(self, request).await
    }
}
