//! Scripted transport for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::Transport;
use crate::request::ApiRequest;
use crate::response::{ApiError, ApiResult, HttpResponse};

/// Mock transport for testing.
///
/// Responses are queued per endpoint key ("{method} {path}") and handed out in
/// FIFO order. An endpoint with nothing queued answers with an
/// [`ApiError::Network`].
///
/// # Example
/// ```ignore
/// let mock = MockTransport::new();
/// mock.add_status("GET /tasks", 401, "session expired");
/// mock.add_ok("POST /auth/refresh", "{}");
/// mock.add_ok("GET /tasks", "[]");
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<String, Vec<MockResponse>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
}

/// A mock response that can optionally wait for a trigger before completing.
enum MockResponse {
    /// Immediate response
    Immediate(ApiResult),
    /// Response that waits for a trigger signal before completing
    Triggered {
        response: ApiResult,
        trigger: oneshot::Receiver<()>,
    },
}

/// Record of a call made to the mock transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub key: String,
    pub request: ApiRequest,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result for an endpoint key.
    pub fn add_response(&self, key: &str, response: ApiResult) {
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(MockResponse::Immediate(response));
    }

    /// Queue a 200 response with the given body.
    pub fn add_ok(&self, key: &str, body: &str) {
        self.add_response(
            key,
            Ok(HttpResponse {
                status: 200,
                body: body.to_string(),
            }),
        );
    }

    /// Queue an [`ApiError::Http`] failure with the given status and body.
    pub fn add_status(&self, key: &str, status: u16, body: &str) {
        self.add_response(
            key,
            Err(ApiError::Http {
                status,
                body: body.to_string(),
            }),
        );
    }

    /// Queue a response that is held back until the returned sender fires.
    ///
    /// Sending `()` or dropping the sender releases the response.
    ///
    /// # Example
    /// ```ignore
    /// let trigger = mock.add_response_with_trigger("POST /auth/refresh", Ok(ok_response()));
    /// // ... refresh is now blocked waiting ...
    /// trigger.send(()).unwrap(); // Now it completes
    /// ```
    pub fn add_response_with_trigger(&self, key: &str, response: ApiResult) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(MockResponse::Triggered {
                response,
                trigger: rx,
            });
        tx
    }

    /// All calls made so far, in arrival order.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of calls made for one endpoint key.
    pub fn calls_to(&self, key: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.key == key).count()
    }

    /// Clear all recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Number of calls currently executing (e.g., waiting on a trigger).
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &ApiRequest) -> ApiResult {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
        };

        let key = request.key();
        self.calls.lock().push(MockCall {
            key: key.clone(),
            request: request.clone(),
        });

        let mock_response = {
            let mut responses = self.responses.lock();
            responses
                .get_mut(&key)
                .filter(|queue| !queue.is_empty())
                .map(|queue| queue.remove(0))
        };

        match mock_response {
            Some(MockResponse::Immediate(response)) => response,
            Some(MockResponse::Triggered { response, trigger }) => {
                // Proceed whether the trigger fired or was dropped
                let _ = trigger.await;
                response
            }
            None => Err(ApiError::Network(format!(
                "No mock response configured for {}",
                key
            ))),
        }
    }
}

/// Decrements the in-flight counter when dropped, even on cancellation.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
