//! Mock transport for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::device::{DeviceRequest, RawResponse, Transport, TransportError};

/// Scripted behaviour for one URL.
#[derive(Debug, Clone)]
pub enum MockRoute {
    Respond { status: u16, body: String },
    Fail(TransportError),
    /// Panic inside `send`, simulating a crashed device task.
    Panic,
}

/// Mock implementation of the Transport trait.
///
/// Provides controllable behavior for testing:
/// - Per-URL responses or transport failures
/// - Unscripted URLs answer 404 with an empty body
/// - Records every request for assertions
/// - Simulated latency and in-flight tracking
///
/// # Example
///
/// ```rust,ignore
/// use tablethive_core::testing::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.respond("http://dispatch/api/v1/tablets/1", 200, "{}").await;
/// transport.fail("http://dispatch/api/v1/tablets/2", TransportError::Timeout).await;
///
/// // ... run the fleet ...
///
/// let requests = transport.recorded_requests().await;
/// assert_eq!(requests.len(), 2);
/// ```
pub struct MockTransport {
    routes: Arc<RwLock<HashMap<String, MockRoute>>>,
    requests: Arc<RwLock<Vec<DeviceRequest>>>,
    latency: Arc<RwLock<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("routes", &"<routes>")
            .field("requests", &"<requests>")
            .field("max_in_flight", &self.max_in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answer `url` with a status and body.
    pub async fn respond(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
        self.routes.write().await.insert(
            url.into(),
            MockRoute::Respond {
                status,
                body: body.into(),
            },
        );
    }

    /// Fail requests to `url` before any response.
    pub async fn fail(&self, url: impl Into<String>, error: TransportError) {
        self.routes
            .write()
            .await
            .insert(url.into(), MockRoute::Fail(error));
    }

    /// Panic while sending to `url`.
    pub async fn panic_on(&self, url: impl Into<String>) {
        self.routes.write().await.insert(url.into(), MockRoute::Panic);
    }

    /// Latency applied to every request and reported as its elapsed time.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// All requests in the order they were sent.
    pub async fn recorded_requests(&self) -> Vec<DeviceRequest> {
        self.requests.read().await.clone()
    }

    /// Requests whose URL starts with `prefix`.
    pub async fn requests_to(&self, prefix: &str) -> Vec<DeviceRequest> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Highest number of requests observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: DeviceRequest) -> Result<RawResponse, TransportError> {
        let url = request.url.clone();
        self.requests.write().await.push(request);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let route = self.routes.read().await.get(&url).cloned();
        match route {
            Some(MockRoute::Respond { status, body }) => Ok(RawResponse {
                status,
                body,
                elapsed: latency,
            }),
            Some(MockRoute::Fail(error)) => Err(error),
            Some(MockRoute::Panic) => panic!("mock transport panic for {}", url),
            None => Ok(RawResponse {
                status: 404,
                body: String::new(),
                elapsed: latency,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    #[tokio::test]
    async fn test_unscripted_url_is_404() {
        let transport = MockTransport::new();
        let response = transport
            .send(DeviceRequest::new(Method::GET, "http://x/1"))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(transport.recorded_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let transport = MockTransport::new();
        transport.fail("http://x/1", TransportError::Timeout).await;
        let result = transport
            .send(DeviceRequest::new(Method::GET, "http://x/1"))
            .await;
        assert_eq!(result, Err(TransportError::Timeout));
    }

    #[tokio::test]
    async fn test_latency_reported_as_elapsed() {
        let transport = MockTransport::new();
        transport.set_latency(Duration::from_millis(20)).await;
        transport.respond("http://x/1", 200, "ok").await;
        let response = transport
            .send(DeviceRequest::new(Method::GET, "http://x/1"))
            .await
            .unwrap();
        assert_eq!(response.elapsed, Duration::from_millis(20));
        assert_eq!(transport.max_in_flight(), 1);
    }
}
