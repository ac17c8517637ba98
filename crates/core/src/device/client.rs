//! The two calls a tablet makes against the dispatch API.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Method;
use tracing::{debug, warn};

use crate::config::Endpoint;
use crate::identity::DeviceIdentity;
use crate::report::{OperationKind, Outcome};
use crate::wire::{Manifest, StatusUpdate, WorkItem};

use super::{Device, DeviceRequest, Transport};

/// Performs device calls through a shared transport.
#[derive(Clone)]
pub struct DeviceClient {
    transport: Arc<dyn Transport>,
    server: String,
}

impl DeviceClient {
    pub fn new(transport: Arc<dyn Transport>, server: impl Into<String>) -> Self {
        Self {
            transport,
            server: server.into(),
        }
    }

    /// `{server}{endpoint.path}{id}`.
    pub fn url_for(&self, endpoint: &Endpoint, id: &str) -> String {
        format!("{}{}{}", self.server, endpoint.path, id)
    }

    async fn pace(endpoint: &Endpoint) {
        if !endpoint.delay.is_zero() {
            tokio::time::sleep(endpoint.delay).await;
        }
    }

    /// Ask the server for this device's ride.
    ///
    /// Always yields one `FetchManifest` outcome. The device keeps the status,
    /// the raw body and, for a 200 with a valid body, the parsed manifest.
    pub async fn fetch_manifest(&self, device: &mut Device, endpoint: &Endpoint) -> Outcome {
        let url = self.url_for(endpoint, device.id());
        let request = DeviceRequest::new(Method::GET, url.clone())
            .header(endpoint.auth_header.clone(), device.auth_token());

        Self::pace(endpoint).await;

        let started = Instant::now();
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(device = %device.id(), url = %url, "Fetch failed: {}", e);
                let outcome = Outcome::failed(
                    OperationKind::FetchManifest,
                    device.identity(),
                    url,
                    e.to_string(),
                    started.elapsed(),
                );
                device.record_failure(outcome.status_code);
                return outcome;
            }
        };

        let manifest = match response.status {
            200 => match serde_json::from_str::<Manifest>(&response.body) {
                Ok(manifest) => Some(manifest),
                Err(e) => {
                    warn!(
                        device = %device.id(),
                        token = %device.auth_token(),
                        "Malformed manifest body: {}",
                        e
                    );
                    None
                }
            },
            404 => {
                debug!(device = %device.id(), "No ride assigned");
                None
            }
            status => {
                debug!(device = %device.id(), status, "Unexpected fetch status");
                None
            }
        };

        let outcome = Outcome::completed(
            OperationKind::FetchManifest,
            device.identity(),
            url,
            response.status,
            response.body.clone(),
            response.elapsed,
        );
        device.record_response(response.status, response.body, manifest);
        outcome
    }

    /// Move one work item to "departure".
    ///
    /// Always yields one `UpdateStatus` outcome; the response body is recorded
    /// but not interpreted.
    pub async fn update_status(
        &self,
        identity: &DeviceIdentity,
        item: &WorkItem,
        endpoint: &Endpoint,
    ) -> Outcome {
        let Some(item_id) = item.addressable_id() else {
            return Outcome::failed(
                OperationKind::UpdateStatus,
                identity,
                self.url_for(endpoint, ""),
                "work item has no usable id",
                std::time::Duration::ZERO,
            );
        };

        let url = self.url_for(endpoint, &item_id.to_string());
        let body = match serde_json::to_string(&StatusUpdate::departure()) {
            Ok(body) => body,
            Err(e) => {
                return Outcome::failed(
                    OperationKind::UpdateStatus,
                    identity,
                    url,
                    e.to_string(),
                    std::time::Duration::ZERO,
                )
            }
        };
        let request = DeviceRequest::new(Method::PUT, url.clone())
            .header(endpoint.auth_header.clone(), identity.auth_token.clone())
            .json_body(body);

        Self::pace(endpoint).await;

        let started = Instant::now();
        match self.transport.send(request).await {
            Ok(response) => {
                debug!(device = %identity.id, item = item_id, status = response.status, "Status updated");
                Outcome::completed(
                    OperationKind::UpdateStatus,
                    identity,
                    url,
                    response.status,
                    response.body,
                    response.elapsed,
                )
            }
            Err(e) => {
                warn!(device = %identity.id, item = item_id, "Status update failed: {}", e);
                Outcome::failed(
                    OperationKind::UpdateStatus,
                    identity,
                    url,
                    e.to_string(),
                    started.elapsed(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::device::TransportError;
    use crate::report::NO_RESPONSE_STATUS;
    use crate::testing::{fixtures, MockTransport};

    fn client(transport: &Arc<MockTransport>) -> DeviceClient {
        DeviceClient::new(Arc::clone(transport) as Arc<dyn Transport>, "http://dispatch")
    }

    #[tokio::test]
    async fn test_fetch_parses_manifest_on_200() {
        let transport = Arc::new(MockTransport::new());
        transport
            .respond("http://dispatch/api/v1/tablets/dev-a", 200, fixtures::manifest_json(&[&[11, 12]]))
            .await;
        let mut device = Device::new(DeviceIdentity::new("dev-a", "tok-a"));

        let outcome = client(&transport)
            .fetch_manifest(&mut device, &fixtures::fetch_endpoint())
            .await;

        assert_eq!(outcome.kind, OperationKind::FetchManifest);
        assert_eq!(outcome.status_code, 200);
        assert_eq!(outcome.url, "http://dispatch/api/v1/tablets/dev-a");
        assert_eq!(device.last_status_code(), Some(200));
        let manifest = device.manifest().expect("manifest parsed");
        assert_eq!(manifest.batches()[0].items().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_sends_auth_header_from_endpoint() {
        let transport = Arc::new(MockTransport::new());
        let mut endpoint = fixtures::fetch_endpoint();
        endpoint.auth_header = "X-Tablet-Token".to_string();
        let mut device = Device::new(DeviceIdentity::new("dev-a", "tok-a"));

        client(&transport).fetch_manifest(&mut device, &endpoint).await;

        let requests = transport.recorded_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].header_value("X-Tablet-Token"), Some("tok-a"));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body_keeps_raw() {
        let transport = Arc::new(MockTransport::new());
        transport
            .respond("http://dispatch/api/v1/tablets/dev-a", 200, "{not json")
            .await;
        let mut device = Device::new(DeviceIdentity::new("dev-a", "tok-a"));

        let outcome = client(&transport)
            .fetch_manifest(&mut device, &fixtures::fetch_endpoint())
            .await;

        assert_eq!(outcome.status_code, 200);
        assert_eq!(outcome.response.as_deref(), Some("{not json"));
        assert!(outcome.error.is_none());
        assert!(device.manifest().is_none());
        assert_eq!(device.last_raw_response(), Some("{not json"));
    }

    #[tokio::test]
    async fn test_fetch_404_is_no_assignment() {
        let transport = Arc::new(MockTransport::new());
        transport
            .respond("http://dispatch/api/v1/tablets/dev-a", 404, r#"{"error":"no ride"}"#)
            .await;
        let mut device = Device::new(DeviceIdentity::new("dev-a", "tok-a"));

        let outcome = client(&transport)
            .fetch_manifest(&mut device, &fixtures::fetch_endpoint())
            .await;

        assert_eq!(outcome.status_code, 404);
        assert!(outcome.error.is_none());
        assert!(device.manifest().is_none());
        assert_eq!(device.last_raw_response(), Some(r#"{"error":"no ride"}"#));
    }

    #[tokio::test]
    async fn test_fetch_transport_failure_gives_sentinel_outcome() {
        let transport = Arc::new(MockTransport::new());
        transport
            .fail("http://dispatch/api/v1/tablets/dev-a", TransportError::Timeout)
            .await;
        let mut device = Device::new(DeviceIdentity::new("dev-a", "tok-a"));

        let outcome = client(&transport)
            .fetch_manifest(&mut device, &fixtures::fetch_endpoint())
            .await;

        assert_eq!(outcome.status_code, NO_RESPONSE_STATUS);
        assert_eq!(outcome.error.as_deref(), Some("request timed out"));
        assert!(outcome.response.is_none());
        assert_eq!(device.last_status_code(), Some(NO_RESPONSE_STATUS));
    }

    #[tokio::test]
    async fn test_delay_is_honored_before_send() {
        let transport = Arc::new(MockTransport::new());
        let mut endpoint = fixtures::fetch_endpoint();
        endpoint.delay = Duration::from_millis(60);
        let mut device = Device::new(DeviceIdentity::new("dev-a", "tok-a"));

        let started = Instant::now();
        let outcome = client(&transport).fetch_manifest(&mut device, &endpoint).await;

        assert!(started.elapsed() >= Duration::from_millis(60));
        // Pacing is not part of the measured request time
        assert!(outcome.elapsed_seconds < 0.06);
    }

    #[tokio::test]
    async fn test_update_sends_departure_with_device_token() {
        let transport = Arc::new(MockTransport::new());
        transport
            .respond("http://dispatch/api/v1/ride_points/42", 200, "updated")
            .await;
        let identity = DeviceIdentity::new("dev-a", "tok-a");

        let outcome = client(&transport)
            .update_status(&identity, &fixtures::work_item(42), &fixtures::update_endpoint())
            .await;

        assert_eq!(outcome.kind, OperationKind::UpdateStatus);
        assert_eq!(outcome.status_code, 200);
        assert_eq!(outcome.auth_token, "tok-a");
        assert_eq!(outcome.response.as_deref(), Some("updated"));

        let requests = transport.recorded_requests().await;
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(requests[0].url, "http://dispatch/api/v1/ride_points/42");
        assert_eq!(
            requests[0].body.as_deref(),
            Some(r#"{"ride_point":{"status":"departure"}}"#)
        );
        assert_eq!(requests[0].header_value("Content-Type"), Some("application/json"));
        assert_eq!(requests[0].header_value("HTTP-AUTH-TOKEN"), Some("tok-a"));
    }

    #[tokio::test]
    async fn test_update_records_non_2xx() {
        let transport = Arc::new(MockTransport::new());
        transport
            .respond("http://dispatch/api/v1/ride_points/42", 422, "invalid transition")
            .await;
        let identity = DeviceIdentity::new("dev-a", "tok-a");

        let outcome = client(&transport)
            .update_status(&identity, &fixtures::work_item(42), &fixtures::update_endpoint())
            .await;

        assert_eq!(outcome.status_code, 422);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_update_without_id_is_not_sent() {
        let transport = Arc::new(MockTransport::new());
        let identity = DeviceIdentity::new("dev-a", "tok-a");

        let outcome = client(&transport)
            .update_status(&identity, &WorkItem::default(), &fixtures::update_endpoint())
            .await;

        assert!(outcome.is_transport_failure());
        assert!(transport.recorded_requests().await.is_empty());
    }
}
