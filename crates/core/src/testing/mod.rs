//! Testing utilities and mock implementations.
//!
//! This module provides a scriptable [`MockTransport`], a [`StaticTokenIssuer`]
//! and fixtures, allowing fleet runs to be tested without a dispatch server.
//!
//! # Example
//!
//! ```rust,ignore
//! use tablethive_core::testing::{fixtures, MockTransport};
//!
//! let transport = MockTransport::new();
//! transport
//!     .respond("http://dispatch/api/v1/tablets/a", 200, fixtures::manifest_json(&[&[1, 2]]))
//!     .await;
//! ```

mod mock_transport;

use async_trait::async_trait;

use crate::identity::{IdentityError, TokenIssuer};

pub use mock_transport::{MockRoute, MockTransport};

/// Token issuer that derives tokens from logins without any network call.
#[derive(Debug, Clone)]
pub struct StaticTokenIssuer {
    prefix: String,
    rejected: Vec<String>,
}

impl StaticTokenIssuer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            rejected: Vec::new(),
        }
    }

    /// Refuse to issue a token for `login`.
    pub fn reject(mut self, login: impl Into<String>) -> Self {
        self.rejected.push(login.into());
        self
    }
}

#[async_trait]
impl TokenIssuer for StaticTokenIssuer {
    async fn issue(&self, login: &str) -> Result<String, IdentityError> {
        if self.rejected.iter().any(|l| l == login) {
            return Err(IdentityError::Issuance {
                login: login.to_string(),
                reason: "rejected".to_string(),
            });
        }
        Ok(format!("{}{}", self.prefix, login))
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use serde_json::{json, Map, Value};

    use crate::config::{Endpoint, EndpointConfig, ExtractionPolicy, HiveConfig, ReportConfig};
    use crate::identity::DeviceIdentity;
    use crate::report::{OperationKind, Outcome};
    use crate::wire::{Manifest, WorkItem};

    pub const FETCH_PATH: &str = "/api/v1/tablets/";
    pub const UPDATE_PATH: &str = "/api/v1/ride_points/";

    /// A config with `get_rides` and `update_status` endpoints and no delays.
    pub fn hive_config(server: &str) -> HiveConfig {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(
            "get_rides".to_string(),
            EndpointConfig {
                url: FETCH_PATH.to_string(),
                delay: None,
                header: None,
            },
        );
        endpoints.insert(
            "update_status".to_string(),
            EndpointConfig {
                url: UPDATE_PATH.to_string(),
                delay: None,
                header: None,
            },
        );

        HiveConfig {
            server: server.to_string(),
            token_file_path: "tokens.json".into(),
            device_codes_file_path: None,
            delay: 0,
            auth_header: "HTTP-AUTH-TOKEN".to_string(),
            fetch_endpoint: "get_rides".to_string(),
            update_endpoint: "update_status".to_string(),
            max_concurrency: 16,
            request_timeout_secs: 5,
            outcome_buffer: 64,
            extraction_policy: ExtractionPolicy::Concatenate,
            endpoints,
            report: ReportConfig::default(),
        }
    }

    pub fn fetch_endpoint() -> Endpoint {
        Endpoint {
            name: "get_rides".to_string(),
            path: FETCH_PATH.to_string(),
            delay: Duration::ZERO,
            auth_header: "HTTP-AUTH-TOKEN".to_string(),
        }
    }

    pub fn update_endpoint() -> Endpoint {
        Endpoint {
            name: "update_status".to_string(),
            path: UPDATE_PATH.to_string(),
            delay: Duration::ZERO,
            auth_header: "HTTP-AUTH-TOKEN".to_string(),
        }
    }

    pub fn work_item(id: u64) -> WorkItem {
        WorkItem::from_fields(object(json!({"id": id, "status": "new"})))
    }

    /// A manifest with one batch per slice, holding items with those ids.
    pub fn manifest(batches: &[&[u64]]) -> Manifest {
        let fact_rides: Vec<Value> = batches
            .iter()
            .enumerate()
            .map(|(idx, ids)| {
                let ride_points: Vec<Value> = ids
                    .iter()
                    .map(|id| Value::Object(work_item(*id).fields().clone()))
                    .collect();
                json!({"id": idx + 1, "ride_points": ride_points})
            })
            .collect();
        Manifest::from_fields(object(json!({
            "id": 1,
            "number": "R-1",
            "fact_rides": fact_rides,
        })))
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(fields) => fields,
            _ => Map::new(),
        }
    }

    pub fn manifest_json(batches: &[&[u64]]) -> String {
        serde_json::to_string(&manifest(batches)).unwrap()
    }

    pub fn identities(count: usize) -> Vec<DeviceIdentity> {
        (1..=count)
            .map(|i| DeviceIdentity::new(i.to_string(), format!("token-{}", i)))
            .collect()
    }

    /// An outcome for `device` (token `token-{device}`).
    pub fn outcome(kind: OperationKind, device: &str, status: u16) -> Outcome {
        let identity = DeviceIdentity::new(device, format!("token-{}", device));
        Outcome::completed(
            kind,
            &identity,
            format!("http://dispatch{}{}", FETCH_PATH, device),
            status,
            String::new(),
            Duration::from_millis(10),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_issuer() {
        let issuer = StaticTokenIssuer::new("t-").reject("blocked");
        assert_eq!(issuer.issue("driver").await.unwrap(), "t-driver");
        assert!(issuer.issue("blocked").await.is_err());
    }

    #[test]
    fn test_manifest_fixture_shape() {
        let manifest = fixtures::manifest(&[&[1, 2], &[], &[3]]);
        assert_eq!(manifest.batches().len(), 3);
        assert!(manifest.batches()[1].is_empty());
        assert_eq!(manifest.batches()[2].items()[0].id(), Some(3));
    }
}
