use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::DeviceIdentity;

/// Which device call produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    FetchManifest,
    UpdateStatus,
    Other,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchManifest => "fetch_manifest",
            Self::UpdateStatus => "update_status",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status code recorded when no response was received.
pub const NO_RESPONSE_STATUS: u16 = 0;

/// Result and timing of one completed device call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub device_id: String,
    #[serde(rename = "token")]
    pub auth_token: String,
    pub url: String,
    pub status_code: u16,
    /// Raw response body; absent when no response arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Seconds from just before send until the response headers arrived.
    #[serde(rename = "processed_time")]
    pub elapsed_seconds: f64,
    /// Set when the call failed before any response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    /// A call that received a response, whatever its status.
    pub fn completed(
        kind: OperationKind,
        identity: &DeviceIdentity,
        url: impl Into<String>,
        status_code: u16,
        response: String,
        elapsed: Duration,
    ) -> Self {
        Self {
            kind,
            device_id: identity.id.clone(),
            auth_token: identity.auth_token.clone(),
            url: url.into(),
            status_code,
            response: Some(response),
            elapsed_seconds: elapsed.as_secs_f64(),
            error: None,
        }
    }

    /// A call that failed before a response arrived.
    pub fn failed(
        kind: OperationKind,
        identity: &DeviceIdentity,
        url: impl Into<String>,
        error: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            kind,
            device_id: identity.id.clone(),
            auth_token: identity.auth_token.clone(),
            url: url.into(),
            status_code: NO_RESPONSE_STATUS,
            response: None,
            elapsed_seconds: elapsed.as_secs_f64(),
            error: Some(error.into()),
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Status class label used in metrics ("2xx", "4xx", "none", ...).
    pub fn status_class(&self) -> &'static str {
        match self.status_code {
            NO_RESPONSE_STATUS => "none",
            100..=199 => "1xx",
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            _ => "5xx",
        }
    }
}

/// Aggregated result of one fleet run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,
    pub when: DateTime<Utc>,
    /// Wall-clock seconds for the whole run.
    pub elapsed_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    #[serde(rename = "get_results")]
    pub fetch_results: Vec<Outcome>,
    pub update_results: Vec<Outcome>,
    #[serde(rename = "others_result")]
    pub other_results: Vec<Outcome>,
}

impl Report {
    pub fn new(when: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            when,
            elapsed_time: 0.0,
            config_hash: None,
            fetch_results: Vec::new(),
            update_results: Vec::new(),
            other_results: Vec::new(),
        }
    }

    /// Classify an outcome and append it to its category.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome.kind {
            OperationKind::FetchManifest => self.fetch_results.push(outcome),
            OperationKind::UpdateStatus => self.update_results.push(outcome),
            OperationKind::Other => self.other_results.push(outcome),
        }
    }

    /// Number of outcomes across all categories.
    pub fn total(&self) -> usize {
        self.fetch_results.len() + self.update_results.len() + self.other_results.len()
    }

    pub fn transport_failures(&self) -> usize {
        self.fetch_results
            .iter()
            .chain(&self.update_results)
            .chain(&self.other_results)
            .filter(|o| o.is_transport_failure())
            .count()
    }

    /// Update outcomes attributed to one auth token, in arrival order.
    pub fn updates_for_token<'a>(&'a self, token: &'a str) -> impl Iterator<Item = &'a Outcome> {
        self.update_results
            .iter()
            .filter(move |o| o.auth_token == token)
    }
}
