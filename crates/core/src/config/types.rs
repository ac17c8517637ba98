use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::ConfigError;

/// Root configuration for one fleet run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HiveConfig {
    /// Base URL of the dispatch API, e.g. "http://dispatch.local:3000".
    pub server: String,
    /// JSON file holding `tokens` or `sadira_logins`.
    pub token_file_path: PathBuf,
    /// Optional JSON file with `device_codes` paired to tokens by position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_codes_file_path: Option<PathBuf>,
    /// Default artificial delay in *seconds* for endpoints that omit their own.
    #[serde(default)]
    pub delay: u64,
    /// Header carrying the device auth token.
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
    /// Endpoint used for Phase A.
    #[serde(default = "default_fetch_endpoint")]
    pub fetch_endpoint: String,
    /// Endpoint used for Phase B.
    #[serde(default = "default_update_endpoint")]
    pub update_endpoint: String,
    /// Maximum device tasks in flight (0 = one slot per device).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Capacity of the outcome channel feeding the aggregator.
    #[serde(default = "default_outcome_buffer")]
    pub outcome_buffer: usize,
    #[serde(default)]
    pub extraction_policy: ExtractionPolicy,
    pub endpoints: BTreeMap<String, EndpointConfig>,
    #[serde(default)]
    pub report: ReportConfig,
}

fn default_auth_header() -> String {
    "HTTP-AUTH-TOKEN".to_string()
}

fn default_fetch_endpoint() -> String {
    "get_rides".to_string()
}

fn default_update_endpoint() -> String {
    "update_status".to_string()
}

fn default_max_concurrency() -> usize {
    256
}

fn default_request_timeout() -> u64 {
    30
}

fn default_outcome_buffer() -> usize {
    1024
}

/// One named remote operation as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Path appended to `server`; the device or item id is appended after it.
    pub url: String,
    /// Artificial delay in *milliseconds* before each request; falls back to
    /// the fleet-wide `delay` (seconds) when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    /// Overrides `auth_header` for this endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

/// How work items are collected from a manifest with several batches.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPolicy {
    /// Items of every non-empty batch, in manifest order.
    #[default]
    Concatenate,
    /// Only the items of the last non-empty batch.
    LastBatch,
}

/// Where run artifacts are written.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_path")]
    pub path: PathBuf,
    /// Directory for per-category JSON-lines files written while running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_dir: Option<PathBuf>,
    /// Prometheus text dump written after the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: default_report_path(),
            stream_dir: None,
            metrics_path: None,
        }
    }
}

fn default_report_path() -> PathBuf {
    PathBuf::from("results.json")
}

/// A resolved endpoint, immutable for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub path: String,
    pub delay: Duration,
    pub auth_header: String,
}

impl HiveConfig {
    /// Resolve a named endpoint, applying the fleet-wide delay and header defaults.
    pub fn endpoint(&self, name: &str) -> Result<Endpoint, ConfigError> {
        let raw = self
            .endpoints
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEndpoint(name.to_string()))?;

        Ok(Endpoint {
            name: name.to_string(),
            path: raw.url.clone(),
            delay: raw
                .delay
                .map(Duration::from_millis)
                .unwrap_or_else(|| Duration::from_secs(self.delay)),
            auth_header: raw
                .header
                .clone()
                .unwrap_or_else(|| self.auth_header.clone()),
        })
    }

    pub fn fetch(&self) -> Result<Endpoint, ConfigError> {
        self.endpoint(&self.fetch_endpoint)
    }

    pub fn update(&self) -> Result<Endpoint, ConfigError> {
        self.endpoint(&self.update_endpoint)
    }

    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
