use crate::identity::DeviceIdentity;
use crate::wire::Manifest;

/// Runtime state of one simulated tablet.
///
/// A device is owned by the orchestrator and moved into at most one task at a
/// time; only that task mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    identity: DeviceIdentity,
    last_status_code: Option<u16>,
    last_raw_response: Option<String>,
    manifest: Option<Manifest>,
}

impl Device {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            last_status_code: None,
            last_raw_response: None,
            manifest: None,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn auth_token(&self) -> &str {
        &self.identity.auth_token
    }

    /// Status of the last fetch; `None` before the first call.
    pub fn last_status_code(&self) -> Option<u16> {
        self.last_status_code
    }

    pub fn last_raw_response(&self) -> Option<&str> {
        self.last_raw_response.as_deref()
    }

    /// Manifest parsed from the last successful fetch.
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub(crate) fn record_response(&mut self, status: u16, body: String, manifest: Option<Manifest>) {
        self.last_status_code = Some(status);
        self.last_raw_response = Some(body);
        self.manifest = manifest;
    }

    pub(crate) fn record_failure(&mut self, status: u16) {
        self.last_status_code = Some(status);
        self.last_raw_response = None;
        self.manifest = None;
    }

    /// Replace the manifest directly (fixtures, replays).
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.last_status_code = Some(200);
        self.manifest = Some(manifest);
        self
    }
}
