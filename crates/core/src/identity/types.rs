use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One simulated tablet: the id used in fetch URLs and the token sent with
/// every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub id: String,
    pub auth_token: String,
}

impl DeviceIdentity {
    pub fn new(id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            auth_token: auth_token.into(),
        }
    }

    /// An identity whose token doubles as its device id.
    pub fn from_token(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            id: token.clone(),
            auth_token: token,
        }
    }
}

/// Contents of the identity file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum IdentitySource {
    Tokens { tokens: Vec<String> },
    Logins { sadira_logins: Vec<String> },
}

impl IdentitySource {
    pub fn len(&self) -> usize {
        match self {
            Self::Tokens { tokens } => tokens.len(),
            Self::Logins { sadira_logins } => sadira_logins.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Optional device codes file, paired with tokens by position.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceCodes {
    pub device_codes: Vec<String>,
}

/// Exchanges a login for an auth token (device registration handshake).
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, login: &str) -> Result<String, IdentityError>;
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity file not found: {0}")]
    FileNotFound(String),

    #[error("failed to read identity file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse identity file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("identity file contains no devices")]
    Empty,

    #[error("identity file lists logins but no token issuer is configured")]
    IssuerRequired,

    #[error("token issuance failed for {login}: {reason}")]
    Issuance { login: String, reason: String },
}
