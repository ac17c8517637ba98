use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::HiveConfig;

use super::{DeviceCodes, DeviceIdentity, IdentityError, IdentitySource, TokenIssuer};

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IdentityError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(IdentityError::FileNotFound(path.display().to_string()))
        }
        Err(e) => {
            return Err(IdentityError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        }
    };
    serde_json::from_str(&content).map_err(|e| IdentityError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Read a `{"device_codes": [...]}` file.
pub async fn load_device_codes(path: &Path) -> Result<Vec<String>, IdentityError> {
    read_json::<DeviceCodes>(path).await.map(|c| c.device_codes)
}

/// Turn an identity source into device identities.
///
/// Device codes, when given, replace the default device id position by
/// position. Logins are exchanged for tokens one at a time through `issuer`.
pub async fn resolve_identities(
    source: IdentitySource,
    device_codes: Option<Vec<String>>,
    issuer: Option<&dyn TokenIssuer>,
) -> Result<Vec<DeviceIdentity>, IdentityError> {
    if source.is_empty() {
        return Err(IdentityError::Empty);
    }

    let codes = device_codes.unwrap_or_default();
    if !codes.is_empty() && codes.len() != source.len() {
        warn!(
            codes = codes.len(),
            devices = source.len(),
            "Device code count does not match device count, unpaired devices keep default ids"
        );
    }

    let identities = match source {
        IdentitySource::Tokens { tokens } => tokens
            .into_iter()
            .enumerate()
            .map(|(idx, token)| match codes.get(idx) {
                Some(code) => DeviceIdentity::new(code.clone(), token),
                None => DeviceIdentity::from_token(token),
            })
            .collect(),
        IdentitySource::Logins { sadira_logins } => {
            let issuer = issuer.ok_or(IdentityError::IssuerRequired)?;
            let mut identities = Vec::with_capacity(sadira_logins.len());
            for (idx, login) in sadira_logins.into_iter().enumerate() {
                let token = issuer.issue(&login).await?;
                debug!(login = %login, "Issued token for login");
                let id = codes.get(idx).cloned().unwrap_or(login);
                identities.push(DeviceIdentity::new(id, token));
            }
            identities
        }
    };

    Ok(identities)
}

/// Load every device identity named by the configuration.
pub async fn load_identities(
    config: &HiveConfig,
    issuer: Option<&dyn TokenIssuer>,
) -> Result<Vec<DeviceIdentity>, IdentityError> {
    let source: IdentitySource = read_json(&config.token_file_path).await?;
    let codes = match &config.device_codes_file_path {
        Some(path) => Some(load_device_codes(path).await?),
        None => None,
    };

    let identities = resolve_identities(source, codes, issuer).await?;
    info!(devices = identities.len(), "Loaded device identities");
    Ok(identities)
}
