use super::{types::HiveConfig, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server URL is non-empty and http(s)
/// - Fetch and update endpoints exist
/// - Outcome buffer is not 0
pub fn validate_config(config: &HiveConfig) -> Result<(), ConfigError> {
    let server = config.server.trim();
    if server.is_empty() {
        return Err(ConfigError::ValidationError(
            "server cannot be empty".to_string(),
        ));
    }
    if !(server.starts_with("http://") || server.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "server must be an http(s) URL, got {}",
            server
        )));
    }

    if config.auth_header.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "auth_header cannot be empty".to_string(),
        ));
    }

    config.fetch()?;
    config.update()?;

    if config.outcome_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "outcome_buffer cannot be 0".to_string(),
        ));
    }

    Ok(())
}
