use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use std::path::Path;

use super::{types::HiveConfig, ConfigError};

/// Prefix for environment overrides, e.g. `TABLETHIVE_MAX_CONCURRENCY=64`.
pub const ENV_PREFIX: &str = "TABLETHIVE_";

/// On-disk configuration formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from the file extension; anything but `.toml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<HiveConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let figment = match ConfigFormat::from_path(path) {
        ConfigFormat::Json => Figment::new().merge(Json::file(path)),
        ConfigFormat::Toml => Figment::new().merge(Toml::file(path)),
    };

    let config: HiveConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from a string (useful for testing)
pub fn load_config_from_str(content: &str, format: ConfigFormat) -> Result<HiveConfig, ConfigError> {
    match format {
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const JSON: &str = r#"{
        "server": "http://localhost:3000",
        "token_file_path": "tokens.json",
        "delay": 10,
        "endpoints": {
            "get_rides": {"url": "/api/v1/tablets/", "delay": 0},
            "update_status": {"url": "/api/v1/ride_points/", "delay": 0}
        }
    }"#;

    #[test]
    fn test_load_config_from_str_json() {
        let config = load_config_from_str(JSON, ConfigFormat::Json).unwrap();
        assert_eq!(config.server, "http://localhost:3000");
        assert_eq!(config.delay, 10);
        assert_eq!(config.endpoints.len(), 2);
    }

    #[test]
    fn test_load_config_from_str_toml() {
        let toml = r#"
server = "http://localhost:3000"
token_file_path = "tokens.json"
extraction_policy = "last_batch"

[endpoints.get_rides]
url = "/api/v1/tablets/"

[endpoints.update_status]
url = "/api/v1/ride_points/"
"#;
        let config = load_config_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.extraction_policy, ExtractionPolicy::LastBatch);
        assert_eq!(config.endpoints["get_rides"].url, "/api/v1/tablets/");
    }

    #[test]
    fn test_load_config_from_str_missing_endpoints() {
        let json = r#"{"server": "http://x", "token_file_path": "t.json"}"#;
        let result = load_config_from_str(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Json);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        write!(temp_file, "{}", JSON).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server, "http://localhost:3000");
        assert_eq!(config.fetch().unwrap().path, "/api/v1/tablets/");
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.json", JSON)?;
            jail.set_env("TABLETHIVE_MAX_CONCURRENCY", "8");
            jail.set_env("TABLETHIVE_REPORT__PATH", "out/run.json");

            let config = load_config(Path::new("config.json"))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.max_concurrency, 8);
            assert_eq!(config.report.path.to_str(), Some("out/run.json"));
            Ok(())
        });
    }
}
