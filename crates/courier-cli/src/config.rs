//! Configuration management for the CLI
//!
//! Settings are layered, later layers winning:
//! - Default values
//! - Configuration file (YAML/JSON)
//! - Environment variables
//! - Command-line arguments

use crate::error::{Error, Result};
use courier_core::config::{API_URL_VAR, ENV_VAR};
use courier_core::{resolve_base_url, AuthCredential, ClientConfig, Environment, TimeoutConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Access token variable
pub const ACCESS_TOKEN_VAR: &str = "COURIER_ACCESS_TOKEN";
/// Refresh token variable
pub const REFRESH_TOKEN_VAR: &str = "COURIER_REFRESH_TOKEN";

const REDACTED: &str = "***";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where and how to reach the API
    pub api: ApiSettings,
    /// Stored credentials
    pub auth: AuthSettings,
}

/// API connection settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Per-attempt timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Headers sent with every request
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// Credential settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(config) => {
                        tracing::debug!(path = %path.display(), "Loaded configuration file");
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to load config file");
                    }
                }
            }
        }

        Ok(Self::default())
    }

    /// Load from an explicit file, or search the default locations
    pub fn load_with_file(file: Option<&Path>) -> Result<Self> {
        match file {
            Some(path) if !path.exists() => Err(Error::FileNotFound {
                path: path.to_path_buf(),
            }),
            Some(path) => Self::from_file(path),
            None => Self::load(),
        }
    }

    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".courier.yaml"), PathBuf::from(".courier.json")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("courier").join("config.yaml"));
        }

        paths
    }

    /// Apply environment variable overrides
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(env) = non_blank(ENV_VAR) {
            self.api.environment = Some(env);
        }
        if let Some(url) = non_blank(API_URL_VAR) {
            self.api.base_url = Some(url);
        }
        if let Some(token) = non_blank(ACCESS_TOKEN_VAR) {
            self.auth.access_token = Some(token);
        }
        if let Some(token) = non_blank(REFRESH_TOKEN_VAR) {
            self.auth.refresh_token = Some(token);
        }
    }

    /// Apply command-line overrides
    pub fn apply_flags(&mut self, base_url: Option<String>, environment: Option<String>) {
        if base_url.is_some() {
            self.api.base_url = base_url;
        }
        if environment.is_some() {
            self.api.environment = environment;
        }
    }

    /// Resolve the effective client configuration
    pub fn client_config(&self) -> Result<ClientConfig> {
        let environment: Environment = match self.api.environment.as_deref() {
            Some(env) => env.parse()?,
            None => Environment::default(),
        };

        let mut config = ClientConfig {
            base_url: resolve_base_url(self.api.base_url.as_deref(), None, environment),
            environment,
            ..ClientConfig::default()
        };

        let request = self.api.timeout_ms.map(Duration::from_millis);
        let connect = self.api.connect_timeout_ms.map(Duration::from_millis);
        if request.is_some() || connect.is_some() {
            let request = request.unwrap_or(config.timeouts.request_timeout);
            // a short request timeout pulls the default connect timeout down with it
            let connect = connect.unwrap_or_else(|| config.timeouts.connect_timeout.min(request));
            config.timeouts = TimeoutConfig::new(connect, request);
        }
        if let Some(retries) = self.api.max_retries {
            config.retry = config.retry.with_max_retries(retries);
        }
        for (name, value) in &self.api.headers {
            config = config.with_header(name, value);
        }

        config.validate()?;
        Ok(config)
    }

    /// Credential to seed the client's store with
    pub fn credential(&self) -> Option<AuthCredential> {
        let access = self.auth.access_token.as_deref().filter(|t| !t.is_empty())?;
        let credential = AuthCredential::new(access);
        Some(match self.auth.refresh_token.as_deref() {
            Some(refresh) if !refresh.is_empty() => credential.with_refresh_token(refresh),
            _ => credential,
        })
    }

    /// Copy safe to display, tokens masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for token in [&mut copy.auth.access_token, &mut copy.auth.refresh_token] {
            if token.is_some() {
                *token = Some(REDACTED.to_string());
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn write_config(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_yaml_file() {
        let file = write_config(
            ".yaml",
            "api:\n  environment: staging\n  max_retries: 3\n  headers:\n    X-Tenant: acme\nauth:\n  access_token: abc\n",
        );

        let config = Config::load_with_file(Some(file.path())).unwrap();
        assert_eq!(config.api.environment.as_deref(), Some("staging"));
        assert_eq!(config.api.max_retries, Some(3));
        assert_eq!(config.auth.access_token.as_deref(), Some("abc"));

        let client = config.client_config().unwrap();
        assert_eq!(client.environment, Environment::Staging);
        assert_eq!(client.base_url, Environment::Staging.default_base_url());
        assert_eq!(client.retry.max_retries, 3);
        assert_eq!(client.default_headers.get("X-Tenant").map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_load_json_file() {
        let file = write_config(".json", r#"{"api": {"base_url": "http://localhost:9000", "timeout_ms": 1500}}"#);

        let config = Config::load_with_file(Some(file.path())).unwrap();
        let client = config.client_config().unwrap();
        assert_eq!(client.base_url, "http://localhost:9000");
        assert_eq!(client.timeouts.request_timeout, Duration::from_millis(1500));
        assert_eq!(client.timeouts.connect_timeout, Duration::from_millis(1500));
        assert!(config.credential().is_none());
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load_with_file(Some(Path::new("/nonexistent/courier.yaml"))).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let file = write_config(".json", "{not json");
        let err = Config::load_with_file(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_env_overrides_file_and_flags_override_env() {
        let file = write_config(".yaml", "api:\n  base_url: http://file\nauth:\n  access_token: from-file\n");
        let mut config = Config::load_with_file(Some(file.path())).unwrap();

        config.apply_env(lookup(&[
            (API_URL_VAR, "http://env"),
            (ACCESS_TOKEN_VAR, "from-env"),
            (REFRESH_TOKEN_VAR, "refresh-env"),
            (ENV_VAR, "  "),
        ]));
        assert_eq!(config.api.base_url.as_deref(), Some("http://env"));
        assert_eq!(config.api.environment, None);

        config.apply_flags(Some("http://flag".to_string()), Some("prod".to_string()));
        let client = config.client_config().unwrap();
        assert_eq!(client.base_url, "http://flag");
        assert_eq!(client.environment, Environment::Production);

        let credential = config.credential().unwrap();
        assert_eq!(credential.access_token, "from-env");
        assert_eq!(credential.refresh_token.as_deref(), Some("refresh-env"));
    }

    #[test]
    fn test_unknown_environment_is_rejected() {
        let mut config = Config::default();
        config.apply_flags(None, Some("moon".to_string()));
        assert!(matches!(config.client_config(), Err(Error::Core(_))));
    }

    #[test]
    fn test_redacted_masks_tokens() {
        let mut config = Config::default();
        config.auth.access_token = Some("secret-access".to_string());

        let shown = serde_json::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("secret-access"));
        assert!(shown.contains("***"));
        assert!(!shown.contains("refresh_token"));
    }
}
