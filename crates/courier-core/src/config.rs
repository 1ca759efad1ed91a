//! Client configuration and base-address resolution
//!
//! The base address is resolved once, in this order: an explicit override,
//! then `COURIER_API_URL`, then the default for the active environment.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::http::builder::parse_header;
use crate::http::{RetryPolicy, TimeoutConfig};
use crate::{Error, Result};

/// Environment variable selecting the deployment environment
pub const ENV_VAR: &str = "COURIER_ENV";
/// Environment variable overriding the base address
pub const API_URL_VAR: &str = "COURIER_API_URL";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 3] = [
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    /// Base address used when nothing overrides it
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Environment::Development => "http://localhost:3000",
            Environment::Staging => "https://staging.api.courier.dev",
            Environment::Production => "https://api.courier.dev",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "stage" | "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(Error::configuration(format!(
                "unknown environment '{}' (expected development, staging or production)",
                other
            ))),
        }
    }
}

/// Pick the base address; blank values count as absent
pub fn resolve_base_url(
    explicit: Option<&str>,
    env_url: Option<&str>,
    environment: Environment,
) -> String {
    fn present(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|v| !v.is_empty())
    }

    present(explicit)
        .or_else(|| present(env_url))
        .unwrap_or_else(|| environment.default_base_url())
        .to_string()
}

/// Configuration for [`crate::ApiClient`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub environment: Environment,
    pub timeouts: TimeoutConfig,
    pub retry: RetryPolicy,
    /// Headers sent with every request, below per-call headers
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let environment = Environment::default();
        Self {
            base_url: environment.default_base_url().to_string(),
            environment,
            timeouts: TimeoutConfig::default(),
            retry: RetryPolicy::default(),
            default_headers: BTreeMap::new(),
            user_agent: format!("courier/{}", crate::VERSION),
        }
    }
}

impl ClientConfig {
    /// Resolve from the process environment, loading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup(ENV_VAR) {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => Environment::default(),
        };
        let base_url = resolve_base_url(None, lookup(API_URL_VAR).as_deref(), environment);
        debug!(%environment, %base_url, "Resolved client configuration");

        Ok(Self {
            base_url,
            environment,
            ..Default::default()
        })
    }

    /// Set the base URL explicitly (highest precedence)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Switch environment, moving to its default address unless overridden
    pub fn with_environment(mut self, environment: Environment) -> Self {
        if self.base_url == self.environment.default_base_url() {
            self.base_url = environment.default_base_url().to_string();
        }
        self.environment = environment;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Check the configuration before building a client
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| Error::InvalidUrl {
            input: self.base_url.clone(),
            message: e.to_string(),
            source: Some(e),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl {
                input: self.base_url.clone(),
                message: format!("unsupported scheme '{}'", url.scheme()),
                source: None,
            });
        }

        self.timeouts.validate().map_err(Error::configuration)?;
        self.retry.validate().map_err(Error::configuration)?;

        for (name, value) in &self.default_headers {
            parse_header(name, value)?;
        }

        Ok(())
    }
}

/// Shared, swappable base address
///
/// Readers always see either the old or the new value in full.
#[derive(Debug, Clone)]
pub struct BaseUrl(Arc<RwLock<String>>);

impl BaseUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(url.into())))
    }

    pub fn get(&self) -> String {
        self.0.read().clone()
    }

    pub fn set(&self, url: impl Into<String>) {
        *self.0.write() = url.into();
    }
}
