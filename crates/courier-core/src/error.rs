//! Error types for the Courier core library
//!
//! Construction and configuration failures live here. They are raised before
//! any network attempt is made and are never retried. Failures that happen
//! while a request is in flight are reported as [`crate::http::ApiError`].

use thiserror::Error;

/// Main error type for client construction and configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (bad environment, invalid timeouts, ...)
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A base address or path could not be turned into a URL
    #[error("Invalid URL '{input}': {message}")]
    InvalidUrl {
        input: String,
        message: String,
        #[source]
        source: Option<url::ParseError>,
    },

    /// Endpoint registry lookups and template expansion
    #[error("Endpoint error: {name} - {message}")]
    Endpoint {
        name: String,
        message: String,
    },

    /// The underlying reqwest client could not be created
    #[error("HTTP client error: {message}")]
    HttpClient {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error without an underlying cause
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create an endpoint error for the given logical name
    pub fn endpoint(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Endpoint {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::HttpClient {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
