//! HTTP error classification and normalization
//!
//! Every terminal failure of the pipeline reaches the caller as an
//! [`ApiError`]. The [`ErrorKind`] decides retryability; the remaining
//! fields carry what the server said (status, code, details) so callers can
//! branch and display without re-reading the transport response.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Classification of pipeline failures for retry and display logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad URL, endpoint or configuration - never retried
    Construction,
    /// Authentication required but no credential is stored
    MissingCredential,
    /// The attempt exceeded its deadline
    Timeout,
    /// Connection-level transport fault (DNS, connect, reset)
    Network,
    /// 401 - handled by the auth interceptor, never by the retry engine
    Unauthorized,
    /// 4xx other than 401/408/429
    Client,
    /// 408
    RequestTimeout,
    /// 429
    RateLimited,
    /// 5xx
    Server,
    /// Aborted by the caller's cancellation signal
    Cancelled,
    /// A successful response whose body could not be read as declared
    Decode,
}

impl ErrorKind {
    /// Check if this error type should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::Network
                | ErrorKind::RequestTimeout
                | ErrorKind::RateLimited
                | ErrorKind::Server
        )
    }

    /// Classification hint for faults that happened before any response
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ErrorKind::Timeout => Some("timeout"),
            ErrorKind::Network => Some("network"),
            ErrorKind::Cancelled => Some("cancelled"),
            _ => None,
        }
    }

    /// Classify a non-success HTTP status code
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => ErrorKind::Unauthorized,
            408 => ErrorKind::RequestTimeout,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Client,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Construction => "construction",
            ErrorKind::MissingCredential => "missing_credential",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Client => "client",
            ErrorKind::RequestTimeout => "request_timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Server => "server",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// Normalized pipeline error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error classification for retry logic
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// HTTP status code if a response was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Server-provided error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Additional error details from the response body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// When the error was produced
    pub timestamp: DateTime<Utc>,
    /// Retry-After header value (seconds) if present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ApiError {
    /// Create an error with no response attached
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            details: None,
            timestamp: Utc::now(),
            retry_after: None,
        }
    }

    /// Authentication is required but the credential store is empty
    pub fn missing_credential() -> Self {
        Self::new(
            ErrorKind::MissingCredential,
            "Authentication required but no access token is available",
        )
        .with_code("missing_credential")
    }

    /// The attempt did not finish within its deadline
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Request timed out after {}ms", after.as_millis()),
        )
    }

    /// The caller cancelled the call
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Request was cancelled")
    }

    /// Construction failure (bad URL, unknown endpoint, unusable body)
    pub fn construction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Construction, message)
    }

    /// Create from a network/request error
    pub fn from_transport(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            ErrorKind::Timeout
        } else if error.is_builder() {
            ErrorKind::Construction
        } else if error.is_decode() {
            ErrorKind::Decode
        } else {
            ErrorKind::Network
        };

        let message = if error.is_connect() {
            format!("Connection failed: {}", error)
        } else {
            error.to_string()
        };

        Self::new(kind, message)
    }

    /// Build from a non-success response
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Self {
        let retry_after = headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());

        let text = String::from_utf8_lossy(body);
        let json = serde_json::from_slice::<Value>(body).ok();
        let fields = extract_error_fields(json.as_ref());

        let message = fields.message.unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            )
        });

        // Plain-text bodies are kept for debugging
        let details = match (fields.details, json.is_none() && !text.trim().is_empty()) {
            (Some(details), _) => Some(details),
            (None, true) => Some(Value::String(text.trim().to_string())),
            (None, false) => None,
        };

        Self {
            kind: ErrorKind::from_status(status),
            message,
            status: Some(status.as_u16()),
            code: fields.code,
            details,
            timestamp: Utc::now(),
            retry_after,
        }
    }

    /// Attach a machine-readable code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach structured details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Check if this error should trigger a retry
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Transport fault hint (`"timeout"`, `"network"`, `"cancelled"`)
    pub fn hint(&self) -> Option<&'static str> {
        self.kind.hint()
    }

    /// Get the error classification
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether this is a 401 from the server
    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API Error [{}]: {} (kind: {})",
            self.status
                .map(|c| c.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            self.message,
            self.kind
        )
    }
}

impl std::error::Error for ApiError {}

impl From<crate::Error> for ApiError {
    fn from(error: crate::Error) -> Self {
        ApiError::construction(error.to_string())
    }
}

/// Structured error fields found in a response body
#[derive(Debug, Default, PartialEq)]
struct ErrorFields {
    message: Option<String>,
    code: Option<String>,
    details: Option<Value>,
}

/// Pull `message`/`code`/`details` out of the common error body shapes
fn extract_error_fields(json: Option<&Value>) -> ErrorFields {
    let Some(json) = json.filter(|v| v.is_object()) else {
        return ErrorFields::default();
    };

    let as_string = |v: Option<&Value>| v.and_then(|v| v.as_str()).map(|s| s.to_string());
    let code_of = |v: Option<&Value>| {
        v.and_then(|c| match c {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    };

    let mut fields = ErrorFields {
        message: as_string(json.get("message")),
        code: code_of(json.get("code")),
        details: json.get("details").filter(|d| !d.is_null()).cloned(),
    };

    // {"error": "text"} or {"error": {"message": ..., "code": ...}}
    match json.get("error") {
        Some(Value::String(text)) if fields.message.is_none() => {
            fields.message = Some(text.clone());
        }
        Some(Value::Object(inner)) => {
            if fields.message.is_none() {
                fields.message = as_string(inner.get("message"));
            }
            if fields.code.is_none() {
                fields.code = code_of(inner.get("code")).or_else(|| as_string(inner.get("type")));
            }
            if fields.details.is_none() {
                fields.details = inner.get("details").filter(|d| !d.is_null()).cloned();
            }
        }
        _ => {}
    }

    fields
}
