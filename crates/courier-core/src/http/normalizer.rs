//! Response normalization
//!
//! Every successful response becomes a [`ResponseEnvelope`]. Bodies that
//! already carry a boolean `success` field pass through unchanged; anything
//! else is wrapped as `{success: true, data: <payload>}`. Non-success
//! responses become an [`ApiError`].

use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{ApiError, ErrorKind};

/// Body of a successful response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Json(Value),
    Text(String),
    Binary(Bytes),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Payload::Binary(b) => Some(b),
            _ => None,
        }
    }
}

/// Typed pagination metadata, read from [`ResponseEnvelope::meta`] on demand
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    /// Any other metadata the server sends
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Canonical success shape `{success, data, meta?}`
///
/// `data` and `meta` keep explicit `null`s: a present `null` is
/// `Some(null)`, an absent field is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ResponseEnvelope<T = Payload> {
    pub success: bool,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Pagination metadata exactly as sent; see [`ResponseEnvelope::page_meta`]
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Fields outside the canonical shape (e.g. `error`, `message`)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A field that is present deserializes to `Some`, even when `null`
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl<T> ResponseEnvelope<T> {
    /// Wrap a bare payload
    pub fn wrap(data: Option<T>) -> Self {
        Self {
            success: true,
            data,
            meta: None,
            extra: Map::new(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResponseEnvelope<U> {
        ResponseEnvelope {
            success: self.success,
            data: self.data.map(f),
            meta: self.meta,
            extra: self.extra,
        }
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Typed view of `meta`; `None` when absent or not shaped like pagination
    pub fn page_meta(&self) -> Option<PageMeta> {
        self.meta
            .as_ref()
            .and_then(|meta| serde_json::from_value(meta.clone()).ok())
    }
}

impl ResponseEnvelope<Payload> {
    /// Deserialize the payload into a concrete type
    pub fn decode<U: DeserializeOwned>(&self) -> Result<U, ApiError> {
        let value = match &self.data {
            Some(Payload::Json(v)) => v.clone(),
            Some(Payload::Text(s)) => Value::String(s.clone()),
            Some(Payload::Binary(_)) => {
                return Err(ApiError::new(
                    ErrorKind::Decode,
                    "binary payload cannot be decoded as structured data",
                ))
            }
            None => Value::Null,
        };

        serde_json::from_value(value)
            .map_err(|e| ApiError::new(ErrorKind::Decode, format!("unexpected payload shape: {}", e)))
    }
}

/// A JSON body, classified by shape
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Has a boolean `success` field; passed through as sent
    Enveloped(ResponseEnvelope<Value>),
    /// Anything else
    Bare(Value),
}

impl From<Value> for Decoded {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mut fields) if fields.get("success").is_some_and(Value::is_boolean) => {
                let success = fields.remove("success").and_then(|v| v.as_bool()).unwrap_or(true);
                let data = fields.remove("data");
                let meta = fields.remove("meta");
                Decoded::Enveloped(ResponseEnvelope {
                    success,
                    data,
                    meta,
                    extra: fields,
                })
            }
            other => Decoded::Bare(other),
        }
    }
}

impl Decoded {
    pub fn into_envelope(self) -> ResponseEnvelope<Payload> {
        match self {
            Decoded::Enveloped(envelope) => envelope.map(Payload::Json),
            Decoded::Bare(value) => ResponseEnvelope::wrap(Some(Payload::Json(value))),
        }
    }
}

/// Transport outcome of one attempt, body fully read
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Turn the response into the call's outcome
    pub fn normalize(self) -> Result<ResponseEnvelope, ApiError> {
        if self.status.is_success() {
            normalize_success(self.content_type(), self.body.clone())
        } else {
            Err(normalize_failure(self.status, &self.headers, &self.body))
        }
    }
}

/// Build the envelope for a 2xx response
pub fn normalize_success(content_type: Option<&str>, body: Bytes) -> Result<ResponseEnvelope, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ResponseEnvelope::wrap(None));
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match mime.as_deref() {
        Some(m) if m == "application/json" || m.ends_with("+json") => {
            let value: Value = serde_json::from_slice(&body).map_err(|e| {
                ApiError::new(ErrorKind::Decode, format!("invalid JSON response body: {}", e))
            })?;
            Ok(Decoded::from(value).into_envelope())
        }
        Some(m) if m.starts_with("text/") => Ok(ResponseEnvelope::wrap(Some(text_or_binary(body)))),
        Some(_) => Ok(ResponseEnvelope::wrap(Some(Payload::Binary(body)))),
        // Undeclared: sniff
        None => match serde_json::from_slice::<Value>(&body) {
            Ok(value) => Ok(Decoded::from(value).into_envelope()),
            Err(_) => Ok(ResponseEnvelope::wrap(Some(text_or_binary(body)))),
        },
    }
}

fn text_or_binary(body: Bytes) -> Payload {
    match String::from_utf8(body.to_vec()) {
        Ok(text) => Payload::Text(text),
        Err(_) => Payload::Binary(body),
    }
}

/// Build the error for a non-2xx response
pub fn normalize_failure(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> ApiError {
    ApiError::from_response(status, headers, body)
}
