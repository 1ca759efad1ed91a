//! Request construction: URLs, query strings, headers and bodies
//!
//! Query parameters keep insertion order and drop absent or empty values,
//! so optional filters can be passed straight through without the caller
//! pruning them first.

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde_json::Value;
use std::fmt::Display;

use super::error::ApiError;
use crate::{Error, Result};

/// Ordered query parameters where absent or empty values are skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, Option<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing an earlier value for the same key in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Display) -> &mut Self {
        self.set(key.into(), Some(value.to_string()))
    }

    /// Set a parameter that may be absent
    pub fn insert_opt<V: Display>(&mut self, key: impl Into<String>, value: Option<V>) -> &mut Self {
        self.set(key.into(), value.map(|v| v.to_string()))
    }

    /// Builder-style [`QueryParams::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style [`QueryParams::insert_opt`]
    pub fn with_opt<V: Display>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.insert_opt(key, value);
        self
    }

    fn set(&mut self, key: String, value: Option<String>) -> &mut Self {
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
        self
    }

    /// Parameters that will actually be sent
    pub fn present(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().filter_map(|(k, v)| match v.as_deref() {
            Some(v) if !v.is_empty() => Some((k.as_str(), v)),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.set(k.into(), Some(v.into()));
        }
        params
    }
}

/// Join a base address, a path and query parameters into a full URL
///
/// A path that is already an absolute `http(s)` URL is used as-is and the
/// base is ignored. Otherwise the base's trailing slash is dropped and the
/// path gets a leading one, so `("https://h/v1/", "items")` becomes
/// `https://h/v1/items`.
pub fn build_url(base: &str, path: &str, query: &QueryParams) -> Result<Url> {
    let raw = if is_absolute(path) {
        path.to_string()
    } else {
        let base = base.trim_end_matches('/');
        if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    };

    let mut url = Url::parse(&raw).map_err(|e| Error::InvalidUrl {
        input: raw.clone(),
        message: e.to_string(),
        source: Some(e),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl {
            input: raw,
            message: format!("unsupported scheme '{}'", url.scheme()),
            source: None,
        });
    }

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.present());
    }

    Ok(url)
}

fn is_absolute(path: &str) -> bool {
    let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// One field of a multipart form
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: Option<String>,
        mime: Option<String>,
        bytes: Bytes,
    },
}

/// Multipart form description that can be rebuilt for every attempt
#[derive(Debug, Clone, Default)]
pub struct FormSpec {
    parts: Vec<FormPart>,
}

impl FormSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: Some(file_name.into()),
            mime: mime.map(str::to_string),
            bytes: bytes.into(),
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Materialize a fresh `reqwest` form
    pub fn to_form(&self) -> std::result::Result<Form, ApiError> {
        let mut form = Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut p = Part::bytes(bytes.to_vec());
                    if let Some(file_name) = file_name {
                        p = p.file_name(file_name.clone());
                    }
                    if let Some(mime) = mime {
                        p = p.mime_str(mime).map_err(|e| {
                            ApiError::construction(format!("invalid MIME type '{}': {}", mime, e))
                        })?;
                    }
                    form.part(name.clone(), p)
                }
            };
        }
        Ok(form)
    }
}

/// Request payload
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Text(String),
    Multipart(FormSpec),
    /// Single-use streaming body; taken by the first attempt
    Stream(Mutex<Option<reqwest::Body>>),
}

impl RequestBody {
    pub fn stream(body: impl Into<reqwest::Body>) -> Self {
        RequestBody::Stream(Mutex::new(Some(body.into())))
    }

    /// Whether the same body can be sent again on a retry or replay
    pub fn is_replayable(&self) -> bool {
        !matches!(self, RequestBody::Stream(_))
    }

    /// Content type implied by the body; `None` leaves it to the transport
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Empty | RequestBody::Json(_) => Some("application/json"),
            RequestBody::Text(_) => Some("text/plain; charset=utf-8"),
            RequestBody::Multipart(_) | RequestBody::Stream(_) => None,
        }
    }

    /// Attach this body to an outgoing request
    pub(crate) fn apply(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> std::result::Result<reqwest::RequestBuilder, ApiError> {
        Ok(match self {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => {
                let bytes = serde_json::to_vec(value).map_err(|e| {
                    ApiError::construction(format!("failed to serialize body: {}", e))
                })?;
                builder.body(bytes)
            }
            RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::Multipart(spec) => builder.multipart(spec.to_form()?),
            RequestBody::Stream(slot) => {
                let body = slot.lock().take().ok_or_else(|| {
                    ApiError::construction("streaming body was already consumed")
                })?;
                builder.body(body)
            }
        })
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<FormSpec> for RequestBody {
    fn from(form: FormSpec) -> Self {
        RequestBody::Multipart(form)
    }
}

/// Default headers for a body, overlaid with caller headers
///
/// Caller headers win. Multipart and streaming bodies never get an
/// explicit content type so the transport can set the boundary.
pub fn request_headers(body: &RequestBody, overrides: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(ct) = body.content_type() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
    }

    for (name, value) in overrides {
        headers.insert(name.clone(), value.clone());
    }

    if body.content_type().is_none() {
        headers.remove(CONTENT_TYPE);
    }

    headers
}

/// Parse a `(name, value)` pair into typed header parts
pub fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| Error::configuration(format!("invalid header name '{}': {}", name, e)))?;
    let header_value = HeaderValue::from_str(value.trim())
        .map_err(|e| Error::configuration(format!("invalid value for header '{}': {}", name, e)))?;
    Ok((header_name, header_value))
}
