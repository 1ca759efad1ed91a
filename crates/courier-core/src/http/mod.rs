//! The request pipeline
//!
//! - URL and request construction ([`builder`])
//! - Per-attempt timeout and cancellation ([`timeout`])
//! - Exponential-backoff retry ([`retry`])
//! - Bearer auth with refresh-and-replay ([`auth`])
//! - Response and error normalization ([`normalizer`], [`error`])
//! - The [`ApiClient`] facade tying them together ([`client`])

pub mod auth;
pub mod builder;
pub mod client;
pub mod error;
pub mod normalizer;
pub mod retry;
pub mod timeout;

pub use auth::{
    AuthCredential, AuthInterceptor, AuthPhase, AuthSession, CredentialStore,
    EndpointTokenRefresher, InMemoryCredentialStore, NoopSessionHandler, SessionHandler,
    TokenRefresher,
};
pub use builder::{build_url, FormPart, FormSpec, QueryParams, RequestBody};
pub use client::{ApiClient, ApiClientBuilder, RequestSpec, REQUEST_ID_HEADER};
pub use error::{ApiError, ErrorKind};
pub use normalizer::{Decoded, PageMeta, Payload, RawResponse, ResponseEnvelope};
pub use retry::{execute_with_retry, RetryDecision, RetryHandler, RetryPolicy};
pub use timeout::{cancellable_sleep, run_attempt, TimeoutConfig};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
pub use tokio_util::sync::CancellationToken;
