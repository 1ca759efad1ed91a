//! Courier Core - resilient request pipeline for the Courier admin API
//!
//! Every network call goes through [`ApiClient`], which builds the URL,
//! bounds each attempt by a timeout and the caller's cancellation token,
//! retries transient failures with exponential backoff, refreshes an
//! expired access token once and replays, and normalizes the outcome into
//! a [`ResponseEnvelope`] or an [`ApiError`].
//!
//! # Main Components
//!
//! - **Endpoints**: the catalog of logical endpoint names and path templates
//! - **Configuration**: environment-aware base address resolution
//! - **HTTP pipeline**: timeout, retry, auth and normalization layers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use courier_core::{ApiClient, AuthCredential, ClientConfig, InMemoryCredentialStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryCredentialStore::with_credential(
//!     AuthCredential::new("access").with_refresh_token("refresh"),
//! ));
//! let client = ApiClient::builder()
//!     .config(ClientConfig::from_env()?)
//!     .credentials(store)
//!     .build()?;
//!
//! let providers = client.call("providers.list", &[]).await?;
//! println!("{:?}", providers.data);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;

pub use config::{resolve_base_url, ClientConfig, Environment};
pub use endpoints::{Domain, Endpoint, CATALOG};
pub use error::{Error, Result};
pub use http::{
    ApiClient, ApiError, AuthCredential, CancellationToken, CredentialStore, ErrorKind,
    InMemoryCredentialStore, Payload, QueryParams, RequestSpec, ResponseEnvelope, RetryPolicy,
    SessionHandler, TimeoutConfig, TokenRefresher,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
