//! Shared test support utilities for integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use courier_core::http::{AuthCredential, InMemoryCredentialStore, SessionHandler};
use courier_core::{ApiClient, ClientConfig, RetryPolicy, TimeoutConfig};
use wiremock::MockServer;

pub const ACCESS_TOKEN: &str = "access-old";
pub const REFRESHED_TOKEN: &str = "access-new";
pub const REFRESH_TOKEN: &str = "refresh-1";

/// Retry policy with delays short enough for tests
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries)
        .with_base_delay(Duration::from_millis(20))
        .with_max_delay(Duration::from_millis(200))
}

pub fn config_for(server: &MockServer, max_retries: u32) -> ClientConfig {
    ClientConfig::default()
        .with_base_url(server.uri())
        .with_timeouts(TimeoutConfig::new(
            Duration::from_millis(500),
            Duration::from_secs(2),
        ))
        .with_retry(fast_retry(max_retries))
}

/// Records how many times the session was expired
#[derive(Debug, Default)]
pub struct CountingSessionHandler {
    expired: AtomicUsize,
}

impl CountingSessionHandler {
    pub fn count(&self) -> usize {
        self.expired.load(Ordering::SeqCst)
    }
}

impl SessionHandler for CountingSessionHandler {
    fn on_session_expired(&self) {
        self.expired.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub client: ApiClient,
    pub store: Arc<InMemoryCredentialStore>,
    pub sessions: Arc<CountingSessionHandler>,
}

/// Client against `server` holding the standard test credential
pub fn harness(server: &MockServer, max_retries: u32) -> Harness {
    let store = Arc::new(InMemoryCredentialStore::with_credential(
        AuthCredential::new(ACCESS_TOKEN).with_refresh_token(REFRESH_TOKEN),
    ));
    build(server, max_retries, store)
}

/// Client against `server` with an empty credential store
pub fn anonymous(server: &MockServer, max_retries: u32) -> Harness {
    build(server, max_retries, Arc::new(InMemoryCredentialStore::new()))
}

fn build(server: &MockServer, max_retries: u32, store: Arc<InMemoryCredentialStore>) -> Harness {
    let sessions = Arc::new(CountingSessionHandler::default());
    let client = ApiClient::builder()
        .config(config_for(server, max_retries))
        .credentials(store.clone())
        .session_handler(sessions.clone())
        .build()
        .expect("client");

    Harness {
        client,
        store,
        sessions,
    }
}

/// Number of requests the server saw for `path`
pub async fn hits(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .expect("request recording enabled")
        .iter()
        .filter(|r| r.url.path() == path)
        .count()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
