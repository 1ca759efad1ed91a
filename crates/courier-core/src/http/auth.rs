//! Bearer authentication, token refresh and replay
//!
//! A call that needs auth and finds no stored token fails before touching
//! the network. A 401 triggers at most one refresh per call; a 401 on the
//! replay is terminal. Concurrent calls rejected with the same token share
//! a single in-flight refresh.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::{ApiError, ErrorKind};
use crate::config::BaseUrl;
use crate::endpoints;

/// Access token plus the longer-lived refresh token
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl AuthCredential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

impl fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCredential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Token storage shared by every call of a client
///
/// Implementations must swap credentials atomically: a reader sees either
/// the old or the new token, never a mix.
pub trait CredentialStore: Send + Sync {
    fn credential(&self) -> Option<AuthCredential>;

    fn set_credential(&self, credential: AuthCredential);

    /// Replace the access token, keeping the refresh token
    fn set_access_token(&self, access_token: String);

    fn clear(&self);

    fn access_token(&self) -> Option<String> {
        self.credential().map(|c| c.access_token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.credential().and_then(|c| c.refresh_token)
    }
}

/// Process-local credential store
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Option<AuthCredential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: AuthCredential) -> Self {
        Self {
            inner: RwLock::new(Some(credential)),
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn credential(&self) -> Option<AuthCredential> {
        self.inner.read().clone()
    }

    fn set_credential(&self, credential: AuthCredential) {
        *self.inner.write() = Some(credential);
    }

    fn set_access_token(&self, access_token: String) {
        let mut guard = self.inner.write();
        let refresh_token = guard.take().and_then(|c| c.refresh_token);
        *guard = Some(AuthCredential {
            access_token,
            refresh_token,
        });
    }

    fn clear(&self) {
        *self.inner.write() = None;
    }
}

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// `Ok(None)` means the server answered but issued no token
    async fn refresh(&self, refresh_token: &str) -> Result<Option<String>, ApiError>;
}

/// Refreshes through the `auth.refresh` endpoint of the API itself
#[derive(Debug, Clone)]
pub struct EndpointTokenRefresher {
    http: reqwest::Client,
    base_url: BaseUrl,
    timeout: Duration,
}

impl EndpointTokenRefresher {
    pub fn new(http: reqwest::Client, base_url: BaseUrl) -> Self {
        Self {
            http,
            base_url,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TokenRefresher for EndpointTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<Option<String>, ApiError> {
        let path = endpoints::lookup("auth.refresh")?.path(&[])?;
        let url = super::builder::build_url(&self.base_url.get(), &path, &Default::default())?;

        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(ApiError::from_transport)?;

        if !status.is_success() {
            return Err(ApiError::from_response(status, &headers, &body));
        }

        let value: Value = serde_json::from_slice(&body).map_err(|e| {
            ApiError::new(ErrorKind::Decode, format!("unreadable refresh response: {}", e))
        })?;

        Ok(extract_access_token(&value))
    }
}

/// Find the new access token in an enveloped or bare refresh response
fn extract_access_token(value: &Value) -> Option<String> {
    const KEYS: [&str; 3] = ["accessToken", "access_token", "token"];

    let scopes = [value.get("data"), Some(value)];
    scopes
        .into_iter()
        .flatten()
        .flat_map(|scope| KEYS.iter().filter_map(move |k| scope.get(*k)))
        .filter_map(Value::as_str)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// Reacts to an unrecoverable authentication failure
pub trait SessionHandler: Send + Sync {
    /// Credentials are already cleared; send the user back to sign-in
    fn on_session_expired(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionHandler;

impl SessionHandler for NoopSessionHandler {
    fn on_session_expired(&self) {
        info!("Session expired; sign-in required");
    }
}

/// Where a call is in the authentication state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Attempt,
    Refreshing,
    Replaying,
    LoggedOut,
}

/// Authentication state of one call
#[derive(Debug)]
pub struct AuthSession {
    requires_auth: bool,
    state: Mutex<(AuthPhase, Option<String>)>,
}

impl AuthSession {
    /// Token to attach as a bearer credential, if any
    pub fn token(&self) -> Option<String> {
        self.state.lock().1.clone()
    }

    pub fn phase(&self) -> AuthPhase {
        self.state.lock().0
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    fn set(&self, phase: AuthPhase, token: Option<String>) {
        *self.state.lock() = (phase, token);
    }
}

type RefreshFuture = Shared<BoxFuture<'static, Option<String>>>;

/// Applies bearer tokens and coordinates refreshes across calls
#[derive(Clone)]
pub struct AuthInterceptor {
    store: Arc<dyn CredentialStore>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    session_handler: Arc<dyn SessionHandler>,
    in_flight: Arc<Mutex<Option<RefreshFuture>>>,
}

impl fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInterceptor")
            .field("has_refresher", &self.refresher.is_some())
            .field("refresh_in_flight", &self.in_flight.lock().is_some())
            .finish()
    }
}

impl AuthInterceptor {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Option<Arc<dyn TokenRefresher>>,
        session_handler: Arc<dyn SessionHandler>,
    ) -> Self {
        Self {
            store,
            refresher,
            session_handler,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Start a call, failing fast when auth is required but no token exists
    pub fn begin(&self, requires_auth: bool) -> Result<AuthSession, ApiError> {
        let token = if requires_auth {
            Some(self.store.access_token().ok_or_else(ApiError::missing_credential)?)
        } else {
            None
        };

        Ok(AuthSession {
            requires_auth,
            state: Mutex::new((AuthPhase::Attempt, token)),
        })
    }

    /// React to a 401; `true` means replay with the session's new token
    pub async fn handle_unauthorized(&self, session: &AuthSession) -> bool {
        let stale = {
            let state = session.state.lock();
            if !session.requires_auth || state.0 != AuthPhase::Attempt {
                return false;
            }
            state.1.clone().unwrap_or_default()
        };

        session.set(AuthPhase::Refreshing, None);
        match self.fresh_token(&stale).await {
            Some(token) => {
                debug!("Replaying request with refreshed token");
                session.set(AuthPhase::Replaying, Some(token));
                true
            }
            None => {
                session.set(AuthPhase::LoggedOut, None);
                false
            }
        }
    }

    /// A token newer than `stale`, refreshing only if nobody else has
    async fn fresh_token(&self, stale: &str) -> Option<String> {
        let refresh = {
            let mut slot = self.in_flight.lock();
            match self.store.access_token() {
                Some(current) if current != stale => return Some(current),
                None if slot.is_none() => return None,
                _ => {}
            }
            match slot.as_ref() {
                Some(shared) => shared.clone(),
                None => {
                    let shared = self.start_refresh();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };

        let token = refresh.await;

        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|s| s.peek().is_some()) {
            *slot = None;
        }
        token
    }

    fn start_refresh(&self) -> RefreshFuture {
        let store = self.store.clone();
        let refresher = self.refresher.clone();
        let session_handler = self.session_handler.clone();

        async move {
            let outcome = match (refresher, store.refresh_token()) {
                (Some(refresher), Some(refresh_token)) => refresher.refresh(&refresh_token).await,
                (None, _) => Ok(None),
                (_, None) => {
                    debug!("No refresh token stored");
                    Ok(None)
                }
            };

            match outcome {
                Ok(Some(token)) if !token.is_empty() => {
                    info!("Access token refreshed");
                    store.set_access_token(token.clone());
                    Some(token)
                }
                Ok(_) => {
                    warn!("Token refresh yielded no access token; clearing session");
                    store.clear();
                    session_handler.on_session_expired();
                    None
                }
                Err(e) => {
                    warn!(kind = %e.kind, "Token refresh failed; clearing session: {}", e.message);
                    store.clear();
                    session_handler.on_session_expired();
                    None
                }
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: AtomicUsize,
        token: Option<&'static str>,
        delay: Duration,
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, _refresh_token: &str) -> Result<Option<String>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.token.map(str::to_string))
        }
    }

    #[derive(Default)]
    struct CountingSession(AtomicUsize);

    impl SessionHandler for CountingSession {
        fn on_session_expired(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup(
        token: Option<&'static str>,
    ) -> (AuthInterceptor, Arc<CountingRefresher>, Arc<CountingSession>) {
        let store = Arc::new(InMemoryCredentialStore::with_credential(
            AuthCredential::new("old").with_refresh_token("refresh"),
        ));
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            token,
            delay: Duration::from_millis(20),
        });
        let session = Arc::new(CountingSession::default());
        let interceptor = AuthInterceptor::new(store, Some(refresher.clone()), session.clone());
        (interceptor, refresher, session)
    }

    #[test]
    fn test_missing_credential() {
        let interceptor = AuthInterceptor::new(
            Arc::new(InMemoryCredentialStore::new()),
            None,
            Arc::new(NoopSessionHandler),
        );
        let err = interceptor.begin(true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingCredential);

        let session = interceptor.begin(false).unwrap();
        assert_eq!(session.token(), None);
    }

    #[test]
    fn test_set_access_token_keeps_refresh_token() {
        let store = InMemoryCredentialStore::with_credential(
            AuthCredential::new("a").with_refresh_token("r"),
        );
        store.set_access_token("b".to_string());
        assert_eq!(store.access_token().as_deref(), Some("b"));
        assert_eq!(store.refresh_token().as_deref(), Some("r"));

        store.clear();
        assert!(store.credential().is_none());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = AuthCredential::new("secret-token").with_refresh_token("secret-refresh");
        let shown = format!("{:?}", cred);
        assert!(!shown.contains("secret"));
    }

    #[test]
    fn test_extract_access_token() {
        assert_eq!(
            extract_access_token(&json!({"success": true, "data": {"accessToken": "a1"}})),
            Some("a1".to_string())
        );
        assert_eq!(
            extract_access_token(&json!({"access_token": "b2"})),
            Some("b2".to_string())
        );
        assert_eq!(extract_access_token(&json!({"token": ""})), None);
        assert_eq!(extract_access_token(&json!({"ok": true})), None);
    }

    #[tokio::test]
    async fn test_refresh_then_replay_once() {
        let (interceptor, refresher, session_handler) = setup(Some("new"));
        let session = interceptor.begin(true).unwrap();
        assert_eq!(session.token().as_deref(), Some("old"));

        assert!(interceptor.handle_unauthorized(&session).await);
        assert_eq!(session.phase(), AuthPhase::Replaying);
        assert_eq!(session.token().as_deref(), Some("new"));
        assert_eq!(interceptor.store().access_token().as_deref(), Some("new"));

        // second rejection in the same call is terminal
        assert!(!interceptor.handle_unauthorized(&session).await);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session_handler.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_logs_out() {
        let (interceptor, refresher, session_handler) = setup(None);
        let session = interceptor.begin(true).unwrap();

        assert!(!interceptor.handle_unauthorized(&session).await);
        assert_eq!(session.phase(), AuthPhase::LoggedOut);
        assert!(interceptor.store().credential().is_none());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session_handler.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_auth_calls_never_refresh() {
        let (interceptor, refresher, _) = setup(Some("new"));
        let session = interceptor.begin(false).unwrap();
        assert!(!interceptor.handle_unauthorized(&session).await);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_rejections_share_one_refresh() {
        let (interceptor, refresher, _) = setup(Some("new"));

        let sessions: Vec<_> = (0..5).map(|_| interceptor.begin(true).unwrap()).collect();
        let outcomes =
            futures::future::join_all(sessions.iter().map(|s| interceptor.handle_unauthorized(s)))
                .await;

        assert!(outcomes.into_iter().all(|replay| replay));
        assert!(sessions.iter().all(|s| s.token().as_deref() == Some("new")));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_token_uses_current_without_refresh() {
        let (interceptor, refresher, _) = setup(Some("new"));
        let session = interceptor.begin(true).unwrap();

        // another call refreshed in the meantime
        interceptor.store().set_access_token("rotated".to_string());

        assert!(interceptor.handle_unauthorized(&session).await);
        assert_eq!(session.token().as_deref(), Some("rotated"));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }
}
