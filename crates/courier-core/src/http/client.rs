//! Request facade
//!
//! [`ApiClient`] is the single chokepoint for network calls. One call runs
//! strictly in order: URL build, timeout-wrapped attempt, at most one auth
//! replay, retries, normalization.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::auth::{
    AuthInterceptor, AuthSession, CredentialStore, EndpointTokenRefresher, InMemoryCredentialStore,
    NoopSessionHandler, SessionHandler, TokenRefresher,
};
use super::builder::{build_url, parse_header, request_headers, FormSpec, QueryParams, RequestBody};
use super::error::ApiError;
use super::normalizer::{normalize_failure, normalize_success, RawResponse, ResponseEnvelope};
use super::retry::execute_with_retry;
use super::timeout::run_attempt;
use crate::config::{BaseUrl, ClientConfig};
use crate::endpoints::{self, Endpoint};
use crate::Result;

/// Header carrying the per-call correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Health probe timeout
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything needed to perform one call
#[derive(Debug)]
pub struct RequestSpec {
    method: Method,
    path: String,
    query: QueryParams,
    body: RequestBody,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    requires_auth: bool,
    cancellation: Option<CancellationToken>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::new(),
            body: RequestBody::Empty,
            headers: Vec::new(),
            timeout: None,
            max_retries: None,
            requires_auth: true,
            cancellation: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Target a catalog endpoint, filling its path parameters
    pub fn endpoint(method: Method, endpoint: &Endpoint, params: &[(&str, &str)]) -> Result<Self> {
        Ok(Self::new(method, endpoint.path(params)?))
    }

    pub fn query(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.query.insert(key, value);
        self
    }

    pub fn query_opt<V: fmt::Display>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.query.insert_opt(key, value);
        self
    }

    pub fn query_params(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: impl Into<Value>) -> Self {
        self.body = RequestBody::Json(body.into());
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self
    }

    pub fn multipart(mut self, form: FormSpec) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    /// Single-use body; disables retries and auth replay
    pub fn stream(mut self, body: impl Into<reqwest::Body>) -> Self {
        self.body = RequestBody::stream(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn no_auth(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    credentials: Option<Arc<dyn CredentialStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    session_handler: Option<Arc<dyn SessionHandler>>,
    http: Option<reqwest::Client>,
}

impl ApiClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn session_handler(mut self, handler: Arc<dyn SessionHandler>) -> Self {
        self.session_handler = Some(handler);
        self
    }

    /// Use a preconfigured transport (proxies, custom TLS roots)
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .connect_timeout(config.timeouts.connect_timeout)
                .user_agent(config.user_agent.clone())
                .build()?,
        };

        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let (name, value) = parse_header(name, value)?;
            default_headers.insert(name, value);
        }

        let base_url = BaseUrl::new(config.base_url.clone());
        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(EndpointTokenRefresher::new(http.clone(), base_url.clone()))
        });
        let store = self
            .credentials
            .unwrap_or_else(|| Arc::new(InMemoryCredentialStore::new()));
        let session_handler = self
            .session_handler
            .unwrap_or_else(|| Arc::new(NoopSessionHandler));

        debug!(base_url = %config.base_url, environment = %config.environment, "API client created");

        Ok(ApiClient {
            inner: Arc::new(Inner {
                http,
                auth: AuthInterceptor::new(store, Some(refresher), session_handler),
                base_url,
                default_headers,
                config,
            }),
        })
    }
}

struct Inner {
    http: reqwest::Client,
    config: ClientConfig,
    base_url: BaseUrl,
    default_headers: HeaderMap,
    auth: AuthInterceptor,
}

/// Resilient API client; cheap to clone
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.get())
            .field("environment", &self.inner.config.environment)
            .field("auth", &self.inner.auth)
            .finish()
    }
}

/// Per-call values shared by every attempt
struct CallContext<'a> {
    spec: &'a RequestSpec,
    url: Url,
    headers: HeaderMap,
    session: AuthSession,
    timeout: Duration,
    cancel: CancellationToken,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Client for `config` with an in-memory credential store
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        self.inner.auth.store()
    }

    pub fn base_url(&self) -> String {
        self.inner.base_url.get()
    }

    /// Replace the base address for subsequent calls
    pub fn set_base_url(&self, base_url: impl Into<String>) -> Result<()> {
        let base_url = base_url.into();
        build_url(&base_url, "", &QueryParams::new())?;
        info!(%base_url, "Base URL overridden");
        self.inner.base_url.set(base_url);
        Ok(())
    }

    /// Run one call through the full pipeline
    pub async fn execute(&self, spec: RequestSpec) -> std::result::Result<ResponseEnvelope, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "api_request",
            method = %spec.method,
            path = %spec.path,
            request_id = %request_id
        );

        self.execute_inner(spec, request_id).instrument(span).await
    }

    async fn execute_inner(
        &self,
        spec: RequestSpec,
        request_id: String,
    ) -> std::result::Result<ResponseEnvelope, ApiError> {
        let started = Instant::now();

        let url = build_url(&self.inner.base_url.get(), &spec.path, &spec.query)?;
        let headers = self.headers_for(&spec, &request_id)?;
        let session = self.inner.auth.begin(spec.requires_auth)?;

        let mut policy = self.inner.config.retry.clone();
        if let Some(max_retries) = spec.max_retries {
            policy.max_retries = max_retries;
        }
        if !spec.body.is_replayable() {
            policy.max_retries = 0;
        }

        let ctx = CallContext {
            spec: &spec,
            url,
            headers,
            session,
            timeout: spec.timeout.unwrap_or(self.inner.config.timeouts.request_timeout),
            cancel: spec.cancellation.clone().unwrap_or_else(CancellationToken::new),
        };

        let ctx = &ctx;
        let outcome =
            execute_with_retry(move || self.attempt_with_auth(ctx), &policy, &ctx.cancel).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome.and_then(|raw| {
            let status = raw.status;
            let content_type = raw.content_type().map(str::to_string);
            normalize_success(content_type.as_deref(), raw.body).map(|envelope| (status, envelope))
        }) {
            Ok((status, envelope)) => {
                info!(status = status.as_u16(), elapsed_ms, "Request completed");
                Ok(envelope)
            }
            Err(error) => {
                warn!(
                    kind = %error.kind,
                    status = error.status,
                    elapsed_ms,
                    "Request failed: {}",
                    error.message
                );
                Err(error)
            }
        }
    }

    /// One attempt, plus the single replay after a successful refresh
    async fn attempt_with_auth(
        &self,
        ctx: &CallContext<'_>,
    ) -> std::result::Result<RawResponse, ApiError> {
        let raw = self.send_once(ctx).await?;
        if raw.status != StatusCode::UNAUTHORIZED {
            return into_result(raw);
        }

        let rejected = normalize_failure(raw.status, &raw.headers, &raw.body);
        if !ctx.spec.body.is_replayable() {
            return Err(rejected);
        }

        let replay = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(ApiError::cancelled()),
            replay = self.inner.auth.handle_unauthorized(&ctx.session) => replay,
        };
        if !replay {
            return Err(rejected);
        }

        into_result(self.send_once(ctx).await?)
    }

    async fn send_once(&self, ctx: &CallContext<'_>) -> std::result::Result<RawResponse, ApiError> {
        let mut request = self
            .inner
            .http
            .request(ctx.spec.method.clone(), ctx.url.clone())
            .headers(ctx.headers.clone());
        if let Some(token) = ctx.session.token() {
            request = request.bearer_auth(token);
        }
        let request = ctx.spec.body.apply(request)?;

        let raw = run_attempt(
            async move {
                let response = request.send().await.map_err(ApiError::from_transport)?;
                let status = response.status();
                let headers = response.headers().clone();
                let body = response.bytes().await.map_err(ApiError::from_transport)?;
                Ok(RawResponse {
                    status,
                    headers,
                    body,
                })
            },
            ctx.timeout,
            &ctx.cancel,
        )
        .await?;

        debug!(status = raw.status.as_u16(), bytes = raw.body.len(), "Attempt finished");
        Ok(raw)
    }

    fn headers_for(&self, spec: &RequestSpec, request_id: &str) -> Result<HeaderMap> {
        let mut overrides = self.inner.default_headers.clone();
        for (name, value) in &spec.headers {
            let (name, value) = parse_header(name, value)?;
            overrides.insert(name, value);
        }
        // Bearer credentials come from the credential store only
        overrides.remove(AUTHORIZATION);

        let mut headers = request_headers(&spec.body, &overrides);
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(REQUEST_ID_HEADER, value);
        }
        Ok(headers)
    }

    pub async fn get(&self, path: &str, query: QueryParams) -> std::result::Result<ResponseEnvelope, ApiError> {
        self.execute(RequestSpec::get(path).query_params(query)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> std::result::Result<ResponseEnvelope, ApiError> {
        self.execute(RequestSpec::post(path).json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> std::result::Result<ResponseEnvelope, ApiError> {
        self.execute(RequestSpec::put(path).json(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> std::result::Result<ResponseEnvelope, ApiError> {
        self.execute(RequestSpec::patch(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> std::result::Result<ResponseEnvelope, ApiError> {
        self.execute(RequestSpec::delete(path)).await
    }

    /// GET a catalog endpoint by logical name
    pub async fn call(
        &self,
        name: &str,
        params: &[(&str, &str)],
    ) -> std::result::Result<ResponseEnvelope, ApiError> {
        let endpoint = endpoints::lookup(name)?;
        self.execute(RequestSpec::endpoint(Method::GET, endpoint, params)?)
            .await
    }

    /// Reachability probe: no auth, short timeout, one retry
    pub async fn health(&self) -> std::result::Result<ResponseEnvelope, ApiError> {
        let endpoint = endpoints::lookup("system.health")?;
        let spec = RequestSpec::endpoint(Method::GET, endpoint, &[])?
            .no_auth()
            .timeout(HEALTH_TIMEOUT)
            .max_retries(1);
        self.execute(spec).await
    }

    pub async fn is_healthy(&self) -> bool {
        match self.health().await {
            Ok(envelope) => envelope.success,
            Err(error) => {
                debug!(kind = %error.kind, "Health probe failed");
                false
            }
        }
    }
}

fn into_result(raw: RawResponse) -> std::result::Result<RawResponse, ApiError> {
    if raw.status.is_success() {
        Ok(raw)
    } else {
        Err(normalize_failure(raw.status, &raw.headers, &raw.body))
    }
}
