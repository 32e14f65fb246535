//! Low-level HTTP client for a Supabase project

use crate::config::ClientConfig;
use crate::endpoints::{AuthApi, RestApi, StorageApi};
use crate::error::{ApiError, ApiResult};
use crate::gateway::Session;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

/// Request correlation ID header
const X_REQUEST_ID: &str = "X-Request-ID";

/// API key header for Supabase
const APIKEY_HEADER: &str = "apikey";

/// Supabase HTTP client
///
/// Adds the `apikey` header, the bearer token of the current session (or the
/// anon key when signed out), and a request correlation id to every call.
/// Calls are made once; failures are returned to the caller as-is.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Client,
    config: Arc<ClientConfig>,
    session: Arc<watch::Sender<Option<Session>>>,
}

impl SupabaseClient {
    /// Create a new client with configuration from environment
    pub fn new() -> ApiResult<Self> {
        let config = ClientConfig::from_env()?;
        Self::with_config(config)
    }

    /// Create a new client with specific configuration
    pub fn with_config(config: ClientConfig) -> ApiResult<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("sow-field/", env!("CARGO_PKG_VERSION"))),
        );
        let key = HeaderValue::from_str(&config.anon_key)
            .map_err(|_| ApiError::config("anon_key is not a valid header value"))?;
        default_headers.insert(APIKEY_HEADER, key);

        let inner = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(ApiError::Request)?;

        let (session, _) = watch::channel(None);

        Ok(Self {
            inner,
            config: Arc::new(config),
            session: Arc::new(session),
        })
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// PostgREST tables, views and RPC
    #[must_use]
    pub fn rest(&self) -> RestApi {
        RestApi::new(self.clone())
    }

    /// Storage buckets
    #[must_use]
    pub fn storage(&self) -> StorageApi {
        StorageApi::new(self.clone())
    }

    /// GoTrue auth
    #[must_use]
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Current in-memory session
    pub fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    /// Replace the session and notify watchers
    pub fn set_session(&self, session: Option<Session>) {
        self.session.send_replace(session);
    }

    /// Watch session changes
    pub fn watch_session(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    /// Token used for `Authorization: Bearer`
    pub fn bearer_token(&self) -> String {
        self.current_session()
            .map(|s| s.access_token)
            .or_else(|| self.config.access_token.clone())
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    /// Build a request with auth and correlation headers
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.request_as(method, url, &self.bearer_token())
    }

    /// Build a request authorized with an explicit token
    pub fn request_as(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.inner
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(X_REQUEST_ID, Uuid::new_v4().to_string())
    }

    /// Send and decode a JSON response. An empty body decodes as `null`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.send(request).await?;
        let body = response.text().await?;
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        Ok(serde_json::from_str(body)?)
    }

    /// Send and discard the response body.
    pub async fn send_empty(&self, request: RequestBuilder) -> ApiResult<()> {
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let request = request.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let start = Instant::now();
        let response = self.inner.execute(request).await.map_err(|e| {
            warn!(%method, %path, error = %e, "Request failed");
            ApiError::Request(e)
        })?;
        let elapsed = start.elapsed();

        let status = response.status();
        debug!(
            %method,
            %path,
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_body(status.as_u16(), &body);
        warn!(%method, %path, status = status.as_u16(), error = %err, "Backend rejected request");
        Err(err)
    }
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("url", &self.config.supabase_url)
            .field("signed_in", &self.session.borrow().is_some())
            .finish()
    }
}
