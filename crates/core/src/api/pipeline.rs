//! Request pipeline
//!
//! Attaches the stored access token, sends the request, and on a 401 from a
//! protected endpoint obtains a new token from the [`RefreshCoordinator`] and
//! replays the request once. Every failure leaves as a normalized
//! [`ApiError`].

use std::sync::Arc;
use std::time::Duration;

use quire_domain::constants::{LOGIN_ENDPOINT, REFRESH_ENDPOINT};
use quire_domain::ApiResult;
use serde_json::Value;
use tracing::{debug, warn};

use super::normalizer::{normalize, RawError};
use super::ports::{HttpMethod, Transport, TransportRequest, TransportResponse};
use super::refresh::RefreshCoordinator;
use crate::auth::ports::TokenStore;
use crate::cache::key::url_path;

/// A call as issued by the client facade
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the base URL, or an absolute URL
    pub url: String,
    pub params: Option<Value>,
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Request without params or body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), params: None, body: None }
    }

    /// Set query parameters.
    #[must_use]
    pub fn with_params(mut self, params: Option<Value>) -> Self {
        self.params = params;
        self
    }

    /// Set the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    /// Login and refresh never trigger a token refresh on 401.
    pub fn is_auth_endpoint(&self) -> bool {
        let path = url_path(&self.url);
        path == LOGIN_ENDPOINT || path == REFRESH_ENDPOINT
    }
}

/// Authenticated request execution shared by the client facade
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    refresh: Arc<RefreshCoordinator>,
    base_url: String,
    timeout: Duration,
}

impl Pipeline {
    /// Create a pipeline and its refresh coordinator for `base_url`.
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let refresh = Arc::new(RefreshCoordinator::new(
            transport.clone(),
            tokens.clone(),
            &base_url,
            timeout,
        ));
        Self { transport, tokens, refresh, base_url, timeout }
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token store used for bearer tokens
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Coordinator shared by every request of this pipeline
    pub fn refresh_coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.refresh
    }

    /// Run a request to completion, refreshing the session at most once.
    ///
    /// A 401 on the replay means the session can't be recovered: stored
    /// tokens are cleared before the error is returned.
    pub async fn execute(&self, request: &ApiRequest) -> ApiResult<Value> {
        // Captured before the token read; a refresh finishing during the read
        // must count as newer than the token this request sends.
        let generation = self.refresh.generation();
        let token = self.access_token().await;

        let raw = match self.dispatch(request, token.as_deref()).await {
            Ok(data) => return Ok(data),
            Err(raw) => raw,
        };

        if !should_refresh(request, &raw) {
            return Err(self.fail(request, &raw));
        }

        debug!(method = %request.method, url = %request.url, "access token rejected; recovering session");
        let token = self.refresh.recover(generation).await?;

        match self.dispatch(request, Some(&token)).await {
            Ok(data) => Ok(data),
            Err(raw) => {
                if raw.status() == Some(401) {
                    self.expire_session().await;
                }
                Err(self.fail(request, &raw))
            }
        }
    }

    async fn expire_session(&self) {
        warn!("refreshed token rejected; clearing session");
        if let Err(e) = self.tokens.clear_tokens().await {
            warn!(error = %e, "failed to clear tokens");
        }
    }

    async fn access_token(&self) -> Option<String> {
        match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "failed to read access token; sending request unauthenticated");
                None
            }
        }
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Value, RawError> {
        let mut outbound =
            TransportRequest::json(request.method, self.absolute_url(&request.url), self.timeout)
                .with_query(request.params.clone())
                .with_body(request.body.clone());
        if let Some(token) = token {
            outbound = outbound.with_bearer(token);
        }

        debug!(method = %request.method, url = %outbound.url, "sending request");
        let response = self.transport.send(outbound).await.map_err(RawError::from)?;
        debug!(method = %request.method, url = %request.url, status = response.status, "received response");

        if response.is_success() {
            Ok(response_data(&response))
        } else {
            Err(RawError::from_response(&response))
        }
    }

    fn fail(&self, request: &ApiRequest, raw: &RawError) -> quire_domain::ApiError {
        let error = normalize(raw);
        warn!(
            method = %request.method,
            url = %request.url,
            status = error.status_code,
            network = error.is_network_error,
            "request failed: {}",
            error.message
        );
        error
    }

    fn absolute_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A 401 from a protected endpoint. Only the first dispatch is checked; the
/// replay never refreshes again.
fn should_refresh(request: &ApiRequest, raw: &RawError) -> bool {
    raw.status() == Some(401) && !request.is_auth_endpoint()
}

/// Success payload: JSON when possible, `null` for an empty body, text otherwise.
fn response_data(response: &TransportResponse) -> Value {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(&response.body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&response.body).into_owned()))
}
