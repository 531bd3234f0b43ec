//! API client facade
//!
//! Provides typed GET/POST/PUT/PATCH/DELETE operations on top of the request
//! pipeline. GET responses are served from the persistent cache while fresh,
//! written through on success and used as a stale fallback when the server
//! cannot be reached. Successful mutations invalidate affected entries.

use std::sync::Arc;
use std::time::Duration;

use quire_domain::constants::DEFAULT_TIMEOUT_SECS;
use quire_domain::{ApiError, ApiResult, CacheConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use super::pipeline::{ApiRequest, Pipeline};
use super::ports::{HttpMethod, Transport};
use super::refresh::RefreshCoordinator;
use crate::auth::ports::TokenStore;
use crate::cache::{CacheKey, CacheStore, KeyValueStore};
use crate::clock::{Clock, SystemClock};

/// Configuration for API client
#[derive(Debug, Clone, PartialEq)]
pub struct ApiClientConfig {
    /// Base URL every relative path is joined to (e.g. "http://localhost:3100")
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    pub cache: CacheConfig,
}

impl ApiClientConfig {
    /// Config for `base_url` with the default timeout and cache settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache: CacheConfig::default(),
        }
    }
}

/// Errors raised while assembling a client
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Missing client component: {0}")]
    MissingComponent(&'static str),

    #[error("Invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("The response cache requires a running Tokio runtime")]
    NoRuntime,
}

/// Cached, authenticated API client
pub struct ApiClient {
    pipeline: Pipeline,
    cache: CacheStore,
}

impl ApiClient {
    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Base URL every relative path is joined to; fixed for the client lifetime.
    pub fn base_url(&self) -> &str {
        self.pipeline.base_url()
    }

    /// Token store shared with the refresh coordinator
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        self.pipeline.tokens()
    }

    /// Coordinator that serializes token refreshes for this client
    pub fn refresh_coordinator(&self) -> &Arc<RefreshCoordinator> {
        self.pipeline.refresh_coordinator()
    }

    /// Execute a cached GET request
    ///
    /// # Arguments
    ///
    /// * `url` - API path (e.g., "/articles") or absolute URL
    /// * `params` - Query parameters; also part of the cache key
    ///
    /// # Errors
    ///
    /// Returns the normalized error when the request fails and no cached
    /// entry can stand in for it, or a 500 when the payload does not decode
    /// into `T`.
    pub async fn get<T: DeserializeOwned>(&self, url: &str, params: Option<&Value>) -> ApiResult<T> {
        decode(self.get_value(url, params).await?)
    }

    /// Untyped variant of [`get`](Self::get).
    #[instrument(skip(self, params), fields(url = %url))]
    pub async fn get_value(&self, url: &str, params: Option<&Value>) -> ApiResult<Value> {
        let key = CacheKey::new(url, params);

        if let Some(entry) = self.cache.read(&key).await {
            if self.cache.is_fresh(&entry) {
                debug!(key = %key, "cache hit");
                return Ok(entry.data);
            }
            debug!(key = %key, "cache entry stale");
        }

        let request = ApiRequest::new(HttpMethod::Get, url).with_params(params.cloned());
        match self.pipeline.execute(&request).await {
            Ok(data) => {
                self.cache.write(key, data.clone());
                Ok(data)
            }
            Err(err) if err.is_network_error => match self.cache.read(&key).await {
                Some(entry) => {
                    warn!(key = %key, "server unreachable; serving cached response");
                    Ok(entry.data)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Execute a POST request
    ///
    /// # Errors
    ///
    /// Returns the normalized error on failure; the cache is left untouched.
    #[instrument(skip(self, body), fields(url = %url))]
    pub async fn post<B, T>(&self, url: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        decode(self.mutate(HttpMethod::Post, url, Some(encode(body)?)).await?)
    }

    /// Execute a PUT request
    #[instrument(skip(self, body), fields(url = %url))]
    pub async fn put<B, T>(&self, url: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        decode(self.mutate(HttpMethod::Put, url, Some(encode(body)?)).await?)
    }

    /// Execute a PATCH request
    #[instrument(skip(self, body), fields(url = %url))]
    pub async fn patch<B, T>(&self, url: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        decode(self.mutate(HttpMethod::Patch, url, Some(encode(body)?)).await?)
    }

    /// Execute a DELETE request
    #[instrument(skip(self), fields(url = %url))]
    pub async fn delete<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        decode(self.mutate(HttpMethod::Delete, url, None).await?)
    }

    /// Drop every cached response, e.g. when the session ends.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Wait until all queued cache writes and invalidations are applied.
    pub async fn flush_cache(&self) {
        self.cache.flush().await;
    }

    async fn mutate(&self, method: HttpMethod, url: &str, body: Option<Value>) -> ApiResult<Value> {
        let request = ApiRequest::new(method, url).with_body(body);
        let data = self.pipeline.execute(&request).await?;
        self.cache.invalidate(url);
        Ok(data)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("pipeline", &self.pipeline)
            .field("cache", &self.cache)
            .finish()
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> ApiResult<Value> {
    serde_json::to_value(body)
        .map_err(|e| ApiError::internal(format!("Failed to encode request body: {e}")))
}

fn decode<T: DeserializeOwned>(data: Value) -> ApiResult<T> {
    serde_json::from_value(data)
        .map_err(|e| ApiError::internal(format!("Failed to parse response: {e}")))
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ApiClientConfig>,
    transport: Option<Arc<dyn Transport>>,
    tokens: Option<Arc<dyn TokenStore>>,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ApiClientBuilder {
    /// Set the client configuration
    pub fn config(mut self, config: ApiClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the HTTP transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the token store
    pub fn token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Set the key/value store backing the response cache
    pub fn cache_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the clock used for cache freshness (defaults to the system clock)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the API client
    ///
    /// Spawns the cache worker, so this must run inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if a component is missing, the base URL is not an
    /// absolute http(s) URL, or no runtime is available.
    pub fn build(self) -> Result<ApiClient, BuildError> {
        let config = self.config.ok_or(BuildError::MissingComponent("config"))?;
        let transport = self.transport.ok_or(BuildError::MissingComponent("transport"))?;
        let tokens = self.tokens.ok_or(BuildError::MissingComponent("token store"))?;
        let store = self.store.ok_or(BuildError::MissingComponent("cache store"))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        validate_base_url(&config.base_url)?;
        tokio::runtime::Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let cache = CacheStore::spawn(store, clock, &config.cache);
        let pipeline = Pipeline::new(transport, tokens, config.base_url, config.timeout);

        debug!(base_url = pipeline.base_url(), "api client ready");
        Ok(ApiClient { pipeline, cache })
    }
}

fn validate_base_url(base_url: &str) -> Result<(), BuildError> {
    let invalid = |reason: &str| BuildError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(base_url).map_err(|e| invalid(&e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(&format!("unsupported scheme {other}"))),
    }
}
