//! Shared harness for client integration tests: a real reqwest transport
//! against a wiremock server, a SQLite cache in a temp dir, in-memory tokens
//! and a manually driven clock.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use quire_core::testing::{InMemoryTokenStore, MockClock};
use quire_core::{ApiClient, ApiClientConfig, KeyValueStore};
use quire_domain::{CacheConfig, CacheEntry};
use quire_infra::{ReqwestTransport, SqliteKeyValueStore};
use tempfile::TempDir;
use wiremock::MockServer;

pub const CACHE_NAMESPACE: &str = "api_cache:";

pub struct TestClient {
    pub client: Arc<ApiClient>,
    pub tokens: Arc<InMemoryTokenStore>,
    pub store: Arc<SqliteKeyValueStore>,
    pub clock: Arc<MockClock>,
    _temp_dir: TempDir,
}

impl TestClient {
    /// Client for `base_url` holding the given token pair.
    pub fn new(base_url: &str, access_token: &str, refresh_token: &str) -> Self {
        Self::with_options(
            base_url,
            access_token,
            refresh_token,
            CacheConfig::default(),
            Duration::from_secs(5),
        )
    }

    pub fn with_options(
        base_url: &str,
        access_token: &str,
        refresh_token: &str,
        cache: CacheConfig,
        timeout: Duration,
    ) -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let store = Arc::new(
            SqliteKeyValueStore::open(temp_dir.path().join("cache.db"), 2)
                .expect("cache store should open"),
        );
        let tokens = Arc::new(InMemoryTokenStore::with_tokens(access_token, refresh_token));
        let clock = Arc::new(MockClock::new());
        let transport =
            ReqwestTransport::builder().user_agent("quire-tests").build().expect("transport");

        let config = ApiClientConfig {
            base_url: base_url.to_string(),
            timeout,
            cache,
        };
        let client = ApiClient::builder()
            .config(config)
            .transport(Arc::new(transport))
            .token_store(tokens.clone())
            .cache_store(store.clone())
            .clock(clock.clone())
            .build()
            .expect("client should build");

        Self { client: Arc::new(client), tokens, store, clock, _temp_dir: temp_dir }
    }

    /// Client pointed at a running mock server.
    pub fn for_server(server: &MockServer) -> Self {
        Self::new(&server.uri(), "access-1", "refresh-1")
    }

    /// Cache entry stored under `key` (without namespace), after pending
    /// writes have landed.
    pub async fn cached(&self, key: &str) -> Option<CacheEntry> {
        self.client.flush_cache().await;
        let raw = self
            .store
            .get(&format!("{CACHE_NAMESPACE}{key}"))
            .await
            .expect("cache store should be readable")?;
        Some(serde_json::from_str(&raw).expect("cache entry should decode"))
    }

    /// Cache keys currently stored, without namespace.
    pub async fn cached_keys(&self) -> Vec<String> {
        self.client.flush_cache().await;
        self.store
            .list_keys()
            .await
            .expect("cache store should be listable")
            .into_iter()
            .filter_map(|key| key.strip_prefix(CACHE_NAMESPACE).map(str::to_string))
            .collect()
    }
}

/// Base URL nothing listens on.
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}
