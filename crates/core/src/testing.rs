//! Test doubles for the client's ports
//!
//! Available to this crate's unit tests and, through the `test-utils`
//! feature, to downstream integration tests.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use quire_core::clock::Clock;
//! use quire_core::testing::MockClock;
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!((clock.now() - start).num_seconds(), 5);
//! ```

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use quire_domain::{StorageError, StorageResult, TokenPair};

use crate::api::ports::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::auth::ports::TokenStore;
use crate::cache::ports::KeyValueStore;
use crate::clock::Clock;

/// Manually driven clock
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Clock frozen at the current system time
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Clock frozen at `now`
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(now)) }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        let mut now = self.now.lock();
        *now = now.checked_add_signed(by).unwrap_or(*now);
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

fn injected_failure() -> StorageError {
    StorageError::Backend("injected failure".to_string())
}

/// In-memory key/value store with switchable failure injection
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    data: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Store a raw value, bypassing the cache encoding.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.data.lock().insert(key.to_string(), value.to_string());
    }

    /// Stored value for `key`
    pub fn raw(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).cloned()
    }

    /// True when `key` is stored
    pub fn contains(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(injected_failure())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check()?;
        self.insert_raw(key, value);
        Ok(())
    }

    async fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.check()?;
        Ok(self.keys())
    }

    async fn remove_many(&self, keys: &[String]) -> StorageResult<()> {
        self.check()?;
        let mut data = self.data.lock();
        for key in keys {
            data.remove(key);
        }
        Ok(())
    }
}

/// In-memory token store with switchable failure injection
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
    failing: AtomicBool,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the given pair
    pub fn with_tokens(access_token: &str, refresh_token: &str) -> Self {
        let store = Self::new();
        *store.tokens.lock() = Some(TokenPair::new(access_token, refresh_token));
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Currently stored pair
    pub fn current(&self) -> Option<TokenPair> {
        self.tokens.lock().clone()
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(injected_failure())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn access_token(&self) -> StorageResult<Option<String>> {
        self.check()?;
        Ok(self.tokens.lock().as_ref().map(|pair| pair.access_token.clone()))
    }

    async fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.check()?;
        Ok(self.tokens.lock().as_ref().map(|pair| pair.refresh_token.clone()))
    }

    async fn save_tokens(&self, tokens: &TokenPair) -> StorageResult<()> {
        self.check()?;
        *self.tokens.lock() = Some(tokens.clone());
        Ok(())
    }

    async fn clear_tokens(&self) -> StorageResult<()> {
        self.check()?;
        *self.tokens.lock() = None;
        Ok(())
    }
}

type Handler =
    Arc<dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync>;

/// Transport answering from a closure and recording every request
///
/// Per-path delays simulate slow endpoints so concurrent callers can pile up
/// behind an in-flight request.
#[derive(Clone)]
pub struct ScriptedTransport {
    handler: Handler,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    requests: Arc<Mutex<Vec<TransportRequest>>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            delays: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Delay responses for requests whose path equals `path`.
    #[must_use]
    pub fn with_delay(self, path: &str, delay: Duration) -> Self {
        self.delays.lock().insert(path.to_string(), delay);
        self
    }

    /// All requests received so far, in order
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received for `path`
    pub fn count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|request| request.path() == path).count()
    }

    /// Number of requests received
    pub fn total(&self) -> usize {
        self.requests.lock().len()
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport").field("requests", &self.total()).finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request.clone());
        let delay = self.delays.lock().get(&request.path()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(&request)
    }
}
