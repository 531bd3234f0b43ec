//! Persistent key/value storage port backing the response cache

use async_trait::async_trait;
use quire_domain::StorageResult;

/// Durable string key/value store
///
/// Values are opaque strings; the cache stores one JSON document per key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Insert or replace a value.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// All keys currently stored, in no particular order.
    async fn list_keys(&self) -> StorageResult<Vec<String>>;

    /// Remove the given keys; unknown keys are ignored.
    async fn remove_many(&self, keys: &[String]) -> StorageResult<()>;
}
