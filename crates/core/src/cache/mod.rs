//! Persistent GET response cache
//!
//! Entries live in a [`KeyValueStore`] under a namespace prefix. All reads,
//! writes and invalidations go through a single worker task so they apply in
//! the order they were issued.

pub mod key;
pub mod ports;
pub mod store;

use quire_domain::StorageError;
use thiserror::Error;

pub use key::{canonical_json, resource_prefix, url_path, CacheKey, InvalidationScope};
pub use ports::KeyValueStore;
pub use store::{is_fresh, CacheStore};

/// Failures inside the cache worker. Never surfaced to API callers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
