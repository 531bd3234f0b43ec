//! Persisted response cache record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached response payload and the instant it was stored
///
/// The pair is always serialized as one JSON document so a stored entry is
/// either complete or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl CacheEntry {
    /// Create an entry stored at `timestamp`.
    pub fn new(timestamp: DateTime<Utc>, data: serde_json::Value) -> Self {
        Self { timestamp, data }
    }

    /// Age of the entry relative to `now` (zero if the entry is in the future).
    pub fn age(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.timestamp).to_std().unwrap_or_default()
    }
}
