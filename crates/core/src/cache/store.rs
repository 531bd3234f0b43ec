//! Ordered cache worker
//!
//! [`CacheStore`] is a cheap handle to a background task that owns the
//! key/value store. Writes and invalidations are fire-and-forget; reads wait
//! for a reply. Because every command goes through one queue, a read issued
//! after an invalidation never observes the invalidated entry, and a write
//! issued before an invalidation is always removed by it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quire_domain::{CacheConfig, CacheEntry, InvalidationPolicy};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::key::{CacheKey, InvalidationScope};
use super::ports::KeyValueStore;
use super::CacheError;
use crate::clock::Clock;

/// True when `entry` is younger than `ttl` at `now`.
pub fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>, ttl: Duration) -> bool {
    entry.age(now) < ttl
}

enum CacheCommand {
    Read { key: CacheKey, reply: oneshot::Sender<Option<CacheEntry>> },
    Write { key: CacheKey, entry: CacheEntry },
    Invalidate { url: String },
    Clear,
    Flush { reply: oneshot::Sender<()> },
}

/// Handle to the cache worker
#[derive(Clone)]
pub struct CacheStore {
    tx: mpsc::UnboundedSender<CacheCommand>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl CacheStore {
    /// Spawn the worker on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: &CacheConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = CacheWorker {
            store,
            namespace: config.namespace.clone(),
            policy: config.invalidation,
        };
        tokio::spawn(worker.run(rx));

        debug!(
            ttl_secs = config.ttl_seconds,
            namespace = %config.namespace,
            policy = %config.invalidation,
            "response cache started"
        );

        Self { tx, clock, ttl: config.ttl() }
    }

    /// Freshness window
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Freshness of `entry` against the injected clock.
    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        is_fresh(entry, self.clock.now(), self.ttl)
    }

    /// Look up an entry, fresh or not. Storage failures read as a miss.
    pub async fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(CacheCommand::Read { key: key.clone(), reply }).is_err() {
            warn!(key = %key, "cache worker unavailable; treating read as miss");
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Store `data` under `key`, stamped with the current time.
    pub fn write(&self, key: CacheKey, data: Value) {
        let entry = CacheEntry::new(self.clock.now(), data);
        if self.tx.send(CacheCommand::Write { key, entry }).is_err() {
            warn!("cache worker unavailable; dropping write");
        }
    }

    /// Drop entries affected by a mutation of `url`.
    pub fn invalidate(&self, url: &str) {
        if self.tx.send(CacheCommand::Invalidate { url: url.to_string() }).is_err() {
            warn!(url, "cache worker unavailable; dropping invalidation");
        }
    }

    /// Drop every entry in this cache's namespace.
    pub fn clear(&self) {
        if self.tx.send(CacheCommand::Clear).is_err() {
            warn!("cache worker unavailable; dropping clear");
        }
    }

    /// Wait until every previously issued command has been applied.
    pub async fn flush(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(CacheCommand::Flush { reply }).is_ok() {
            let _ = rx.await;
        }
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

struct CacheWorker {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    policy: InvalidationPolicy,
}

impl CacheWorker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<CacheCommand>) {
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        debug!("response cache worker stopped");
    }

    async fn handle(&self, command: CacheCommand) {
        match command {
            CacheCommand::Read { key, reply } => {
                let entry = self.read(&key).await;
                let _ = reply.send(entry);
            }
            CacheCommand::Write { key, entry } => {
                if let Err(e) = self.write(&key, &entry).await {
                    warn!(key = %key, error = %e, "failed to write cache entry");
                }
            }
            CacheCommand::Invalidate { url } => {
                let scope = InvalidationScope::for_url(&url, self.policy);
                match self.remove_matching(&scope).await {
                    Ok(removed) => debug!(url = %url, removed, "invalidated cache entries"),
                    Err(e) => warn!(url = %url, error = %e, "failed to invalidate cache entries"),
                }
            }
            CacheCommand::Clear => {
                match self.remove_matching(&InvalidationScope::Prefix("/".to_string())).await {
                    Ok(removed) => debug!(removed, "cleared response cache"),
                    Err(e) => warn!(error = %e, "failed to clear response cache"),
                }
            }
            CacheCommand::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn storage_key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.namespace, key)
    }

    async fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.store.get(&self.storage_key(key)).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(key = %key, error = %e, "discarding unreadable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed");
                None
            }
        }
    }

    async fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
        let raw = serde_json::to_string(entry)?;
        self.store.set(&self.storage_key(key), &raw).await?;
        Ok(())
    }

    async fn remove_matching(&self, scope: &InvalidationScope) -> Result<usize, CacheError> {
        let doomed: Vec<String> = self
            .store
            .list_keys()
            .await?
            .into_iter()
            .filter(|stored| {
                stored.strip_prefix(&self.namespace).is_some_and(|key| scope.matches(key))
            })
            .collect();

        if !doomed.is_empty() {
            self.store.remove_many(&doomed).await?;
        }
        Ok(doomed.len())
    }
}
