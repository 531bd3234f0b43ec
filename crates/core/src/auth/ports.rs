//! Credential storage port

use async_trait::async_trait;
use quire_domain::{StorageResult, TokenPair};

/// Secure storage for the access/refresh token pair
///
/// Implementations must persist both tokens together; a partially written
/// pair is treated as signed out by callers.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn access_token(&self) -> StorageResult<Option<String>>;

    async fn refresh_token(&self) -> StorageResult<Option<String>>;

    /// Replace both tokens.
    async fn save_tokens(&self, tokens: &TokenPair) -> StorageResult<()>;

    /// Remove both tokens. Succeeds when nothing is stored.
    async fn clear_tokens(&self) -> StorageResult<()>;
}
