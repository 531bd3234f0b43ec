//! Token storage in the platform keychain.
//!
//! The access and refresh tokens are stored as two secrets under one service
//! name: `access.<account>` and `refresh.<account>`. Keychain calls block, so
//! they run on the blocking thread pool.

use std::sync::Arc;

use async_trait::async_trait;
use keyring::Entry;
use quire_core::auth::TokenStore;
use quire_domain::{AuthConfig, StorageError, StorageResult, TokenPair};
use tokio::task;
use tracing::{debug, warn};

const ACCESS_PREFIX: &str = "access.";
const REFRESH_PREFIX: &str = "refresh.";

/// [`TokenStore`] backed by the OS keychain via `keyring`
pub struct KeyringTokenStore {
    service: String,
    account: String,
    access: Arc<Entry>,
    refresh: Arc<Entry>,
}

impl KeyringTokenStore {
    /// Create a store for `account` under `service`.
    ///
    /// # Errors
    /// Returns `StorageError::Backend` if the keychain entries can't be created.
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> StorageResult<Self> {
        let service = service.into();
        let account = account.into();
        let access = create_entry(&service, &format!("{ACCESS_PREFIX}{account}"))?;
        let refresh = create_entry(&service, &format!("{REFRESH_PREFIX}{account}"))?;
        Ok(Self { service, account, access: Arc::new(access), refresh: Arc::new(refresh) })
    }

    /// Create the store named in the auth configuration.
    pub fn from_config(config: &AuthConfig) -> StorageResult<Self> {
        Self::new(&config.keychain_service, &config.keychain_account)
    }

    /// Keychain service name
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Account the tokens are stored for
    pub fn account(&self) -> &str {
        &self.account
    }
}

impl std::fmt::Debug for KeyringTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringTokenStore")
            .field("service", &self.service)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn access_token(&self) -> StorageResult<Option<String>> {
        let entry = Arc::clone(&self.access);
        blocking(move || read_secret(&entry)).await
    }

    async fn refresh_token(&self) -> StorageResult<Option<String>> {
        let entry = Arc::clone(&self.refresh);
        blocking(move || read_secret(&entry)).await
    }

    async fn save_tokens(&self, tokens: &TokenPair) -> StorageResult<()> {
        debug!(service = %self.service, account = %self.account, "storing tokens");
        let access = Arc::clone(&self.access);
        let refresh = Arc::clone(&self.refresh);
        let tokens = tokens.clone();

        blocking(move || {
            let result = access
                .set_password(&tokens.access_token)
                .and_then(|()| refresh.set_password(&tokens.refresh_token));
            if let Err(e) = result {
                // A half-written pair must not survive.
                let _ = delete_secret(&access);
                let _ = delete_secret(&refresh);
                return Err(map_keyring_error(e));
            }
            Ok(())
        })
        .await
    }

    async fn clear_tokens(&self) -> StorageResult<()> {
        debug!(service = %self.service, account = %self.account, "clearing tokens");
        let access = Arc::clone(&self.access);
        let refresh = Arc::clone(&self.refresh);

        blocking(move || {
            let access_result = delete_secret(&access);
            let refresh_result = delete_secret(&refresh);
            access_result.and(refresh_result)
        })
        .await
    }
}

fn create_entry(service: &str, key: &str) -> StorageResult<Entry> {
    Entry::new(service, key).map_err(map_keyring_error)
}

fn read_secret(entry: &Entry) -> StorageResult<Option<String>> {
    match entry.get_password() {
        Ok(secret) => Ok(Some(secret)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(map_keyring_error(e)),
    }
}

/// Idempotent delete
fn delete_secret(entry: &Entry) -> StorageResult<()> {
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => {
            warn!(error = %e, "failed to delete keychain secret");
            Err(map_keyring_error(e))
        }
    }
}

async fn blocking<T, F>(op: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StorageResult<T> + Send + 'static,
{
    task::spawn_blocking(op)
        .await
        .map_err(|e| StorageError::Task(format!("keychain task failed: {e}")))?
}

fn map_keyring_error(err: keyring::Error) -> StorageError {
    StorageError::Backend(format!("keychain error: {err}"))
}
