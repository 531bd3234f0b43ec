//! Client assembly from configuration
//!
//! Wires the production adapters (reqwest transport, SQLite cache, keychain
//! token store) into an [`ApiClient`].

use std::sync::Arc;

use quire_core::{ApiClient, ApiClientConfig, BuildError, TransportError};
use quire_domain::{Config, StorageError};
use thiserror::Error;
use tracing::info;

use crate::auth::KeyringTokenStore;
use crate::config::resolve_base_url;
use crate::http::ReqwestTransport;
use crate::storage::SqliteKeyValueStore;

const USER_AGENT: &str = concat!("quire/", env!("CARGO_PKG_VERSION"));

/// Errors raised while assembling the client
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Failed to open cache store: {0}")]
    CacheStore(#[source] StorageError),

    #[error("Failed to open token store: {0}")]
    TokenStore(#[source] StorageError),

    #[error("Failed to create HTTP transport: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Build a fully wired [`ApiClient`] from `config`.
///
/// Must be called inside a Tokio runtime.
///
/// # Errors
/// Returns `BootstrapError` if any adapter can't be created or the resolved
/// base URL is invalid.
pub fn build_client(config: &Config) -> Result<ApiClient, BootstrapError> {
    let base_url = resolve_base_url(&config.api);

    let store = SqliteKeyValueStore::from_config(&config.storage).map_err(BootstrapError::CacheStore)?;
    let tokens = KeyringTokenStore::from_config(&config.auth).map_err(BootstrapError::TokenStore)?;
    let transport = ReqwestTransport::builder().user_agent(USER_AGENT).build()?;

    let client_config = ApiClientConfig {
        base_url: base_url.clone(),
        timeout: config.api.timeout(),
        cache: config.cache.clone(),
    };

    let client = ApiClient::builder()
        .config(client_config)
        .transport(Arc::new(transport))
        .token_store(Arc::new(tokens))
        .cache_store(Arc::new(store))
        .build()?;

    info!(
        %base_url,
        environment = ?config.api.environment,
        platform = ?config.api.platform,
        cache_db = %config.storage.cache_db_path.display(),
        "api client bootstrapped"
    );
    Ok(client)
}
