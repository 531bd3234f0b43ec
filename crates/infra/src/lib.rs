//! # Quire Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - HTTP transport (reqwest)
//! - SQLite key/value store for the response cache
//! - Keychain token storage
//! - Configuration loading and base URL resolution
//! - Logging setup and client bootstrap
//!
//! ## Architecture
//! - Implements traits defined in `quire-core`
//! - Depends on `quire-domain` and `quire-core`
//! - Contains all "impure" code (I/O, platform APIs)

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod http;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use auth::KeyringTokenStore;
pub use bootstrap::{build_client, BootstrapError};
pub use config::resolve_base_url;
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use observability::init_tracing;
pub use storage::SqliteKeyValueStore;
