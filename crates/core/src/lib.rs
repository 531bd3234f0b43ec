//! # Quire Core
//!
//! Client logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The cached, authenticated [`ApiClient`] facade and its request pipeline
//! - Single-flight token refresh and error normalization
//! - The ordered response cache worker
//! - Port interfaces (traits) for transport, token and key/value storage
//! - Article and account services
//!
//! ## Architecture Principles
//! - Only depends on `quire-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable client logic

pub mod api;
pub mod articles;
pub mod auth;
pub mod cache;
pub mod clock;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use api::{
    ApiClient, ApiClientBuilder, ApiClientConfig, BuildError, HttpMethod, RefreshCoordinator,
    Transport, TransportError, TransportRequest, TransportResponse,
};
pub use articles::ArticleService;
pub use auth::{AuthService, TokenStore};
pub use cache::{CacheKey, CacheStore, KeyValueStore};
pub use clock::{Clock, SystemClock};
