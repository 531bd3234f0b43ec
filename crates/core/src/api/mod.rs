//! HTTP client: transport port, error normalization, token refresh,
//! request pipeline and the cached facade

pub mod client;
pub mod normalizer;
pub mod pipeline;
pub mod ports;
pub mod refresh;

pub use client::{ApiClient, ApiClientBuilder, ApiClientConfig, BuildError};
pub use normalizer::{normalize, RawError};
pub use pipeline::ApiRequest;
pub use ports::{HttpMethod, Transport, TransportError, TransportRequest, TransportResponse};
pub use refresh::RefreshCoordinator;
