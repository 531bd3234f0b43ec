//! Error types used throughout the client
//!
//! [`ApiError`] is the only failure shape a caller of the HTTP client ever
//! sees. [`StorageError`] and [`ConfigError`] cover the persistence ports and
//! configuration loading; storage failures are absorbed inside the client and
//! never reach callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field name → validation messages, as returned by the server.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Categories of API errors for caller-side handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Request dispatched but no response received (includes timeouts)
    Network,
    /// Authentication errors (401, 403) - session must be re-established
    Authentication,
    /// Rate limiting errors (429)
    RateLimit,
    /// Server errors (5xx)
    Server,
    /// Client errors (4xx except auth and rate limiting)
    Client,
}

/// Normalized API failure
///
/// Every error returned by the client has this shape, whatever went wrong in
/// the transport. `status_code` is `0` when no response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{message} (status {status_code})")]
pub struct ApiError {
    /// Human readable message suitable for direct display
    pub message: String,
    /// HTTP status code, or 0 when nothing came back
    pub status_code: u16,
    /// Per-field validation messages supplied by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    /// True when the request was sent but no response was received
    #[serde(default)]
    pub is_network_error: bool,
}

impl ApiError {
    /// Create an error for a response with the given status.
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self { message: message.into(), status_code, errors: None, is_network_error: false }
    }

    /// Create a network error (no response received).
    pub fn network(message: impl Into<String>) -> Self {
        Self { message: message.into(), status_code: 0, errors: None, is_network_error: true }
    }

    /// Create an internal client error (status 500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// Attach server-provided field errors.
    #[must_use]
    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        if self.is_network_error {
            return ApiErrorCategory::Network;
        }
        match self.status_code {
            401 | 403 => ApiErrorCategory::Authentication,
            429 => ApiErrorCategory::RateLimit,
            500..=599 => ApiErrorCategory::Server,
            _ => ApiErrorCategory::Client,
        }
    }

    /// True when the session is no longer valid and the user must sign in.
    pub fn is_auth_expired(&self) -> bool {
        !self.is_network_error && self.status_code == 401
    }

    /// Check if retrying the same request later may succeed
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::Network | ApiErrorCategory::RateLimit | ApiErrorCategory::Server
        )
    }
}

/// Persistence port failures (key/value cache store, token store)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage task failed: {0}")]
    Task(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config format: {0}")]
    Parse(String),
}

/// Result type alias for client operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;
