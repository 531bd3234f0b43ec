//! Configuration structures
//!
//! Every section has serde defaults so partial JSON/TOML files load cleanly.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_NAMESPACE, DEFAULT_CACHE_TTL_SECS, DEFAULT_KEYCHAIN_ACCOUNT,
    DEFAULT_KEYCHAIN_SERVICE, DEFAULT_TIMEOUT_SECS,
};
use crate::impl_domain_enum_conversions;

/// Top-level client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Runtime environment used for base URL selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl_domain_enum_conversions!(Environment {
    Production => "production" | "prod",
    Development => "development" | "dev",
});

/// Device platform the client runs on
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    #[default]
    Desktop,
}

impl_domain_enum_conversions!(Platform {
    Android => "android",
    Ios => "ios",
    Desktop => "desktop",
});

/// HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    /// Explicit base URL; `None` or `"DEV"` selects an environment default
    pub url: Option<String>,
    pub environment: Environment,
    pub platform: Platform,
    /// Global request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: None,
            environment: Environment::default(),
            platform: Platform::default(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Scope of cache invalidation after a successful mutating call
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationPolicy {
    /// Drop every entry under the URL's first path segment (`/articles/5` → `/articles*`)
    #[default]
    ResourcePrefix,
    /// Drop only entries whose path equals the mutated URL's path
    ExactKey,
}

impl_domain_enum_conversions!(InvalidationPolicy {
    ResourcePrefix => "resource_prefix" | "prefix",
    ExactKey => "exact_key" | "exact",
});

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness window in seconds
    pub ttl_seconds: u64,
    pub invalidation: InvalidationPolicy,
    /// Prefix applied to every cache key in the backing store
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECS,
            invalidation: InvalidationPolicy::default(),
            namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
        }
    }
}

impl CacheConfig {
    /// Freshness window as a `Duration`
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Create config with custom TTL (useful for testing)
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl_seconds: ttl.as_secs(), ..Self::default() }
    }
}

/// Persistent storage settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file backing the response cache
    pub cache_db_path: PathBuf,
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { cache_db_path: PathBuf::from("quire-cache.db"), pool_size: 4 }
    }
}

/// Token storage settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    pub keychain_service: String,
    pub keychain_account: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            keychain_account: DEFAULT_KEYCHAIN_ACCOUNT.to_string(),
        }
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.invalidation, InvalidationPolicy::ResourcePrefix);
        assert_eq!(config.cache.namespace, "api_cache:");
        assert_eq!(config.api.environment, Environment::Production);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "api": { "url": "https://example.test" } }"#).unwrap();
        assert_eq!(config.api.url.as_deref(), Some("https://example.test"));
        assert_eq!(config.api.timeout_seconds, 10);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(Environment::from_str("dev").unwrap(), Environment::Development);
        assert_eq!(Platform::from_str("Android").unwrap(), Platform::Android);
        assert_eq!(InvalidationPolicy::from_str("exact").unwrap(), InvalidationPolicy::ExactKey);
        assert!(Platform::from_str("symbian").is_err());
    }

    #[test]
    fn test_invalidation_policy_serde() {
        let json = serde_json::to_string(&InvalidationPolicy::ExactKey).unwrap();
        assert_eq!(json, "\"exact_key\"");
    }
}
