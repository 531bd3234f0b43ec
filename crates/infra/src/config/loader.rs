//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Variables from a `.env` file (if any) are added to the environment
//! 2. Attempts to load from environment variables
//! 3. If the environment does not describe the API, falls back to a file
//! 4. Probes multiple paths for config files (JSON and TOML)
//! 5. Without any file, built-in defaults are used
//!
//! ## Environment Variables
//! One of `QUIRE_API_URL` / `QUIRE_ENVIRONMENT` must be set for the
//! environment to be used; every other variable is optional.
//! - `QUIRE_API_URL`: Explicit base URL (`DEV` selects the development default)
//! - `QUIRE_ENVIRONMENT`: `production` or `development`
//! - `QUIRE_PLATFORM`: `android`, `ios` or `desktop`
//! - `QUIRE_TIMEOUT_SECONDS`: Request timeout in seconds
//! - `QUIRE_CACHE_TTL_SECONDS`: Cache freshness window in seconds
//! - `QUIRE_CACHE_INVALIDATION`: `resource_prefix` or `exact_key`
//! - `QUIRE_CACHE_DB_PATH`: SQLite file backing the cache
//! - `QUIRE_KEYCHAIN_SERVICE`: Keychain service name for tokens
//! - `QUIRE_LOG_LEVEL`: Default log filter
//! - `QUIRE_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./quire.json` or `./quire.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use quire_domain::{Config, ConfigError};

type Result<T> = std::result::Result<T, ConfigError>;

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ConfigError` if a variable or file is present but invalid.
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(ConfigError::Missing(key)) => {
            tracing::debug!(missing = %key, "Environment incomplete, trying file");
            match load_from_file(None) {
                Err(ConfigError::Missing(_)) => {
                    tracing::info!("No configuration found, using defaults");
                    Ok(Config::default())
                }
                other => other,
            }
        }
        Err(e) => Err(e),
    }
}

/// Load configuration from environment variables
///
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `ConfigError::Missing` if neither `QUIRE_API_URL` nor
/// `QUIRE_ENVIRONMENT` is set, and `ConfigError::Invalid` for values that
/// don't parse.
pub fn load_from_env() -> Result<Config> {
    let url = std::env::var("QUIRE_API_URL").ok();
    let environment = std::env::var("QUIRE_ENVIRONMENT").ok();
    if url.is_none() && environment.is_none() {
        return Err(ConfigError::Missing("QUIRE_API_URL or QUIRE_ENVIRONMENT".to_string()));
    }

    let mut config = Config::default();
    config.api.url = url;
    if let Some(environment) = environment {
        config.api.environment = parse_value("QUIRE_ENVIRONMENT", &environment)?;
    }
    if let Some(platform) = optional_env("QUIRE_PLATFORM") {
        config.api.platform = parse_value("QUIRE_PLATFORM", &platform)?;
    }
    if let Some(timeout) = optional_env("QUIRE_TIMEOUT_SECONDS") {
        config.api.timeout_seconds = parse_value("QUIRE_TIMEOUT_SECONDS", &timeout)?;
    }
    if let Some(ttl) = optional_env("QUIRE_CACHE_TTL_SECONDS") {
        config.cache.ttl_seconds = parse_value("QUIRE_CACHE_TTL_SECONDS", &ttl)?;
    }
    if let Some(policy) = optional_env("QUIRE_CACHE_INVALIDATION") {
        config.cache.invalidation = parse_value("QUIRE_CACHE_INVALIDATION", &policy)?;
    }
    if let Some(path) = optional_env("QUIRE_CACHE_DB_PATH") {
        config.storage.cache_db_path = PathBuf::from(path);
    }
    if let Some(service) = optional_env("QUIRE_KEYCHAIN_SERVICE") {
        config.auth.keychain_service = service;
    }
    if let Some(level) = optional_env("QUIRE_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("QUIRE_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ConfigError::Missing` when no file exists, `ConfigError::Io` if
/// it can't be read and `ConfigError::Parse` if the format is invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::Missing(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ConfigError::Missing("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)?;
    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Parse(format!("Invalid JSON format: {e}"))),
        _ => Err(ConfigError::Parse(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 6] = [
        "config.json",
        "config.toml",
        "quire.json",
        "quire.toml",
        "../config.json",
        "../config.toml",
    ];

    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(NAMES.iter().map(|name| cwd.join(name)));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Non-empty environment variable
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
