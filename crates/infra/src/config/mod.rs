//! Configuration loading and management
//!
//! This module provides utilities for loading client configuration
//! from environment variables and files, and for resolving the base URL.

pub mod base_url;
pub mod loader;

// Re-export commonly used items
pub use base_url::resolve_base_url;
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
