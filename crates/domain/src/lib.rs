//! # Quire Domain
//!
//! Domain types for the Quire API client.
//!
//! This crate contains:
//! - The normalized [`ApiError`] and storage/config error types
//! - Cache, token, article and pagination types
//! - Configuration structures
//! - Endpoint paths, defaults and fixed messages
//!
//! ## Architecture
//! - No dependencies on other Quire crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
