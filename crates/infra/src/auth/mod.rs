//! Credential storage adapters

pub mod keyring_store;

pub use keyring_store::KeyringTokenStore;
