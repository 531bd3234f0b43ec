//! Persistent storage adapters

pub mod sqlite_kv;

pub use sqlite_kv::SqliteKeyValueStore;
