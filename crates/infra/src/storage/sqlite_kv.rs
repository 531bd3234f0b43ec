//! SQLite-backed key/value store for the response cache.
//!
//! Implements the `KeyValueStore` port on a single `kv_store` table. All
//! database operations run in `spawn_blocking` to avoid blocking the async
//! runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quire_core::cache::KeyValueStore;
use quire_domain::{StorageConfig, StorageError, StorageResult};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, Connection};
use tokio::task;
use tracing::{info, instrument};

type SqlitePool = Pool<SqliteConnectionManager>;

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)";

const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode=WAL;\nPRAGMA synchronous=NORMAL;\n";

/// Keys per `DELETE … IN (…)` statement, below SQLite's parameter limit.
const DELETE_CHUNK: usize = 500;

/// Pooled SQLite key/value store.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: Arc<SqlitePool>,
    path: PathBuf,
}

impl SqliteKeyValueStore {
    /// Open (or create) the store at `path` and ensure the schema exists.
    ///
    /// # Errors
    /// Returns `StorageError::Backend` if the file can't be opened or the
    /// schema can't be created.
    #[instrument(skip(path), fields(db_path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.execute_batch(CONNECTION_PRAGMAS)?;
            conn.busy_timeout(Duration::from_secs(5))
        });
        Self::with_manager(manager, pool_size.max(1), path)
    }

    /// Open the store described by `config`.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        Self::open(&config.cache_db_path, config.pool_size)
    }

    /// In-memory store, mainly for tests. Uses a single connection so every
    /// operation sees the same database.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_manager(SqliteConnectionManager::memory(), 1, PathBuf::from(":memory:"))
    }

    fn with_manager(
        manager: SqliteConnectionManager,
        pool_size: u32,
        path: PathBuf,
    ) -> StorageResult<Self> {
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
            .map_err(|e| StorageError::Backend(format!("Failed to create pool: {e}")))?;

        {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
        }

        info!(db_path = %path.display(), max_connections = pool_size, "sqlite cache store initialised");
        Ok(Self { pool: Arc::new(pool), path })
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        task::spawn_blocking(move || -> StorageResult<T> {
            let conn: PooledConnection<SqliteConnectionManager> =
                pool.get().map_err(map_pool_error)?;
            op(&conn).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

impl std::fmt::Debug for SqliteKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKeyValueStore").field("path", &self.path).finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let key = key.to_string();
        self.run(move |conn| query_value(conn, &key)).await
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.run(move |conn| upsert_value(conn, &key, &value)).await
    }

    async fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.run(query_keys).await
    }

    async fn remove_many(&self, keys: &[String]) -> StorageResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let keys = keys.to_vec();
        self.run(move |conn| delete_keys(conn, &keys)).await
    }
}

// ============================================================================
// Synchronous SQL Operations (called inside spawn_blocking)
// ============================================================================

fn query_value(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    match conn.query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| {
        row.get::<_, String>(0)
    }) {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn upsert_value(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn query_keys(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}

/// Deletes every key in one transaction.
fn delete_keys(conn: &Connection, keys: &[String]) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    for chunk in keys.chunks(DELETE_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        tx.execute(
            &format!("DELETE FROM kv_store WHERE key IN ({placeholders})"),
            params_from_iter(chunk.iter()),
        )?;
    }
    tx.commit()
}

// ============================================================================
// Error Mapping
// ============================================================================

fn map_sql_error(err: rusqlite::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn map_pool_error(err: r2d2::Error) -> StorageError {
    StorageError::Backend(format!("Failed to get connection: {err}"))
}

/// Map JoinError from spawn_blocking to StorageError.
fn map_join_error(err: task::JoinError) -> StorageError {
    if err.is_cancelled() {
        StorageError::Task("blocking task cancelled".into())
    } else {
        StorageError::Task(format!("blocking task failed: {err}"))
    }
}

// ============================================================================
// Tests
// ============================================================================
