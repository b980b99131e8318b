//! Durable State Storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::StateStore,
};
use bytes::Bytes;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::PathBuf;
use tracing::debug;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS engine_state (
        key TEXT PRIMARY KEY,
        value BLOB NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

/// SQLite-backed state store implementation
///
/// One row per key; values are stored as opaque blobs.
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Open (or create) a state store at the given database path
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to connect to DB: {}", e)))?;

        Self::init_schema(&pool).await?;
        debug!(path = ?db_path, "Initialized state store");

        Ok(Self { pool })
    }

    /// Open the store in the platform data directory
    /// (`<data_dir>/playback-engine/state.db`).
    pub async fn open_default() -> Result<Self> {
        let base = dirs::data_dir().ok_or_else(|| {
            BridgeError::NotAvailable("No platform data directory available".to_string())
        })?;
        Self::new(base.join("playback-engine").join("state.db")).await
    }

    /// Create an in-memory state store (for testing)
    ///
    /// Limited to one connection: every SQLite memory connection is its own
    /// database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to connect to DB: {}", e)))?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let len = value.len();
        sqlx::query(
            r#"
            INSERT INTO engine_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value.as_ref())
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::StorageError(format!("Failed to store '{}': {}", key, e)))?;

        debug!(key = key, bytes = len, "Stored state");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let row = sqlx::query("SELECT value FROM engine_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to read '{}': {}", key, e)))?;

        Ok(row.map(|row| {
            let value: Vec<u8> = row.get(0);
            Bytes::from(value)
        }))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM engine_state WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                BridgeError::StorageError(format!("Failed to delete '{}': {}", key, e))
            })?;

        debug!(key = key, "Deleted state");
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM engine_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to check key: {}", e)))?;

        Ok(row.is_some())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM engine_state ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to list keys: {}", e)))?;

        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }

    async fn clear_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM engine_state")
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to clear state: {}", e)))?;

        debug!("Cleared all state");
        Ok(())
    }
}
