//! Durable key-value storage backing the offline queue.
//!
//! A single SQLite table (`kv_store`) holds JSON-encoded values under fixed
//! string keys. The pending queue lives under one key as a whole JSON array;
//! writes replace the array wholesale. Whole-sequence replacement trades
//! write amplification for a structure that can never be half-updated on
//! disk.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use linereport_core::QueuedReport;

/// Storage key for the pending report queue.
pub const QUEUE_KEY: &str = "offline_report_queue";

/// Where the SQLite database lives.
#[derive(Debug, Clone)]
enum StoreLocation {
    /// `{data_dir}/linereport/client.db`.
    Default,
    /// Explicit database file.
    Path(PathBuf),
    /// Private in-memory database (tests).
    Memory,
}

/// SQLite-backed key-value store.
///
/// Cheap to clone; the pool is shared. Initialization is lazy: the database
/// is opened and migrated on first use.
#[derive(Debug, Clone)]
pub struct KvStore {
    location: StoreLocation,
    pool: Arc<Mutex<Option<SqlitePool>>>,
}

impl KvStore {
    /// Store under the OS data directory.
    pub fn new() -> Self {
        Self::with_location(StoreLocation::Default)
    }

    /// Store at an explicit database file.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self::with_location(StoreLocation::Path(path.into()))
    }

    /// Private in-memory store, for tests.
    pub fn in_memory() -> Self {
        Self::with_location(StoreLocation::Memory)
    }

    fn with_location(location: StoreLocation) -> Self {
        Self {
            location,
            pool: Arc::new(Mutex::new(None)),
        }
    }

    /// Initialize the database connection (called lazily on first use).
    async fn ensure_initialized(&self) -> anyhow::Result<()> {
        let mut pool_guard = self.pool.lock().await;
        if pool_guard.is_some() {
            return Ok(());
        }

        let pool = match &self.location {
            StoreLocation::Memory => {
                // Each pooled connection to :memory: would get its own
                // database; pin the pool to a single connection.
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect("sqlite::memory:")
                    .await
                    .context("failed to open in-memory SQLite store")?
            }
            location => {
                let db_path = match location {
                    StoreLocation::Path(path) => path.clone(),
                    _ => default_db_path()?,
                };
                if let Some(parent) = db_path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create store directory at {parent:?}")
                    })?;
                }
                let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
                SqlitePool::connect(&db_url)
                    .await
                    .with_context(|| format!("failed to open SQLite store at {db_path:?}"))?
            }
        };

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create kv_store table")?;

        *pool_guard = Some(pool);
        Ok(())
    }

    /// Get the pool, initializing if necessary.
    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        self.ensure_initialized().await?;
        let pool_guard = self.pool.lock().await;
        Ok(pool_guard.as_ref().unwrap().clone())
    }

    /// Fetch the raw value stored under `key`.
    pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let pool = self.get_pool().await?;
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&pool)
            .await
            .with_context(|| format!("failed to read key '{key}'"))?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    pub async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&pool)
        .await
        .with_context(|| format!("failed to write key '{key}'"))?;

        Ok(())
    }

    /// Remove `key` (no-op when absent).
    pub async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&pool)
            .await
            .with_context(|| format!("failed to remove key '{key}'"))?;
        Ok(())
    }
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable store for the pending report queue.
#[derive(Debug, Clone)]
pub struct QueueStore {
    kv: KvStore,
}

impl QueueStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Read the persisted queue.
    ///
    /// A missing key reads as empty. An unparseable value also reads as
    /// empty (with a logged warning): a corrupt record is unrecoverable, and
    /// failing every future enqueue on it would brick the queue. Storage I/O
    /// failures propagate; they indicate a broken device environment.
    pub async fn read(&self) -> anyhow::Result<Vec<QueuedReport>> {
        let Some(raw) = self.kv.get(QUEUE_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(queue) => Ok(queue),
            Err(err) => {
                tracing::warn!("discarding unparseable queue value: {err}");
                Ok(Vec::new())
            }
        }
    }

    /// Replace the persisted queue wholesale.
    pub async fn write(&self, queue: &[QueuedReport]) -> anyhow::Result<()> {
        let encoded = serde_json::to_string(queue).context("failed to encode queue")?;
        self.kv.set(QUEUE_KEY, &encoded).await
    }

    /// Drop the persisted queue entirely (administrative).
    pub async fn clear(&self) -> anyhow::Result<()> {
        self.kv.remove(QUEUE_KEY).await
    }
}

/// Resolve the default SQLite database path:
/// `{app_data_dir}/linereport/client.db`.
fn default_db_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut dir = base;
    dir.push("linereport");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create store directory at {dir:?}"))?;

    dir.push("client.db");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linereport_core::{ErrorCodeId, ErrorCodeRef, LineId, PhotoRef, ReportPayload, UserId};

    fn test_report(barcode: &str) -> QueuedReport {
        QueuedReport::new(ReportPayload {
            barcode: barcode.to_string(),
            product_type: "Valve".to_string(),
            line_number: "Line 2".to_string(),
            line_id: LineId::new(2),
            error_code: ErrorCodeRef::new(ErrorCodeId::new(5), "E-5", "misaligned weld"),
            note: None,
            photos: vec![PhotoRef::parse("file:///photos/1.jpg")],
            user_id: UserId::new(2),
        })
    }

    #[tokio::test]
    async fn missing_key_reads_as_empty() {
        let store = QueueStore::new(KvStore::in_memory());
        assert!(store.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let store = QueueStore::new(KvStore::in_memory());
        let queue = vec![test_report("111"), test_report("222"), test_report("333")];

        store.write(&queue).await.unwrap();
        let read_back = store.read().await.unwrap();

        assert_eq!(read_back, queue);
    }

    #[tokio::test]
    async fn unparseable_value_reads_as_empty() {
        let kv = KvStore::in_memory();
        kv.set(QUEUE_KEY, "not json at all {{{").await.unwrap();

        let store = QueueStore::new(kv);
        assert!(store.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_removes_the_key() {
        let kv = KvStore::in_memory();
        let store = QueueStore::new(kv.clone());

        store.write(&[test_report("111")]).await.unwrap();
        store.clear().await.unwrap();

        assert!(kv.get(QUEUE_KEY).await.unwrap().is_none());
        assert!(store.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn kv_set_replaces_existing_value() {
        let kv = KvStore::in_memory();
        kv.set("k", "first").await.unwrap();
        kv.set("k", "second").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("second"));
    }
}
