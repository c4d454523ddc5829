//! The durable MD5 cache backing the remote provider.
//!
//! Drime's native content hash is not MD5-compatible, so the gateway keeps
//! its own `(workspace, bucket, key) -> md5/size/remote-id` mapping in a
//! single-file SQLite store. Writes commit before an upload is reported
//! successful; reads happen on every HEAD and listing.
//!
//! The cache owns its store exclusively: no other component writes to it.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::StoreError;

/// Inline schema, applied at open. Single table plus the two query paths:
/// per-bucket scans and age-ordered maintenance.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS entries (
        workspace_id   INTEGER NOT NULL,
        bucket         TEXT    NOT NULL,
        key            TEXT    NOT NULL,
        md5            TEXT    NOT NULL,
        size           INTEGER NOT NULL,
        remote_file_id INTEGER NOT NULL,
        created_at     INTEGER NOT NULL,
        updated_at     INTEGER NOT NULL,
        PRIMARY KEY (workspace_id, bucket, key)
    )",
    "CREATE INDEX IF NOT EXISTS idx_entries_workspace_bucket
        ON entries (workspace_id, bucket)",
    "CREATE INDEX IF NOT EXISTS idx_entries_updated_at
        ON entries (updated_at)",
];

/// One cached MD5 mapping.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CacheEntry {
    /// The Drime workspace scope.
    pub workspace_id: i64,
    /// The bucket (top-level folder) name.
    pub bucket: String,
    /// The object key.
    pub key: String,
    /// Lowercase hex MD5 of the uploaded payload.
    pub md5: String,
    /// Payload size in bytes, cross-checked against the remote file size.
    pub size: i64,
    /// The remote file entry id the MD5 was computed for.
    pub remote_file_id: i64,
    /// Epoch millis when the entry was first written.
    pub created_at: i64,
    /// Epoch millis of the last upsert.
    pub updated_at: i64,
}

/// Aggregate statistics over the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries.
    pub entry_count: u64,
    /// Sum of cached payload sizes in bytes.
    pub total_size: u64,
    /// Epoch millis of the oldest entry, if any.
    pub oldest: Option<i64>,
    /// Epoch millis of the most recently updated entry, if any.
    pub newest: Option<i64>,
}

/// The sqlite-backed MD5 cache.
#[derive(Debug, Clone)]
pub struct Md5Cache {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl Md5Cache {
    /// Open (or create) the cache file at `path`.
    ///
    /// The file and its parent directory are created with owner-only
    /// permissions. Writes run with full synchronous durability so a
    /// committed entry survives the commit returning.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created or the schema
    /// cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(StoreError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        restrict_permissions(&path).await?;

        let cache = Self { pool, path: Some(path) };
        cache.apply_schema().await?;
        Ok(cache)
    }

    /// Open an in-memory cache. Test helper: nothing survives the pool.
    ///
    /// # Errors
    ///
    /// Returns an error when the schema cannot be applied.
    pub async fn in_memory() -> Result<Self, StoreError> {
        // One connection: each sqlite :memory: connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().in_memory(true))
            .await?;
        let cache = Self { pool, path: None };
        cache.apply_schema().await?;
        Ok(cache)
    }

    async fn apply_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert or refresh the entry for `(workspace, bucket, key)`.
    ///
    /// # Errors
    ///
    /// Returns the underlying store error; callers decide whether a failed
    /// cache write fails the surrounding operation.
    pub async fn upsert(
        &self,
        workspace_id: i64,
        bucket: &str,
        key: &str,
        md5: &str,
        size: i64,
        remote_file_id: i64,
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO entries
                 (workspace_id, bucket, key, md5, size, remote_file_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (workspace_id, bucket, key) DO UPDATE SET
                 md5 = excluded.md5,
                 size = excluded.size,
                 remote_file_id = excluded.remote_file_id,
                 updated_at = excluded.updated_at",
        )
        .bind(workspace_id)
        .bind(bucket)
        .bind(key)
        .bind(md5)
        .bind(size)
        .bind(remote_file_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up the entry for `(workspace, bucket, key)`.
    ///
    /// # Errors
    ///
    /// Returns the underlying store error.
    pub async fn get(
        &self,
        workspace_id: i64,
        bucket: &str,
        key: &str,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let entry = sqlx::query_as::<_, CacheEntry>(
            "SELECT workspace_id, bucket, key, md5, size, remote_file_id, created_at, updated_at
             FROM entries WHERE workspace_id = ? AND bucket = ? AND key = ?",
        )
        .bind(workspace_id)
        .bind(bucket)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    /// Remove the entry for `(workspace, bucket, key)`. Absent is fine.
    ///
    /// # Errors
    ///
    /// Returns the underlying store error.
    pub async fn remove(
        &self,
        workspace_id: i64,
        bucket: &str,
        key: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM entries WHERE workspace_id = ? AND bucket = ? AND key = ?")
            .bind(workspace_id)
            .bind(bucket)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Range-delete: a whole bucket, or the whole workspace.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns the underlying store error.
    pub async fn purge(
        &self,
        workspace_id: i64,
        bucket: Option<&str>,
    ) -> Result<u64, StoreError> {
        let result = match bucket {
            Some(bucket) => {
                sqlx::query("DELETE FROM entries WHERE workspace_id = ? AND bucket = ?")
                    .bind(workspace_id)
                    .bind(bucket)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM entries WHERE workspace_id = ?")
                    .bind(workspace_id)
                    .execute(&self.pool)
                    .await?
            }
        };
        debug!(workspace_id, ?bucket, removed = result.rows_affected(), "cache purged");
        Ok(result.rows_affected())
    }

    /// Aggregate count, total size, and age bounds, optionally scoped to
    /// one workspace.
    ///
    /// # Errors
    ///
    /// Returns the underlying store error.
    pub async fn stats(&self, workspace_id: Option<i64>) -> Result<CacheStats, StoreError> {
        let row: (i64, i64, Option<i64>, Option<i64>) = match workspace_id {
            Some(workspace_id) => {
                sqlx::query_as(
                    "SELECT COUNT(*), COALESCE(SUM(size), 0), MIN(created_at), MAX(updated_at)
                     FROM entries WHERE workspace_id = ?",
                )
                .bind(workspace_id)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT COUNT(*), COALESCE(SUM(size), 0), MIN(created_at), MAX(updated_at)
                     FROM entries",
                )
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(CacheStats {
            entry_count: u64::try_from(row.0).unwrap_or_default(),
            total_size: u64::try_from(row.1).unwrap_or_default(),
            oldest: row.2,
            newest: row.3,
        })
    }

    /// Reclaim free pages. Returns `(bytes_before, bytes_after)` of the
    /// cache file (both zero for in-memory caches).
    ///
    /// # Errors
    ///
    /// Returns the underlying store error.
    pub async fn vacuum(&self) -> Result<(u64, u64), StoreError> {
        let before = self.file_size().await;
        sqlx::query("VACUUM").execute(&self.pool).await?;
        let after = self.file_size().await;
        debug!(before, after, "cache vacuumed");
        Ok((before, after))
    }

    async fn file_size(&self) -> u64 {
        match &self.path {
            Some(path) => tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0),
            None => 0,
        }
    }
}

/// Restrict the cache file to owner-only access.
async fn restrict_permissions(path: &Path) -> Result<(), StoreError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(path, perms).await.map_err(StoreError::Io)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
