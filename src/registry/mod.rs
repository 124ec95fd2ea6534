//! Target registry and checkpoint store.
//!
//! Holds the set of watched targets and the per-target resume cursor (the id
//! of the last message known to be durably stored). The cursor is advanced
//! through [`RegistryDb::advance_cursor`], which refuses to move backwards,
//! so the persisted checkpoint is monotonic by construction.
//!
//! The registry assumes a single logical writer: exactly one archivist
//! process per base directory. Concurrent external writers produce undefined
//! cursor races; deployments that need concurrent invocations must add
//! external mutual exclusion (e.g. a lock file on the base directory).

mod schema;

pub use schema::*;

use crate::error::{Error, Result};
use crate::source::{TargetHandle, TargetKind};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use tracing::debug;

/// A registered target row
#[derive(Debug, Clone, FromRow)]
pub struct Target {
    pub id: String,
    pub title: Option<String>,
    pub kind: String,
    pub cursor: i64,
    pub added_at: String,
    pub updated_at: String,
}

impl Target {
    pub fn get_kind(&self) -> Result<TargetKind> {
        self.kind.parse()
    }

    /// Display name: cached title, else the raw id
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// Registry database handle
#[derive(Clone)]
pub struct RegistryDb {
    pool: SqlitePool,
}

impl RegistryDb {
    /// Open (creating if missing) the registry database at the given path
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to registry database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Register a target. Returns false if it was already present.
    pub async fn add_target(&self, handle: &TargetHandle) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO targets (id, title, kind, cursor, added_at, updated_at)
            VALUES (?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&handle.id)
        .bind(&handle.title)
        .bind(handle.kind.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a target from the registry. The target's archive directory is
    /// deliberately left on disk.
    pub async fn remove_target(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM targets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::TargetNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Get a target by id
    pub async fn get_target(&self, id: &str) -> Result<Option<Target>> {
        let target = sqlx::query_as::<_, Target>("SELECT * FROM targets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(target)
    }

    /// List all targets in insertion order
    pub async fn list_targets(&self) -> Result<Vec<Target>> {
        let targets = sqlx::query_as::<_, Target>("SELECT * FROM targets ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(targets)
    }

    /// Current resume cursor for a target
    pub async fn get_cursor(&self, id: &str) -> Result<i64> {
        let cursor: Option<i64> = sqlx::query_scalar("SELECT cursor FROM targets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        cursor.ok_or_else(|| Error::TargetNotFound(id.to_string()))
    }

    /// Advance the cursor to `message_id`. Callers must only pass ids whose
    /// rows are already durably stored. Moves forward only; an equal or
    /// smaller value is a no-op.
    pub async fn advance_cursor(&self, id: &str, message_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE targets SET cursor = ?, updated_at = ? WHERE id = ? AND cursor < ?",
        )
        .bind(message_id)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Refresh the cached display title after a successful resolve
    pub async fn update_title(&self, id: &str, title: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE targets SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Number of registered targets
    pub async fn target_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM targets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
