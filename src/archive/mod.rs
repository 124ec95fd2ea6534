//! Per-target durable storage.
//!
//! Each mirrored target owns a directory under the base path holding its
//! archive database and downloaded media. Message inserts are
//! insert-or-ignore on the message id, so re-processing a message is safe
//! and never erases an already-resolved media path. Member upserts merge
//! profile fields and refresh the last-updated stamp while preserving the
//! identity fields and the first-seen join timestamp.
//!
//! An archive is owned by one pass at a time (see crate docs); media files
//! are write-once with a check before any download.

mod schema;

pub use schema::*;

use crate::error::Result;
use crate::source::{RemoteMember, RemoteMessage, SenderProfile};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Database file name inside a target directory
pub const ARCHIVE_FILE: &str = "archive.db";

/// Media subdirectory inside a target directory
pub const MEDIA_DIR: &str = "media";

/// A stored message row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: i64,
    pub posted_at: String,
    pub sender_id: Option<i64>,
    pub sender_first_name: Option<String>,
    pub sender_last_name: Option<String>,
    pub sender_username: Option<String>,
    pub body: String,
    pub media_kind: Option<String>,
    pub media_path: Option<String>,
    pub reply_to: Option<i64>,
}

impl MessageRecord {
    /// Build a row from a remote message and its (possibly unresolved) sender
    pub fn from_remote(message: &RemoteMessage, sender: Option<&SenderProfile>) -> Self {
        Self {
            message_id: message.id,
            posted_at: message.posted_at.to_rfc3339(),
            sender_id: message.sender_id,
            sender_first_name: sender.and_then(|s| s.first_name.clone()),
            sender_last_name: sender.and_then(|s| s.last_name.clone()),
            sender_username: sender.and_then(|s| s.username.clone()),
            body: message.body.clone(),
            media_kind: message.media.as_ref().map(|m| m.kind.to_string()),
            media_path: None,
            reply_to: message.reply_to,
        }
    }
}

/// A stored member row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MemberRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub is_bot: bool,
    pub is_verified: bool,
    pub is_restricted: bool,
    pub is_scam: bool,
    pub is_fake: bool,
    pub joined_at: Option<String>,
    pub presence: String,
    pub updated_at: String,
}

impl MemberRecord {
    pub fn from_remote(member: &RemoteMember) -> Self {
        Self {
            user_id: member.user_id,
            username: member.username.clone(),
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            phone: member.phone.clone(),
            is_bot: member.is_bot,
            is_verified: member.is_verified,
            is_restricted: member.is_restricted,
            is_scam: member.is_scam,
            is_fake: member.is_fake,
            joined_at: member.joined_at.map(|t| t.to_rfc3339()),
            presence: member.presence.to_string(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Handle to one target's archive database
#[derive(Clone)]
pub struct TargetArchive {
    pool: SqlitePool,
    dir: PathBuf,
}

impl TargetArchive {
    /// Open (creating if missing) the archive under the given target directory
    pub async fn open(target_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(target_dir)?;
        let db_path = target_dir.join(ARCHIVE_FILE);

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to archive database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            dir: target_dir.to_path_buf(),
        })
    }

    /// Directory media files are stored in
    pub fn media_dir(&self) -> PathBuf {
        self.dir.join(MEDIA_DIR)
    }

    /// Insert a message row, ignoring duplicates. Returns true if the row is
    /// new. A duplicate insert leaves the existing row (including any
    /// resolved media path) untouched.
    pub async fn insert_message(&self, record: &MessageRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO messages
                (message_id, posted_at, sender_id, sender_first_name, sender_last_name,
                 sender_username, body, media_kind, media_path, reply_to)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.message_id)
        .bind(&record.posted_at)
        .bind(record.sender_id)
        .bind(&record.sender_first_name)
        .bind(&record.sender_last_name)
        .bind(&record.sender_username)
        .bind(&record.body)
        .bind(&record.media_kind)
        .bind(&record.media_path)
        .bind(record.reply_to)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the local path of a fetched media file
    pub async fn set_media_path(&self, message_id: i64, path: &Path) -> Result<()> {
        sqlx::query("UPDATE messages SET media_path = ? WHERE message_id = ?")
            .bind(path.display().to_string())
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert or merge-update a member row. Identity fields and the
    /// first-seen join timestamp survive updates; everything else is
    /// refreshed along with `updated_at`.
    pub async fn upsert_member(&self, record: &MemberRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO members
                (user_id, username, first_name, last_name, phone,
                 is_bot, is_verified, is_restricted, is_scam, is_fake,
                 joined_at, presence, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                phone = excluded.phone,
                is_bot = excluded.is_bot,
                is_verified = excluded.is_verified,
                is_restricted = excluded.is_restricted,
                is_scam = excluded.is_scam,
                is_fake = excluded.is_fake,
                joined_at = COALESCE(members.joined_at, excluded.joined_at),
                presence = excluded.presence,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.user_id)
        .bind(&record.username)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.phone)
        .bind(record.is_bot)
        .bind(record.is_verified)
        .bind(record.is_restricted)
        .bind(record.is_scam)
        .bind(record.is_fake)
        .bind(&record.joined_at)
        .bind(&record.presence)
        .bind(&record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a single message row
    pub async fn get_message(&self, message_id: i64) -> Result<Option<MessageRecord>> {
        let row = sqlx::query_as::<_, MessageRecord>(
            "SELECT * FROM messages WHERE message_id = ?",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Get a single member row
    pub async fn get_member(&self, user_id: i64) -> Result<Option<MemberRecord>> {
        let row = sqlx::query_as::<_, MemberRecord>("SELECT * FROM members WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Highest stored message id, if any
    pub async fn max_message_id(&self) -> Result<Option<i64>> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(message_id) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(max)
    }

    pub async fn message_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    pub async fn member_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// Message ids whose media was never resolved (non-null kind, null path)
    pub async fn unresolved_media(&self) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT message_id FROM messages
             WHERE media_kind IS NOT NULL AND media_path IS NULL
             ORDER BY message_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Full message table in id order, for export snapshots
    pub async fn all_messages(&self) -> Result<Vec<MessageRecord>> {
        let rows = sqlx::query_as::<_, MessageRecord>(
            "SELECT * FROM messages ORDER BY message_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Full member table in user-id order, for export snapshots
    pub async fn all_members(&self) -> Result<Vec<MemberRecord>> {
        let rows = sqlx::query_as::<_, MemberRecord>("SELECT * FROM members ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
