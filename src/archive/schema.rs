//! SQLite schema definition for per-target archives

/// SQL schema for a target's archive database
pub const SCHEMA_SQL: &str = r#"
-- Messages: one row per remote message id
CREATE TABLE IF NOT EXISTS messages (
    message_id INTEGER PRIMARY KEY,
    posted_at TEXT NOT NULL,
    sender_id INTEGER,
    sender_first_name TEXT,
    sender_last_name TEXT,
    sender_username TEXT,
    body TEXT NOT NULL,
    media_kind TEXT,
    media_path TEXT,
    reply_to INTEGER
);

-- Members: one row per user id, merge-updated on re-observation
CREATE TABLE IF NOT EXISTS members (
    user_id INTEGER PRIMARY KEY,
    username TEXT,
    first_name TEXT,
    last_name TEXT,
    phone TEXT,
    is_bot INTEGER NOT NULL DEFAULT 0,
    is_verified INTEGER NOT NULL DEFAULT 0,
    is_restricted INTEGER NOT NULL DEFAULT 0,
    is_scam INTEGER NOT NULL DEFAULT 0,
    is_fake INTEGER NOT NULL DEFAULT 0,
    joined_at TEXT,
    presence TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Rows whose media never resolved, for targeted re-scans
CREATE INDEX IF NOT EXISTS idx_messages_unresolved_media
    ON messages(media_kind) WHERE media_path IS NULL;
"#;
