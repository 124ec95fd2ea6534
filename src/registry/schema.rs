//! SQLite schema definition for the target registry

/// SQL schema for the registry database
pub const SCHEMA_SQL: &str = r#"
-- Targets: watched channels/groups with their resume cursors.
-- Insertion order is the implicit rowid.
CREATE TABLE IF NOT EXISTS targets (
    id TEXT PRIMARY KEY,
    title TEXT,
    kind TEXT NOT NULL,
    cursor INTEGER NOT NULL DEFAULT 0,
    added_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
