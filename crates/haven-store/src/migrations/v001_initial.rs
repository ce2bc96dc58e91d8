//! v001 -- Initial schema creation.
//!
//! Creates the credential table and the seven domain collections. Every
//! collection stores its record content as an opaque `payload` BLOB; the
//! remaining columns are the only fields queryable without decryption.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Vault credential (single row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS vault_credential (
    id                   INTEGER PRIMARY KEY CHECK (id = 1),
    kdf_salt             TEXT NOT NULL,     -- hex-encoded 16-byte PBKDF2 salt
    kdf_iterations       INTEGER NOT NULL,
    pw_wrapped_master    BLOB NOT NULL,     -- master key under the password key
    mn_wrapped_master    BLOB NOT NULL,     -- master key under the recovery key
    wrapped_recovery_key BLOB NOT NULL,     -- recovery wrapping key under the master key
    created_at           TEXT NOT NULL,     -- ISO-8601 / RFC-3339
    updated_at           TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Singletons (one encrypted blob each)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS user_profile (
    id         INTEGER PRIMARY KEY CHECK (id = 1),
    payload    BLOB NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS app_settings (
    id         INTEGER PRIMARY KEY CHECK (id = 1),
    payload    BLOB NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS support_network (
    id         INTEGER PRIMARY KEY CHECK (id = 1),
    payload    BLOB NOT NULL,
    updated_at TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Daily metrics (one row per calendar date)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS daily_metrics (
    date       TEXT PRIMARY KEY NOT NULL,   -- YYYY-MM-DD
    payload    BLOB NOT NULL,
    updated_at TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Journal entries
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS journal_entries (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    created_at TEXT NOT NULL,               -- ISO-8601
    payload    BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_journal_created
    ON journal_entries(created_at DESC);

-- ----------------------------------------------------------------
-- Chat messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_messages (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    session_id TEXT NOT NULL,               -- sortable, encodes creation time
    timestamp  TEXT NOT NULL,               -- ISO-8601
    payload    BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_session_ts
    ON chat_messages(session_id, timestamp);

-- ----------------------------------------------------------------
-- Daily memories (extraction pipeline output, one per date)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS daily_memories (
    date          TEXT PRIMARY KEY NOT NULL,  -- YYYY-MM-DD
    covering_from TEXT NOT NULL,              -- YYYY-MM-DD, inclusive
    covering_to   TEXT NOT NULL,              -- YYYY-MM-DD, exclusive
    created_at    TEXT NOT NULL,
    payload       BLOB NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
