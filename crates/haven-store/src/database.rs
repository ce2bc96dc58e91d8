//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees
//! that migrations are run before any other operation.
//!
//! The SQLite file itself is not encrypted: all sensitive record content
//! lives in `payload` BLOBs that are AEAD-encrypted by the vault layer
//! before they reach this crate.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Named collections a caller can bulk-wipe individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Profile,
    Metrics,
    Journal,
    Chat,
    Memories,
    Support,
    Settings,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Profile,
        Collection::Metrics,
        Collection::Journal,
        Collection::Chat,
        Collection::Memories,
        Collection::Support,
        Collection::Settings,
    ];

    pub(crate) fn table(&self) -> &'static str {
        match self {
            Collection::Profile => "user_profile",
            Collection::Metrics => "daily_metrics",
            Collection::Journal => "journal_entries",
            Collection::Chat => "chat_messages",
            Collection::Memories => "daily_memories",
            Collection::Support => "support_network",
            Collection::Settings => "app_settings",
        }
    }
}

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/haven/haven.db`
    /// - macOS:   `~/Library/Application Support/com.haven.haven/haven.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\haven\haven\data\haven.db`
    pub fn new() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "haven", "haven").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("haven.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    ///
    /// This is useful for tests and for embedding the store inside custom
    /// directory layouts.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Recommended SQLite settings.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Run schema migrations.
        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// Open an in-memory database. Test-only convenience.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    ///
    /// Callers should prefer the typed CRUD helpers, but direct access is
    /// occasionally needed for transactions or ad-hoc queries.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return a mutable reference to the underlying connection.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }

    /// Delete every row of one collection.
    pub fn clear_collection(&self, collection: Collection) -> Result<usize> {
        let affected = self
            .conn
            .execute(&format!("DELETE FROM {}", collection.table()), [])?;
        tracing::info!(collection = collection.table(), rows = affected, "collection cleared");
        Ok(affected)
    }

    /// Delete every collection and the vault credential.
    ///
    /// After this the database is schema-complete but empty, as if freshly
    /// created.
    pub fn wipe_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for collection in Collection::ALL {
            tx.execute(&format!("DELETE FROM {}", collection.table()), [])?;
        }
        tx.execute("DELETE FROM vault_credential", [])?;
        tx.commit()?;
        tracing::info!("vault wiped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
    }

    #[test]
    fn wipe_leaves_empty_schema() {
        let mut db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO journal_entries (id, created_at, payload) VALUES ('a', 'b', x'00')",
                [],
            )
            .unwrap();

        db.wipe_all().unwrap();

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM journal_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn clear_single_collection() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO journal_entries (id, created_at, payload) VALUES ('a', 'b', x'00')",
                [],
            )
            .unwrap();

        assert_eq!(db.clear_collection(Collection::Journal).unwrap(), 1);
        assert_eq!(db.clear_collection(Collection::Chat).unwrap(), 0);
    }
}
