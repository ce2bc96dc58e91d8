use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::credential::parse_rfc3339;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::metrics::collect_rows;
use crate::models::JournalRow;

impl Database {
    pub fn insert_journal_entry(&self, entry: &JournalRow) -> Result<()> {
        self.conn().execute(
            "INSERT INTO journal_entries (id, created_at, payload) VALUES (?1, ?2, ?3)",
            params![
                entry.id.to_string(),
                entry.created_at.to_rfc3339(),
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn get_journal_entry(&self, id: Uuid) -> Result<JournalRow> {
        self.conn()
            .query_row(
                "SELECT id, created_at, payload FROM journal_entries WHERE id = ?1",
                params![id.to_string()],
                row_to_journal,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Entries with `created_at >= from`, oldest first.
    pub fn journal_entries_since(&self, from: DateTime<Utc>) -> Result<Vec<JournalRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, created_at, payload FROM journal_entries
             WHERE created_at >= ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![from.to_rfc3339()], row_to_journal)?;
        collect_rows(rows)
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent_journal_entries(&self, limit: u32) -> Result<Vec<JournalRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, created_at, payload FROM journal_entries
             ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], row_to_journal)?;
        collect_rows(rows)
    }

    pub fn all_journal_entries(&self) -> Result<Vec<JournalRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, created_at, payload FROM journal_entries ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_journal)?;
        collect_rows(rows)
    }
}

fn row_to_journal(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalRow> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(1)?;
    let payload: Vec<u8> = row.get(2)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(JournalRow {
        id,
        created_at: parse_rfc3339(&created_str, 1)?,
        payload,
    })
}
