use chrono::NaiveDate;
use rusqlite::params;

use crate::credential::parse_rfc3339;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::metrics::{collect_rows, parse_date};
use crate::models::MemoryRow;

const DATE_FMT: &str = "%Y-%m-%d";

impl Database {
    /// Insert the memory for its date only if none exists yet.
    ///
    /// Returns `true` when the row was written. The conditional insert (not
    /// read-then-write) is what makes concurrent extraction attempts for
    /// the same day collapse to a single record.
    pub fn insert_memory_if_absent(&self, memory: &MemoryRow) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO daily_memories
                 (date, covering_from, covering_to, created_at, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                memory.date.format(DATE_FMT).to_string(),
                memory.covering_from.format(DATE_FMT).to_string(),
                memory.covering_to.format(DATE_FMT).to_string(),
                memory.created_at.to_rfc3339(),
                memory.payload,
            ],
        )?;
        Ok(affected > 0)
    }

    pub fn get_memory(&self, date: NaiveDate) -> Result<MemoryRow> {
        self.conn()
            .query_row(
                "SELECT date, covering_from, covering_to, created_at, payload
                 FROM daily_memories WHERE date = ?1",
                params![date.format(DATE_FMT).to_string()],
                row_to_memory,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// The newest memory by date, if any.
    pub fn latest_memory(&self) -> Result<Option<MemoryRow>> {
        let result = self.conn().query_row(
            "SELECT date, covering_from, covering_to, created_at, payload
             FROM daily_memories ORDER BY date DESC LIMIT 1",
            [],
            row_to_memory,
        );
        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// The most recent `limit` memories, newest first.
    pub fn recent_memories(&self, limit: u32) -> Result<Vec<MemoryRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT date, covering_from, covering_to, created_at, payload
             FROM daily_memories ORDER BY date DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], row_to_memory)?;
        collect_rows(rows)
    }

    pub fn all_memories(&self) -> Result<Vec<MemoryRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT date, covering_from, covering_to, created_at, payload
             FROM daily_memories ORDER BY date ASC",
        )?;
        let rows = stmt.query_map([], row_to_memory)?;
        collect_rows(rows)
    }
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRow> {
    let date_str: String = row.get(0)?;
    let from_str: String = row.get(1)?;
    let to_str: String = row.get(2)?;
    let created_str: String = row.get(3)?;
    let payload: Vec<u8> = row.get(4)?;

    Ok(MemoryRow {
        date: parse_date(&date_str, 0)?,
        covering_from: parse_date(&from_str, 1)?,
        covering_to: parse_date(&to_str, 2)?,
        created_at: parse_rfc3339(&created_str, 3)?,
        payload,
    })
}
