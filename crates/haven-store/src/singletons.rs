//! Singleton collections: profile, settings, support network.
//!
//! Each is a single-row table (`CHECK (id = 1)`) holding one encrypted
//! blob, overwritten in place; no history is kept.

use rusqlite::params;

use crate::credential::parse_rfc3339;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::SingletonRow;

impl Database {
    pub fn get_profile_blob(&self) -> Result<SingletonRow> {
        self.get_singleton("user_profile")
    }

    pub fn put_profile_blob(&self, row: &SingletonRow) -> Result<()> {
        self.put_singleton("user_profile", row)
    }

    pub fn get_settings_blob(&self) -> Result<SingletonRow> {
        self.get_singleton("app_settings")
    }

    pub fn put_settings_blob(&self, row: &SingletonRow) -> Result<()> {
        self.put_singleton("app_settings", row)
    }

    pub fn get_support_blob(&self) -> Result<SingletonRow> {
        self.get_singleton("support_network")
    }

    pub fn put_support_blob(&self, row: &SingletonRow) -> Result<()> {
        self.put_singleton("support_network", row)
    }

    fn get_singleton(&self, table: &str) -> Result<SingletonRow> {
        self.conn()
            .query_row(
                &format!("SELECT payload, updated_at FROM {table} WHERE id = 1"),
                [],
                |row| {
                    let payload: Vec<u8> = row.get(0)?;
                    let updated_str: String = row.get(1)?;
                    Ok(SingletonRow {
                        payload,
                        updated_at: parse_rfc3339(&updated_str, 1)?,
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    fn put_singleton(&self, table: &str, row: &SingletonRow) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT OR REPLACE INTO {table} (id, payload, updated_at) VALUES (1, ?1, ?2)"
            ),
            params![row.payload, row.updated_at.to_rfc3339()],
        )?;
        Ok(())
    }
}
