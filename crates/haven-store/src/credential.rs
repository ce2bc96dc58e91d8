use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::CredentialRow;

impl Database {
    /// True once a credential exists, i.e. the vault has been created.
    pub fn has_credential(&self) -> Result<bool> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM vault_credential", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    pub fn get_credential(&self) -> Result<CredentialRow> {
        self.conn()
            .query_row(
                "SELECT kdf_salt, kdf_iterations, pw_wrapped_master, mn_wrapped_master,
                        wrapped_recovery_key, created_at, updated_at
                 FROM vault_credential WHERE id = 1",
                [],
                row_to_credential,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Insert or replace the single credential row.
    pub fn put_credential(&self, credential: &CredentialRow) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO vault_credential
                 (id, kdf_salt, kdf_iterations, pw_wrapped_master, mn_wrapped_master,
                  wrapped_recovery_key, created_at, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                hex::encode(&credential.kdf_salt),
                credential.kdf_iterations,
                credential.pw_wrapped_master,
                credential.mn_wrapped_master,
                credential.wrapped_recovery_key,
                credential.created_at.to_rfc3339(),
                credential.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

pub(crate) fn row_to_credential(row: &rusqlite::Row<'_>) -> rusqlite::Result<CredentialRow> {
    let salt_hex: String = row.get(0)?;
    let kdf_iterations: u32 = row.get(1)?;
    let pw_wrapped_master: Vec<u8> = row.get(2)?;
    let mn_wrapped_master: Vec<u8> = row.get(3)?;
    let wrapped_recovery_key: Vec<u8> = row.get(4)?;
    let created_str: String = row.get(5)?;
    let updated_str: String = row.get(6)?;

    let kdf_salt = hex::decode(&salt_hex).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(CredentialRow {
        kdf_salt,
        kdf_iterations,
        pw_wrapped_master,
        mn_wrapped_master,
        wrapped_recovery_key,
        created_at: parse_rfc3339(&created_str, 5)?,
        updated_at: parse_rfc3339(&updated_str, 6)?,
    })
}

pub(crate) fn parse_rfc3339(value: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_credential() -> CredentialRow {
        CredentialRow {
            kdf_salt: vec![0x11; 16],
            kdf_iterations: 310_000,
            pw_wrapped_master: vec![1, 2, 3],
            mn_wrapped_master: vec![4, 5, 6],
            wrapped_recovery_key: vec![7, 8, 9],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn credential_round_trip() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.has_credential().unwrap());

        let credential = sample_credential();
        db.put_credential(&credential).unwrap();

        assert!(db.has_credential().unwrap());
        let loaded = db.get_credential().unwrap();
        assert_eq!(loaded.kdf_salt, credential.kdf_salt);
        assert_eq!(loaded.kdf_iterations, credential.kdf_iterations);
        assert_eq!(loaded.pw_wrapped_master, credential.pw_wrapped_master);
    }

    #[test]
    fn missing_credential_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_credential(), Err(StoreError::NotFound)));
    }

    #[test]
    fn put_replaces_existing_row() {
        let db = Database::open_in_memory().unwrap();
        db.put_credential(&sample_credential()).unwrap();

        let mut updated = sample_credential();
        updated.kdf_iterations = 400_000;
        db.put_credential(&updated).unwrap();

        let loaded = db.get_credential().unwrap();
        assert_eq!(loaded.kdf_iterations, 400_000);

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM vault_credential", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
