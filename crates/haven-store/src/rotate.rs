//! Atomic key-rotation sweep.
//!
//! A password change (or mnemonic reset) must re-encrypt every payload in
//! every collection and install the new credential as one indivisible step:
//! if the process dies mid-sweep the vault must still open under the old
//! password. Running the whole sweep inside a single SQLite transaction
//! gives exactly that: an interrupted rotation rolls back completely.

use rusqlite::params;

use crate::database::{Collection, Database};
use crate::error::StoreError;
use crate::models::CredentialRow;

impl Database {
    /// Re-encrypt every ciphertext payload and replace the credential, all
    /// inside one transaction.
    ///
    /// `reencrypt` receives each stored payload and returns its replacement
    /// (decrypt under the old key, encrypt under the new one). Any error,
    /// from the closure or from SQLite, aborts the transaction and leaves
    /// the store untouched.
    pub fn rotate_payloads<E, F>(
        &mut self,
        new_credential: &CredentialRow,
        mut reencrypt: F,
    ) -> std::result::Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&[u8]) -> std::result::Result<Vec<u8>, E>,
    {
        let db_err = |e: rusqlite::Error| E::from(StoreError::from(e));

        let tx = self.conn_mut().transaction().map_err(db_err)?;

        for collection in Collection::ALL {
            let table = collection.table();

            let rows: Vec<(i64, Vec<u8>)> = {
                let mut stmt = tx
                    .prepare(&format!("SELECT rowid, payload FROM {table}"))
                    .map_err(db_err)?;
                let mapped = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                    .map_err(db_err)?;

                let mut rows = Vec::new();
                for row in mapped {
                    rows.push(row.map_err(db_err)?);
                }
                rows
            };

            for (rowid, payload) in rows {
                let rotated = reencrypt(&payload)?;
                tx.execute(
                    &format!("UPDATE {table} SET payload = ?1 WHERE rowid = ?2"),
                    params![rotated, rowid],
                )
                .map_err(db_err)?;
            }

            tracing::debug!(collection = table, "collection re-encrypted");
        }

        tx.execute(
            "INSERT OR REPLACE INTO vault_credential
                 (id, kdf_salt, kdf_iterations, pw_wrapped_master, mn_wrapped_master,
                  wrapped_recovery_key, created_at, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                hex::encode(&new_credential.kdf_salt),
                new_credential.kdf_iterations,
                new_credential.pw_wrapped_master,
                new_credential.mn_wrapped_master,
                new_credential.wrapped_recovery_key,
                new_credential.created_at.to_rfc3339(),
                new_credential.updated_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JournalRow, MetricRow};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn seed(db: &Database) {
        db.upsert_metric(&MetricRow {
            date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            payload: vec![0xAA, 0xAA],
            updated_at: Utc::now(),
        })
        .unwrap();
        db.insert_journal_entry(&JournalRow {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            payload: vec![0xBB, 0xBB],
        })
        .unwrap();
    }

    fn credential(iterations: u32) -> CredentialRow {
        CredentialRow {
            kdf_salt: vec![0x01; 16],
            kdf_iterations: iterations,
            pw_wrapped_master: vec![1],
            mn_wrapped_master: vec![2],
            wrapped_recovery_key: vec![3],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rotation_rewrites_every_payload() {
        let mut db = Database::open_in_memory().unwrap();
        db.put_credential(&credential(100_000)).unwrap();
        seed(&db);

        db.rotate_payloads::<StoreError, _>(&credential(200_000), |payload| {
            Ok(payload.iter().map(|b| b ^ 0xFF).collect())
        })
        .unwrap();

        let metric = db
            .get_metric(NaiveDate::from_ymd_opt(2026, 8, 1).unwrap())
            .unwrap();
        assert_eq!(metric.payload, vec![0x55, 0x55]);
        assert_eq!(db.get_credential().unwrap().kdf_iterations, 200_000);
    }

    #[test]
    fn failed_rotation_rolls_back_completely() {
        let mut db = Database::open_in_memory().unwrap();
        db.put_credential(&credential(100_000)).unwrap();
        seed(&db);

        let mut calls = 0;
        let result = db.rotate_payloads::<StoreError, _>(&credential(200_000), |payload| {
            calls += 1;
            if calls > 1 {
                // simulated mid-sweep fault
                Err(StoreError::Migration("injected".into()))
            } else {
                Ok(payload.iter().map(|b| b ^ 0xFF).collect())
            }
        });
        assert!(result.is_err());

        // nothing changed: payloads and credential are the pre-sweep state
        let metric = db
            .get_metric(NaiveDate::from_ymd_opt(2026, 8, 1).unwrap())
            .unwrap();
        assert_eq!(metric.payload, vec![0xAA, 0xAA]);
        assert_eq!(db.get_credential().unwrap().kdf_iterations, 100_000);
    }
}
