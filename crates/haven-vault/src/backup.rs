//! Backup/restore codec.
//!
//! The whole vault serializes to a single portable JSON document: an export
//! timestamp, the bundle's own KDF parameters, a verifier blob, and one
//! array per collection holding the same `{index fields, payload hex}`
//! shape as the live store. Every payload is re-encrypted under a key
//! derived from a bundle password chosen at export, so the document is
//! independent of the live session's key.
//!
//! Import validates the document shape before attempting any decryption,
//! then trial-decrypts the verifier: a wrong bundle password is reported as
//! [`VaultError::ImportPassword`], distinct from a malformed file. Rows are
//! re-encrypted under the importing vault's master key and written in one
//! transaction: an import either lands completely or not at all.

use chrono::{DateTime, NaiveDate};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

use haven_shared::constants::{KDF_DEFAULT_ITERATIONS, SALT_SIZE};
use haven_shared::crypto::{self, SymmetricKey};

use crate::error::{Result, VaultError};
use crate::session::Vault;

/// Known plaintext sealed under the bundle key so import can verify the
/// password before touching any row.
const VERIFIER_PLAINTEXT: &[u8] = b"haven-backup-verifier-v1";

const DATE_FMT: &str = "%Y-%m-%d";

/// Full backup document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupBundle {
    /// ISO 8601 timestamp of when the backup was created
    pub created_at: String,
    /// App version that produced the backup
    pub version: String,
    /// Hex-encoded PBKDF2 salt for the bundle key
    pub kdf_salt: String,
    pub kdf_iterations: u32,
    /// Hex-encoded AEAD blob proving the bundle password
    pub verifier: String,
    pub profile: Vec<BackupSingleton>,
    pub settings: Vec<BackupSingleton>,
    pub support_network: Vec<BackupSingleton>,
    pub metrics: Vec<BackupMetric>,
    pub journal: Vec<BackupJournal>,
    pub chat: Vec<BackupChat>,
    pub memories: Vec<BackupMemory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSingleton {
    pub payload_hex: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetric {
    pub date: String,
    pub payload_hex: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupJournal {
    pub id: String,
    pub created_at: String,
    pub payload_hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupChat {
    pub id: String,
    pub session_id: String,
    pub timestamp: String,
    pub payload_hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMemory {
    pub date: String,
    pub covering_from: String,
    pub covering_to: String,
    pub created_at: String,
    pub payload_hex: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ImportStats {
    pub singletons_imported: usize,
    pub metrics_imported: usize,
    pub journal_imported: usize,
    pub chat_imported: usize,
    pub memories_imported: usize,
}

impl Vault {
    /// Export the whole vault as one JSON document, re-encrypted under
    /// `bundle_password`. Requires an unlocked session.
    pub fn export_backup(&self, bundle_password: &str) -> Result<String> {
        self.with_unlocked("export_backup", |db, key| {
            let salt = crypto::generate_salt();
            let mut bundle_key =
                crypto::derive_password_key(bundle_password, &salt, KDF_DEFAULT_ITERATIONS);

            let reseal = |payload: &[u8]| -> Result<String> {
                let plain = crypto::decrypt(key, payload)?;
                Ok(hex::encode(crypto::encrypt(&bundle_key, &plain)?))
            };

            let singleton = |row: haven_store::SingletonRow| -> Result<BackupSingleton> {
                Ok(BackupSingleton {
                    payload_hex: reseal(&row.payload)?,
                    updated_at: row.updated_at.to_rfc3339(),
                })
            };

            let mut bundle = BackupBundle {
                created_at: chrono::Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                kdf_salt: hex::encode(salt),
                kdf_iterations: KDF_DEFAULT_ITERATIONS,
                verifier: hex::encode(crypto::encrypt(&bundle_key, VERIFIER_PLAINTEXT)?),
                profile: Vec::new(),
                settings: Vec::new(),
                support_network: Vec::new(),
                metrics: Vec::new(),
                journal: Vec::new(),
                chat: Vec::new(),
                memories: Vec::new(),
            };

            if let Some(row) = absent_ok(db.get_profile_blob())? {
                bundle.profile.push(singleton(row)?);
            }
            if let Some(row) = absent_ok(db.get_settings_blob())? {
                bundle.settings.push(singleton(row)?);
            }
            if let Some(row) = absent_ok(db.get_support_blob())? {
                bundle.support_network.push(singleton(row)?);
            }

            for row in db.all_metrics()? {
                bundle.metrics.push(BackupMetric {
                    date: row.date.format(DATE_FMT).to_string(),
                    payload_hex: reseal(&row.payload)?,
                    updated_at: row.updated_at.to_rfc3339(),
                });
            }
            for row in db.all_journal_entries()? {
                bundle.journal.push(BackupJournal {
                    id: row.id.to_string(),
                    created_at: row.created_at.to_rfc3339(),
                    payload_hex: reseal(&row.payload)?,
                });
            }
            for row in db.all_chat_messages()? {
                bundle.chat.push(BackupChat {
                    id: row.id.to_string(),
                    session_id: row.session_id,
                    timestamp: row.timestamp.to_rfc3339(),
                    payload_hex: reseal(&row.payload)?,
                });
            }
            for row in db.all_memories()? {
                bundle.memories.push(BackupMemory {
                    date: row.date.format(DATE_FMT).to_string(),
                    covering_from: row.covering_from.format(DATE_FMT).to_string(),
                    covering_to: row.covering_to.format(DATE_FMT).to_string(),
                    created_at: row.created_at.to_rfc3339(),
                    payload_hex: reseal(&row.payload)?,
                });
            }

            bundle_key.zeroize();

            tracing::info!(
                metrics = bundle.metrics.len(),
                journal = bundle.journal.len(),
                chat = bundle.chat.len(),
                memories = bundle.memories.len(),
                "backup exported"
            );
            Ok(serde_json::to_string(&bundle)?)
        })
    }

    /// Import a backup document into this (unlocked) vault.
    ///
    /// Rows are merged with replace semantics and re-encrypted under the
    /// live master key inside a single transaction.
    pub fn import_backup(&self, bundle_json: &str, bundle_password: &str) -> Result<ImportStats> {
        // Shape validation happens in full before any decryption.
        let bundle: BackupBundle = serde_json::from_str(bundle_json).map_err(|e| {
            tracing::warn!(error = %e, "backup document failed shape validation");
            VaultError::BackupValidation
        })?;
        let salt = hex::decode(&bundle.kdf_salt).map_err(|_| VaultError::BackupValidation)?;
        if salt.len() != SALT_SIZE {
            return Err(VaultError::BackupValidation);
        }
        let verifier = hex::decode(&bundle.verifier).map_err(|_| VaultError::BackupValidation)?;
        validate_index_fields(&bundle)?;

        let mut bundle_key =
            crypto::derive_password_key(bundle_password, &salt, bundle.kdf_iterations);

        if crypto::decrypt(&bundle_key, &verifier).is_err() {
            bundle_key.zeroize();
            tracing::warn!("backup verifier rejected the supplied password");
            return Err(VaultError::ImportPassword);
        }

        let result = self.with_unlocked_mut("import_backup", |db, key| {
            let mut stats = ImportStats::default();

            // After the verifier passed, a payload that fails to decrypt
            // means the document is inconsistent, not that the password is
            // wrong.
            let reseal = |payload_hex: &str, live_key: &SymmetricKey| -> Result<Vec<u8>> {
                let sealed = hex::decode(payload_hex).map_err(|_| VaultError::BackupValidation)?;
                let plain = crypto::decrypt(&bundle_key, &sealed)
                    .map_err(|_| VaultError::BackupValidation)?;
                Ok(crypto::encrypt(live_key, &plain)?)
            };

            let tx = db.conn_mut().transaction().map_err(haven_store::StoreError::from)?;

            for (table, rows) in [
                ("user_profile", &bundle.profile),
                ("app_settings", &bundle.settings),
                ("support_network", &bundle.support_network),
            ] {
                for row in rows {
                    tx.execute(
                        &format!(
                            "INSERT OR REPLACE INTO {table} (id, payload, updated_at)
                             VALUES (1, ?1, ?2)"
                        ),
                        params![reseal(&row.payload_hex, key)?, row.updated_at],
                    )
                    .map_err(haven_store::StoreError::from)?;
                    stats.singletons_imported += 1;
                }
            }

            for row in &bundle.metrics {
                tx.execute(
                    "INSERT OR REPLACE INTO daily_metrics (date, payload, updated_at)
                     VALUES (?1, ?2, ?3)",
                    params![row.date, reseal(&row.payload_hex, key)?, row.updated_at],
                )
                .map_err(haven_store::StoreError::from)?;
                stats.metrics_imported += 1;
            }

            for row in &bundle.journal {
                tx.execute(
                    "INSERT OR REPLACE INTO journal_entries (id, created_at, payload)
                     VALUES (?1, ?2, ?3)",
                    params![row.id, row.created_at, reseal(&row.payload_hex, key)?],
                )
                .map_err(haven_store::StoreError::from)?;
                stats.journal_imported += 1;
            }

            for row in &bundle.chat {
                tx.execute(
                    "INSERT OR REPLACE INTO chat_messages (id, session_id, timestamp, payload)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        row.id,
                        row.session_id,
                        row.timestamp,
                        reseal(&row.payload_hex, key)?
                    ],
                )
                .map_err(haven_store::StoreError::from)?;
                stats.chat_imported += 1;
            }

            for row in &bundle.memories {
                tx.execute(
                    "INSERT OR REPLACE INTO daily_memories
                         (date, covering_from, covering_to, created_at, payload)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        row.date,
                        row.covering_from,
                        row.covering_to,
                        row.created_at,
                        reseal(&row.payload_hex, key)?
                    ],
                )
                .map_err(haven_store::StoreError::from)?;
                stats.memories_imported += 1;
            }

            tx.commit().map_err(haven_store::StoreError::from)?;

            tracing::info!(
                metrics = stats.metrics_imported,
                journal = stats.journal_imported,
                chat = stats.chat_imported,
                memories = stats.memories_imported,
                "backup imported"
            );
            Ok(stats)
        });

        bundle_key.zeroize();
        result
    }
}

/// A missing singleton is simply not exported; other storage errors abort.
fn absent_ok(
    result: std::result::Result<haven_store::SingletonRow, haven_store::StoreError>,
) -> Result<Option<haven_store::SingletonRow>> {
    match result {
        Ok(row) => Ok(Some(row)),
        Err(haven_store::StoreError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Reject a bundle whose index fields do not parse, before any row is
/// written.
fn validate_index_fields(bundle: &BackupBundle) -> Result<()> {
    let date_ok = |s: &str| NaiveDate::parse_from_str(s, DATE_FMT).is_ok();
    let ts_ok = |s: &str| DateTime::parse_from_rfc3339(s).is_ok();
    let id_ok = |s: &str| Uuid::parse_str(s).is_ok();

    let valid = bundle.metrics.iter().all(|m| date_ok(&m.date) && ts_ok(&m.updated_at))
        && bundle
            .journal
            .iter()
            .all(|j| id_ok(&j.id) && ts_ok(&j.created_at))
        && bundle
            .chat
            .iter()
            .all(|c| id_ok(&c.id) && ts_ok(&c.timestamp) && !c.session_id.is_empty())
        && bundle.memories.iter().all(|m| {
            date_ok(&m.date) && date_ok(&m.covering_from) && date_ok(&m.covering_to) && ts_ok(&m.created_at)
        });

    if valid {
        Ok(())
    } else {
        tracing::warn!("backup document contains unparseable index fields");
        Err(VaultError::BackupValidation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, DailyMetric, JournalEntry, MessageRole, UserProfile};
    use haven_store::Database;

    fn populated_vault() -> Vault {
        let vault = Vault::new(Database::open_in_memory().unwrap());
        vault.create("source-pw").unwrap();

        vault
            .save_profile(&UserProfile {
                display_name: "Robin".to_string(),
                ..Default::default()
            })
            .unwrap();
        vault
            .save_metric(&DailyMetric {
                date: NaiveDate::from_ymd_opt(2026, 8, 5).unwrap(),
                mood: Some(6),
                sobriety_maintained: true,
                habits: Default::default(),
                craving_intensity: None,
                sleep_quality: None,
                anxiety_level: None,
                notes: Some("walked".to_string()),
            })
            .unwrap();
        vault
            .add_journal_entry(&JournalEntry::new("exported thoughts", vec![]))
            .unwrap();
        vault
            .append_chat_message(&ChatMessage::new(
                crate::models::new_session_id(),
                MessageRole::User,
                "hello",
            ))
            .unwrap();
        vault
    }

    #[test]
    fn export_import_round_trip() {
        let source = populated_vault();
        let bundle = source.export_backup("bundle-pw").unwrap();

        let target = Vault::new(Database::open_in_memory().unwrap());
        target.create("target-pw").unwrap();
        let stats = target.import_backup(&bundle, "bundle-pw").unwrap();

        assert_eq!(stats.metrics_imported, 1);
        assert_eq!(stats.journal_imported, 1);
        assert_eq!(stats.chat_imported, 1);

        // records decrypt under the target vault's own key
        assert_eq!(
            target.get_profile().unwrap().unwrap().display_name,
            "Robin"
        );
        assert_eq!(
            target.recent_journal_entries(1).unwrap()[0].text,
            "exported thoughts"
        );

        // and survive a lock/unlock of the target password
        target.lock();
        target.unlock("target-pw").unwrap();
        assert!(target.get_profile().unwrap().is_some());
    }

    #[test]
    fn wrong_bundle_password_is_distinct_error() {
        let source = populated_vault();
        let bundle = source.export_backup("bundle-pw").unwrap();

        let target = Vault::new(Database::open_in_memory().unwrap());
        target.create("target-pw").unwrap();

        assert!(matches!(
            target.import_backup(&bundle, "nope"),
            Err(VaultError::ImportPassword)
        ));
        // nothing was written
        assert!(target.get_profile().unwrap().is_none());
    }

    #[test]
    fn malformed_document_is_validation_error() {
        let target = Vault::new(Database::open_in_memory().unwrap());
        target.create("target-pw").unwrap();

        for junk in ["not json", "{}", "{\"created_at\": 3}"] {
            assert!(matches!(
                target.import_backup(junk, "pw"),
                Err(VaultError::BackupValidation)
            ));
        }
    }

    #[test]
    fn bad_index_fields_fail_validation_before_password_check() {
        let source = populated_vault();
        let bundle = source.export_backup("bundle-pw").unwrap();
        let tampered = bundle.replace("2026-08-05", "not-a-date");

        let target = Vault::new(Database::open_in_memory().unwrap());
        target.create("target-pw").unwrap();

        // even with the wrong password, shape validation reports first
        assert!(matches!(
            target.import_backup(&tampered, "wrong-pw"),
            Err(VaultError::BackupValidation)
        ));
    }

    #[test]
    fn import_requires_unlocked_vault() {
        let source = populated_vault();
        let bundle = source.export_backup("bundle-pw").unwrap();

        let target = Vault::new(Database::open_in_memory().unwrap());
        target.create("target-pw").unwrap();
        target.lock();

        assert!(matches!(
            target.import_backup(&bundle, "bundle-pw"),
            Err(VaultError::Locked)
        ));
    }
}
