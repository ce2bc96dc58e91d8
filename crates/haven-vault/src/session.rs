//! The vault session: key lifecycle and the encrypt/decrypt boundary.
//!
//! Exactly one [`Vault`] exists per process, constructed at startup and
//! passed by reference to anything needing vault access. It is the single
//! owner of the in-memory master key; every domain read/write goes through
//! it and is individually decrypted-on-read / encrypted-on-write. Nothing
//! below this layer ever sees plaintext, and nothing above it ever sees
//! the key.
//!
//! State machine: `Uninitialized` (no credential) → `Locked` (credential,
//! no key in memory) → `Unlocked` (key in memory) → `Locked` again on
//! explicit lock, idle timeout, or teardown.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use haven_shared::constants::{KDF_DEFAULT_ITERATIONS, KDF_MIN_ITERATIONS};
use haven_shared::crypto::{self, SymmetricKey};
use haven_shared::{CryptoError, RecoveryPhrase};
use haven_store::{
    ChatRow, CredentialRow, Database, JournalRow, MemoryRow, MetricRow, SingletonRow, StoreError,
};

use crate::error::{Result, VaultError};
use crate::models::{
    session_window_prefix, AppSettings, ChatMessage, DailyMemory, DailyMetric, JournalEntry,
    SupportNetwork, UserProfile,
};

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    Uninitialized,
    Locked,
    Unlocked,
}

/// The master key, zeroized the moment it is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
struct MasterKey(SymmetricKey);

struct VaultInner {
    db: Database,
    key: Option<MasterKey>,
    last_activity: Instant,
    auto_lock: Option<Duration>,
}

impl VaultInner {
    /// Drop the key if the idle deadline has passed. Called before every
    /// keyed operation so a stale key can never be used.
    fn enforce_auto_lock(&mut self) {
        if self.key.is_none() {
            return;
        }
        if let Some(timeout) = self.auto_lock {
            if self.last_activity.elapsed() >= timeout {
                tracing::info!("idle timeout reached, locking vault");
                self.key = None;
            }
        }
    }
}

/// The vault session manager.
pub struct Vault {
    inner: Mutex<VaultInner>,
}

impl Vault {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Mutex::new(VaultInner {
                db,
                key: None,
                last_activity: Instant::now(),
                auto_lock: None,
            }),
        }
    }

    /// Open the default on-disk database and wrap it in a session.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Database::new()?))
    }

    pub(crate) fn lock_inner(&self) -> Result<MutexGuard<'_, VaultInner>> {
        self.inner.lock().map_err(|_| VaultError::Poisoned)
    }

    pub fn state(&self) -> Result<VaultState> {
        let mut inner = self.lock_inner()?;
        inner.enforce_auto_lock();
        if inner.key.is_some() {
            Ok(VaultState::Unlocked)
        } else if inner.db.has_credential()? {
            Ok(VaultState::Locked)
        } else {
            Ok(VaultState::Uninitialized)
        }
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self.state(), Ok(VaultState::Unlocked))
    }

    /// Record user activity for the idle timer. Driven by the UI's
    /// activity watcher, not by vault operations themselves.
    pub fn note_activity(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.last_activity = Instant::now();
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle transitions
    // -----------------------------------------------------------------------

    /// Create a fresh vault. Valid only when no credential exists.
    ///
    /// Generates the master key and the recovery phrase, writes the
    /// credential, and leaves the session unlocked. The phrase is returned
    /// exactly once and is never retrievable again.
    pub fn create(&self, password: &str) -> Result<RecoveryPhrase> {
        let mut inner = self.lock_inner()?;
        if inner.db.has_credential()? {
            return Err(VaultError::AlreadyInitialized);
        }

        let master = crypto::generate_symmetric_key();
        let salt = crypto::generate_salt();
        let mut pw_key = crypto::derive_password_key(password, &salt, KDF_DEFAULT_ITERATIONS);

        let phrase = RecoveryPhrase::generate()?;
        let mut recovery_key = phrase.wrapping_key();

        let now = Utc::now();
        let credential = CredentialRow {
            kdf_salt: salt.to_vec(),
            kdf_iterations: KDF_DEFAULT_ITERATIONS,
            pw_wrapped_master: crypto::encrypt(&pw_key, &master)?,
            mn_wrapped_master: crypto::encrypt(&recovery_key, &master)?,
            wrapped_recovery_key: crypto::encrypt(&master, &recovery_key)?,
            created_at: now,
            updated_at: now,
        };
        inner.db.put_credential(&credential)?;

        pw_key.zeroize();
        recovery_key.zeroize();

        inner.key = Some(MasterKey(master));
        inner.last_activity = Instant::now();
        inner.auto_lock = auto_lock_duration(&AppSettings::default());

        tracing::info!("vault created");
        Ok(phrase)
    }

    /// Unlock with the password. The stored password-wrapped master key is
    /// the verification value: if the derived key fails to unwrap it, the
    /// caller learns only "incorrect password"; a corrupted credential is
    /// deliberately indistinguishable from a wrong password.
    pub fn unlock(&self, password: &str) -> Result<()> {
        let mut inner = self.lock_inner()?;

        let credential = match inner.db.get_credential() {
            Ok(credential) => credential,
            Err(StoreError::NotFound) => return Err(VaultError::Uninitialized),
            Err(e) => return Err(e.into()),
        };

        if credential.kdf_iterations < KDF_MIN_ITERATIONS {
            tracing::warn!(
                iterations = credential.kdf_iterations,
                "credential iteration count below minimum; treating vault as corrupted"
            );
            return Err(VaultError::IncorrectPassword);
        }

        let mut pw_key = crypto::derive_password_key(
            password,
            &credential.kdf_salt,
            credential.kdf_iterations,
        );
        let unwrapped = crypto::decrypt(&pw_key, &credential.pw_wrapped_master);
        pw_key.zeroize();

        let mut master_bytes = match unwrapped {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::warn!(operation = "unlock", "master key unwrap failed");
                return Err(VaultError::IncorrectPassword);
            }
        };
        let master = key_from_slice(&master_bytes)?;
        master_bytes.zeroize();

        inner.auto_lock = match load_settings(&inner.db, &master) {
            Ok(Some(settings)) => auto_lock_duration(&settings),
            Ok(None) => auto_lock_duration(&AppSettings::default()),
            Err(e) => {
                tracing::warn!(error = %e, "could not read settings at unlock, using defaults");
                auto_lock_duration(&AppSettings::default())
            }
        };
        inner.key = Some(MasterKey(master));
        inner.last_activity = Instant::now();

        tracing::info!("vault unlocked");
        Ok(())
    }

    /// Drop the in-memory key. Idempotent.
    pub fn lock(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.key.take().is_some() {
                tracing::info!("vault locked");
            }
        }
    }

    /// Change the password. Generates a fresh master key and re-encrypts
    /// every record in every collection before the new credential becomes
    /// visible; an interrupted sweep leaves the vault fully readable under
    /// the old password. Domain writes are blocked for the duration (the
    /// session mutex is held across the sweep).
    pub fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let mut inner = self.lock_inner()?;
        inner.enforce_auto_lock();
        if inner.key.is_none() {
            return Err(VaultError::Locked);
        }

        let credential = inner.db.get_credential()?;
        let mut old_pw_key = crypto::derive_password_key(
            old_password,
            &credential.kdf_salt,
            credential.kdf_iterations,
        );
        let unwrapped = crypto::decrypt(&old_pw_key, &credential.pw_wrapped_master);
        old_pw_key.zeroize();

        let mut old_master_bytes = unwrapped.map_err(|_| {
            tracing::warn!(operation = "change_password", "old password failed verification");
            VaultError::IncorrectPassword
        })?;
        let old_master = key_from_slice(&old_master_bytes)?;
        old_master_bytes.zeroize();

        let new_key = rotate_master(
            &mut inner.db,
            &old_master,
            &credential.wrapped_recovery_key,
            new_password,
            credential.created_at,
        )?;

        inner.key = Some(new_key);
        inner.last_activity = Instant::now();
        tracing::info!("password changed, all records re-encrypted");
        Ok(())
    }

    /// Recover a locked vault with the 12-word phrase and set a new
    /// password. Behaves like [`Vault::change_password`] with the
    /// recovered master key standing in for the old password.
    pub fn reset_with_mnemonic(&self, phrase: &str, new_password: &str) -> Result<()> {
        let mut inner = self.lock_inner()?;
        inner.enforce_auto_lock();
        if inner.key.is_some() {
            return Err(VaultError::InvalidState);
        }

        let credential = match inner.db.get_credential() {
            Ok(credential) => credential,
            Err(StoreError::NotFound) => return Err(VaultError::Uninitialized),
            Err(e) => return Err(e.into()),
        };

        let phrase = RecoveryPhrase::parse(phrase)?;
        let mut recovery_key = phrase.wrapping_key();
        let unwrapped = crypto::decrypt(&recovery_key, &credential.mn_wrapped_master);
        recovery_key.zeroize();

        let mut master_bytes = unwrapped.map_err(|_| {
            tracing::warn!(
                operation = "reset_with_mnemonic",
                "recovery key failed to unwrap master key"
            );
            VaultError::RecoveryMismatch
        })?;
        let master = key_from_slice(&master_bytes)?;
        master_bytes.zeroize();

        let new_key = rotate_master(
            &mut inner.db,
            &master,
            &credential.wrapped_recovery_key,
            new_password,
            credential.created_at,
        )?;

        inner.key = Some(new_key);
        inner.last_activity = Instant::now();
        tracing::info!("vault recovered via phrase, all records re-encrypted");
        Ok(())
    }

    /// Delete every collection and the credential. Valid in any state.
    pub fn wipe(&self) -> Result<()> {
        let mut inner = self.lock_inner()?;
        inner.db.wipe_all()?;
        inner.key = None;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Domain operations (Unlocked only)
    // -----------------------------------------------------------------------

    pub(crate) fn with_unlocked<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Database, &SymmetricKey) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.lock_inner()?;
        inner.enforce_auto_lock();
        let inner = &*inner;
        let key = inner.key.as_ref().ok_or_else(|| {
            tracing::debug!(operation, "operation attempted while locked");
            VaultError::Locked
        })?;
        f(&inner.db, &key.0)
    }

    /// Like [`Vault::with_unlocked`] but with mutable database access, for
    /// callers that need a transaction (backup import).
    pub(crate) fn with_unlocked_mut<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Database, &SymmetricKey) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.lock_inner()?;
        inner.enforce_auto_lock();
        let inner = &mut *inner;
        let key = match inner.key.as_ref() {
            Some(key) => key.0,
            None => {
                tracing::debug!(operation, "operation attempted while locked");
                return Err(VaultError::Locked);
            }
        };
        f(&mut inner.db, &key)
    }

    pub fn get_profile(&self) -> Result<Option<UserProfile>> {
        self.with_unlocked("get_profile", |db, key| match db.get_profile_blob() {
            Ok(row) => Ok(Some(decrypt_value(key, &row.payload, "user_profile")?)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    pub fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        self.with_unlocked("save_profile", |db, key| {
            let row = SingletonRow {
                payload: encrypt_value(key, profile)?,
                updated_at: Utc::now(),
            };
            db.put_profile_blob(&row)?;
            Ok(())
        })
    }

    pub fn get_settings(&self) -> Result<AppSettings> {
        self.with_unlocked("get_settings", |db, key| {
            Ok(load_settings(db, key)?.unwrap_or_default())
        })
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        let mut inner = self.lock_inner()?;
        inner.enforce_auto_lock();
        let key = inner.key.as_ref().ok_or(VaultError::Locked)?;
        let row = SingletonRow {
            payload: encrypt_value(&key.0, settings)?,
            updated_at: Utc::now(),
        };
        inner.db.put_settings_blob(&row)?;
        // keep the idle deadline in sync with the stored setting
        inner.auto_lock = auto_lock_duration(settings);
        Ok(())
    }

    pub fn get_support_network(&self) -> Result<SupportNetwork> {
        self.with_unlocked("get_support_network", |db, key| match db.get_support_blob() {
            Ok(row) => decrypt_value(key, &row.payload, "support_network"),
            Err(StoreError::NotFound) => Ok(SupportNetwork::default()),
            Err(e) => Err(e.into()),
        })
    }

    pub fn save_support_network(&self, network: &SupportNetwork) -> Result<()> {
        self.with_unlocked("save_support_network", |db, key| {
            let row = SingletonRow {
                payload: encrypt_value(key, network)?,
                updated_at: Utc::now(),
            };
            db.put_support_blob(&row)?;
            Ok(())
        })
    }

    /// Insert or overwrite the check-in for its date.
    pub fn save_metric(&self, metric: &DailyMetric) -> Result<()> {
        self.with_unlocked("save_metric", |db, key| {
            let row = MetricRow {
                date: metric.date,
                payload: encrypt_value(key, metric)?,
                updated_at: Utc::now(),
            };
            db.upsert_metric(&row)?;
            Ok(())
        })
    }

    pub fn get_metric(&self, date: NaiveDate) -> Result<Option<DailyMetric>> {
        self.with_unlocked("get_metric", |db, key| match db.get_metric(date) {
            Ok(row) => Ok(Some(decrypt_value(key, &row.payload, "daily_metric")?)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    pub fn metrics_since(&self, from: NaiveDate) -> Result<Vec<DailyMetric>> {
        self.with_unlocked("metrics_since", |db, key| {
            db.metrics_since(from)?
                .iter()
                .map(|row| decrypt_value(key, &row.payload, "daily_metric"))
                .collect()
        })
    }

    pub fn recent_metrics(&self, limit: u32) -> Result<Vec<DailyMetric>> {
        self.with_unlocked("recent_metrics", |db, key| {
            db.recent_metrics(limit)?
                .iter()
                .map(|row| decrypt_value(key, &row.payload, "daily_metric"))
                .collect()
        })
    }

    pub fn add_journal_entry(&self, entry: &JournalEntry) -> Result<()> {
        self.with_unlocked("add_journal_entry", |db, key| {
            let row = JournalRow {
                id: entry.id,
                created_at: entry.created_at,
                payload: encrypt_value(key, entry)?,
            };
            db.insert_journal_entry(&row)?;
            Ok(())
        })
    }

    pub fn journal_entries_since(&self, from: DateTime<Utc>) -> Result<Vec<JournalEntry>> {
        self.with_unlocked("journal_entries_since", |db, key| {
            db.journal_entries_since(from)?
                .iter()
                .map(|row| decrypt_value(key, &row.payload, "journal_entry"))
                .collect()
        })
    }

    pub fn recent_journal_entries(&self, limit: u32) -> Result<Vec<JournalEntry>> {
        self.with_unlocked("recent_journal_entries", |db, key| {
            db.recent_journal_entries(limit)?
                .iter()
                .map(|row| decrypt_value(key, &row.payload, "journal_entry"))
                .collect()
        })
    }

    /// Append one message. Messages are persisted in the order the caller
    /// produces them; within a session that order is the send order.
    pub fn append_chat_message(&self, message: &ChatMessage) -> Result<()> {
        self.with_unlocked("append_chat_message", |db, key| {
            let row = ChatRow {
                id: message.id,
                session_id: message.session_id.clone(),
                timestamp: message.timestamp,
                payload: encrypt_value(key, message)?,
            };
            db.insert_chat_message(&row)?;
            Ok(())
        })
    }

    pub fn session_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        self.with_unlocked("session_messages", |db, key| {
            db.chat_messages_for_session(session_id)?
                .iter()
                .map(|row| decrypt_value(key, &row.payload, "chat_message"))
                .collect()
        })
    }

    /// Messages of every session created on or after `from`.
    pub fn chat_messages_in_sessions_since(&self, from: NaiveDate) -> Result<Vec<ChatMessage>> {
        self.with_unlocked("chat_messages_in_sessions_since", |db, key| {
            db.chat_messages_in_sessions_since(&session_window_prefix(from))?
                .iter()
                .map(|row| decrypt_value(key, &row.payload, "chat_message"))
                .collect()
        })
    }

    pub fn recent_session_ids(&self, limit: u32) -> Result<Vec<String>> {
        self.with_unlocked("recent_session_ids", |db, _| {
            Ok(db.recent_session_ids(limit)?)
        })
    }

    pub fn latest_memory(&self) -> Result<Option<DailyMemory>> {
        self.with_unlocked("latest_memory", |db, key| match db.latest_memory()? {
            Some(row) => Ok(Some(decrypt_value(key, &row.payload, "daily_memory")?)),
            None => Ok(None),
        })
    }

    pub fn recent_memories(&self, limit: u32) -> Result<Vec<DailyMemory>> {
        self.with_unlocked("recent_memories", |db, key| {
            db.recent_memories(limit)?
                .iter()
                .map(|row| decrypt_value(key, &row.payload, "daily_memory"))
                .collect()
        })
    }

    /// Persist a memory only if none exists for its date yet. Returns
    /// whether the row was written; a concurrent writer that lost the race
    /// sees `false` and must not treat it as an error.
    pub fn insert_memory_if_absent(&self, memory: &DailyMemory) -> Result<bool> {
        self.with_unlocked("insert_memory_if_absent", |db, key| {
            let row = MemoryRow {
                date: memory.date,
                covering_from: memory.covering_from,
                covering_to: memory.covering_to,
                created_at: memory.created_at,
                payload: encrypt_value(key, memory)?,
            };
            Ok(db.insert_memory_if_absent(&row)?)
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn auto_lock_duration(settings: &AppSettings) -> Option<Duration> {
    settings
        .auto_lock_minutes
        .map(|minutes| Duration::from_secs(u64::from(minutes) * 60))
}

fn load_settings(db: &Database, key: &SymmetricKey) -> Result<Option<AppSettings>> {
    match db.get_settings_blob() {
        Ok(row) => Ok(Some(decrypt_value(key, &row.payload, "app_settings")?)),
        Err(StoreError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn encrypt_value<T: Serialize>(key: &SymmetricKey, value: &T) -> Result<Vec<u8>> {
    let plain = serde_json::to_vec(value)?;
    Ok(crypto::encrypt(key, &plain)?)
}

fn decrypt_value<T: DeserializeOwned>(
    key: &SymmetricKey,
    payload: &[u8],
    record: &'static str,
) -> Result<T> {
    let plain = crypto::decrypt(key, payload).map_err(|e| {
        tracing::error!(record, "record failed authentication on decrypt");
        VaultError::Crypto(e)
    })?;
    Ok(serde_json::from_slice(&plain)?)
}

fn key_from_slice(bytes: &[u8]) -> Result<SymmetricKey> {
    if bytes.len() != 32 {
        tracing::error!(len = bytes.len(), "unwrapped key has unexpected length");
        return Err(VaultError::Crypto(CryptoError::Authentication));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(bytes);
    Ok(key)
}

/// Generate a fresh master key, re-encrypt every payload under it, and
/// install the new credential, all inside the store's rotation
/// transaction. The recovery wrapping key is carried forward so the
/// original phrase keeps working after any number of password changes.
fn rotate_master(
    db: &mut Database,
    old_master: &SymmetricKey,
    wrapped_recovery_key: &[u8],
    new_password: &str,
    created_at: DateTime<Utc>,
) -> Result<MasterKey> {
    let mut recovery_key_bytes = crypto::decrypt(old_master, wrapped_recovery_key).map_err(|e| {
        tracing::error!("stored recovery wrapping key failed to decrypt");
        VaultError::Crypto(e)
    })?;
    let mut recovery_key = key_from_slice(&recovery_key_bytes)?;
    recovery_key_bytes.zeroize();

    let new_master = crypto::generate_symmetric_key();
    let new_salt = crypto::generate_salt();
    let mut new_pw_key =
        crypto::derive_password_key(new_password, &new_salt, KDF_DEFAULT_ITERATIONS);

    let new_credential = CredentialRow {
        kdf_salt: new_salt.to_vec(),
        kdf_iterations: KDF_DEFAULT_ITERATIONS,
        pw_wrapped_master: crypto::encrypt(&new_pw_key, &new_master)?,
        mn_wrapped_master: crypto::encrypt(&recovery_key, &new_master)?,
        wrapped_recovery_key: crypto::encrypt(&new_master, &recovery_key)?,
        created_at,
        updated_at: Utc::now(),
    };
    new_pw_key.zeroize();
    recovery_key.zeroize();

    db.rotate_payloads::<VaultError, _>(&new_credential, |payload| {
        let plain = crypto::decrypt(old_master, payload)?;
        Ok(crypto::encrypt(&new_master, &plain)?)
    })?;

    Ok(MasterKey(new_master))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JournalTag, MessageRole};

    fn fresh_vault() -> Vault {
        Vault::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn fresh_vault_scenario() {
        let vault = fresh_vault();
        assert_eq!(vault.state().unwrap(), VaultState::Uninitialized);

        let phrase = vault.create("pw1").unwrap();
        assert_eq!(phrase.words().count(), 12);
        assert_eq!(vault.state().unwrap(), VaultState::Unlocked);

        vault.lock();
        assert_eq!(vault.state().unwrap(), VaultState::Locked);

        assert!(matches!(
            vault.unlock("wrong"),
            Err(VaultError::IncorrectPassword)
        ));
        assert_eq!(vault.state().unwrap(), VaultState::Locked);

        vault.unlock("pw1").unwrap();
        assert_eq!(vault.state().unwrap(), VaultState::Unlocked);
    }

    #[test]
    fn create_twice_is_rejected() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();
        assert!(matches!(
            vault.create("pw2"),
            Err(VaultError::AlreadyInitialized)
        ));
    }

    #[test]
    fn unlock_uninitialized_is_rejected() {
        let vault = fresh_vault();
        assert!(matches!(
            vault.unlock("pw"),
            Err(VaultError::Uninitialized)
        ));
    }

    #[test]
    fn lock_is_idempotent() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();
        vault.lock();
        vault.lock();
        assert_eq!(vault.state().unwrap(), VaultState::Locked);
    }

    #[test]
    fn domain_ops_fail_while_locked() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();
        vault.lock();

        assert!(matches!(vault.get_profile(), Err(VaultError::Locked)));
        assert!(matches!(
            vault.add_journal_entry(&JournalEntry::new("x", vec![])),
            Err(VaultError::Locked)
        ));
    }

    #[test]
    fn records_round_trip_through_encryption() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();

        let profile = UserProfile {
            display_name: "Sam".to_string(),
            onboarding_complete: true,
            ..Default::default()
        };
        vault.save_profile(&profile).unwrap();
        assert_eq!(vault.get_profile().unwrap().unwrap(), profile);

        let entry = JournalEntry::new("rough morning", vec![JournalTag::Trigger]);
        vault.add_journal_entry(&entry).unwrap();
        let entries = vault.recent_journal_entries(5).unwrap();
        assert_eq!(entries[0].text, "rough morning");
        assert_eq!(entries[0].tags, vec![JournalTag::Trigger]);
    }

    #[test]
    fn metric_same_date_overwrites() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();

        let mut metric = DailyMetric {
            date,
            mood: Some(4),
            sobriety_maintained: true,
            habits: Default::default(),
            craving_intensity: None,
            sleep_quality: None,
            anxiety_level: None,
            notes: None,
        };
        vault.save_metric(&metric).unwrap();
        metric.mood = Some(8);
        vault.save_metric(&metric).unwrap();

        assert_eq!(vault.recent_metrics(10).unwrap().len(), 1);
        assert_eq!(vault.get_metric(date).unwrap().unwrap().mood, Some(8));
    }

    #[test]
    fn password_change_keeps_records_and_revokes_old_password() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();
        let entry = JournalEntry::new("before rotation", vec![]);
        vault.add_journal_entry(&entry).unwrap();

        vault.change_password("pw1", "pw2").unwrap();

        // still readable in the same session
        assert_eq!(
            vault.recent_journal_entries(1).unwrap()[0].text,
            "before rotation"
        );

        vault.lock();
        assert!(matches!(
            vault.unlock("pw1"),
            Err(VaultError::IncorrectPassword)
        ));
        vault.unlock("pw2").unwrap();
        assert_eq!(
            vault.recent_journal_entries(1).unwrap()[0].text,
            "before rotation"
        );
    }

    #[test]
    fn password_change_rejects_wrong_old_password() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();
        assert!(matches!(
            vault.change_password("nope", "pw2"),
            Err(VaultError::IncorrectPassword)
        ));

        // old password still works
        vault.lock();
        vault.unlock("pw1").unwrap();
    }

    #[test]
    fn recovery_scenario() {
        let vault = fresh_vault();
        let phrase = vault.create("pw1").unwrap();
        let words = phrase.as_str().to_string();
        vault.add_journal_entry(&JournalEntry::new("keep me", vec![])).unwrap();
        vault.lock();

        vault.reset_with_mnemonic(&words, "pw2").unwrap();
        assert_eq!(vault.recent_journal_entries(1).unwrap()[0].text, "keep me");

        vault.lock();
        assert!(matches!(
            vault.unlock("pw1"),
            Err(VaultError::IncorrectPassword)
        ));
        vault.unlock("pw2").unwrap();

        // the same phrase still recovers the vault after the rotation
        vault.lock();
        vault.reset_with_mnemonic(&words, "pw3").unwrap();
        assert_eq!(vault.recent_journal_entries(1).unwrap()[0].text, "keep me");
    }

    #[test]
    fn recovery_with_wrong_phrase_fails_closed() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();
        vault.lock();

        let other = RecoveryPhrase::generate().unwrap();
        assert!(matches!(
            vault.reset_with_mnemonic(other.as_str(), "pw2"),
            Err(VaultError::RecoveryMismatch)
        ));
        vault.unlock("pw1").unwrap();
    }

    #[test]
    fn reset_requires_locked_state() {
        let vault = fresh_vault();
        let phrase = vault.create("pw1").unwrap();
        assert!(matches!(
            vault.reset_with_mnemonic(phrase.as_str(), "pw2"),
            Err(VaultError::InvalidState)
        ));
    }

    #[test]
    fn wipe_returns_to_uninitialized() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();
        vault.save_profile(&UserProfile::default()).unwrap();

        vault.wipe().unwrap();
        assert_eq!(vault.state().unwrap(), VaultState::Uninitialized);

        // a new vault can be created and sees none of the old data
        vault.create("pw2").unwrap();
        assert!(vault.get_profile().unwrap().is_none());
    }

    #[test]
    fn zero_minute_auto_lock_locks_on_next_operation() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();

        let settings = AppSettings {
            auto_lock_minutes: Some(0),
            ..Default::default()
        };
        vault.save_settings(&settings).unwrap();

        // deadline of zero has already passed by the next keyed call
        assert!(matches!(vault.get_profile(), Err(VaultError::Locked)));
        assert_eq!(vault.state().unwrap(), VaultState::Locked);
    }

    #[test]
    fn chat_messages_keep_session_order() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();

        let session = crate::models::new_session_id();
        for text in ["first", "second", "third"] {
            vault
                .append_chat_message(&ChatMessage::new(&session, MessageRole::User, text))
                .unwrap();
        }

        let messages = vault.session_messages(&session).unwrap();
        let texts: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn memory_conditional_insert_reports_loser() {
        let vault = fresh_vault();
        vault.create("pw1").unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let memory = DailyMemory {
            date,
            covering_from: date.pred_opt().unwrap(),
            covering_to: date,
            conversation_summary: None,
            journal_summary: None,
            checkin_summary: None,
            user_facts: vec!["fact".to_string()],
            follow_ups: vec![],
            emotional_state: "steady".to_string(),
            notable_patterns: vec![],
            created_at: Utc::now(),
        };

        assert!(vault.insert_memory_if_absent(&memory).unwrap());
        assert!(!vault.insert_memory_if_absent(&memory).unwrap());
        assert_eq!(vault.latest_memory().unwrap().unwrap().date, date);
    }
}
