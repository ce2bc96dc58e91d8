//! Row structs persisted in the local SQLite database.
//!
//! These are *storage* shapes: a handful of plaintext index columns plus an
//! opaque encrypted `payload`. The decrypted domain structs live in
//! `haven-vault`; this crate never sees them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Vault credential
// ---------------------------------------------------------------------------

/// Key-management material for the vault. Single row, created at vault
/// setup, replaced wholesale on password change or mnemonic reset, deleted
/// only by a full wipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRow {
    /// PBKDF2 salt (16 bytes, stored as hex).
    pub kdf_salt: Vec<u8>,
    /// PBKDF2 iteration count used with `kdf_salt`.
    pub kdf_iterations: u32,
    /// Master key wrapped under the password-derived key. Unwrapping this
    /// blob is also the password verification check.
    pub pw_wrapped_master: Vec<u8>,
    /// Master key wrapped under the recovery-phrase-derived key.
    pub mn_wrapped_master: Vec<u8>,
    /// The recovery wrapping key itself, encrypted under the master key, so
    /// a password change can re-wrap a fresh master key without the phrase.
    pub wrapped_recovery_key: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Ciphertext rows
// ---------------------------------------------------------------------------

/// One check-in per calendar date. The date is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricRow {
    pub date: NaiveDate,
    pub payload: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

/// A journal entry. Content (text, tags, sentiment) is in the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub payload: Vec<u8>,
}

/// A chat message. Role and text are in the payload; the session id and
/// timestamp stay in the clear for ordering and windowed queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRow {
    pub id: Uuid,
    /// Lexicographically sortable id that encodes the session's creation
    /// time (see `haven-vault`'s session id scheme).
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Vec<u8>,
}

/// One extraction-pipeline digest per calendar date. The covering window
/// `[covering_from, covering_to)` stays in the clear so the pipeline can
/// compute its next checkpoint without decrypting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryRow {
    pub date: NaiveDate,
    pub covering_from: NaiveDate,
    pub covering_to: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub payload: Vec<u8>,
}

/// A singleton blob (profile, settings, support network).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SingletonRow {
    pub payload: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}
