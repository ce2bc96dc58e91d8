use thiserror::Error;

use haven_shared::{CryptoError, MnemonicError};
use haven_store::StoreError;

/// Errors surfaced by the vault session.
///
/// User-facing messages stay generic on purpose: an unlock failure never
/// reveals whether the password was wrong or the vault corrupted, and no
/// variant carries raw internal error text meant for display. The full
/// detail goes to the logs at the site of the failure.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Wrong password, or tampered credential material; callers must not
    /// be able to tell the difference.
    #[error("Incorrect password")]
    IncorrectPassword,

    /// Operation requires an unlocked vault. Callers should redirect to
    /// unlock, not retry.
    #[error("Vault is locked")]
    Locked,

    /// `create` called when a credential already exists.
    #[error("A vault already exists")]
    AlreadyInitialized,

    /// Credential-requiring operation on a vault that was never created.
    #[error("No vault exists yet")]
    Uninitialized,

    /// Operation not valid in the current session state (e.g. mnemonic
    /// reset while unlocked).
    #[error("Operation not valid in the current vault state")]
    InvalidState,

    /// The supplied recovery phrase does not unwrap this vault's key.
    #[error("Recovery phrase does not match this vault")]
    RecoveryMismatch,

    #[error("Invalid recovery phrase")]
    Mnemonic(#[from] MnemonicError),

    /// Backup document is malformed or has the wrong shape.
    #[error("Invalid backup file")]
    BackupValidation,

    /// Backup shape was valid but the password does not decrypt it.
    #[error("Incorrect password for this backup")]
    ImportPassword,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A session mutex was poisoned by a panic elsewhere.
    #[error("Vault session state is unavailable")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, VaultError>;
