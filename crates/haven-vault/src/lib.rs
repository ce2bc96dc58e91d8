//! # haven-vault
//!
//! The vault session manager: the single owner of the in-memory master key
//! and the encrypt/decrypt boundary for every domain record.
//!
//! Construct one [`Vault`] at process start and pass it by reference to
//! anything needing vault access. All reads and writes of profile, metrics,
//! journal, chat, support network, settings, and daily memories go through
//! its methods; each call individually decrypts-on-read or
//! encrypts-on-write, and nothing is cached in plaintext beyond the scope
//! of the call.

pub mod backup;
pub mod models;
pub mod session;

mod error;

pub use backup::{BackupBundle, ImportStats};
pub use error::{Result, VaultError};
pub use session::{Vault, VaultState};
