//! # haven-shared
//!
//! Crypto primitives, the recovery-phrase codec, and domain types shared by
//! every Haven crate.
//!
//! Everything the vault persists is encrypted with XChaCha20-Poly1305 under
//! a 256-bit master key. The master key is never stored directly: it is
//! wrapped under a key stretched from the user's password (PBKDF2) and,
//! separately, under a key derived from a 12-word recovery phrase.

pub mod constants;
pub mod crypto;
pub mod mnemonic;
pub mod types;

mod error;

pub use crypto::SymmetricKey;
pub use error::{CryptoError, MnemonicError};
pub use mnemonic::RecoveryPhrase;
