/// Application name
pub const APP_NAME: &str = "Haven";

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// PBKDF2 salt size in bytes
pub const SALT_SIZE: usize = 16;

/// Default PBKDF2-HMAC-SHA256 iteration count for new vaults.
/// Persisted per-vault so it can be raised without breaking old vaults.
pub const KDF_DEFAULT_ITERATIONS: u32 = 310_000;

/// Lowest iteration count the vault will accept from stored credentials.
pub const KDF_MIN_ITERATIONS: u32 = 100_000;

/// Number of words in a recovery phrase (BIP-39, 128 bits of entropy)
pub const MNEMONIC_WORD_COUNT: usize = 12;

/// Entropy bytes backing a recovery phrase
pub const MNEMONIC_ENTROPY_SIZE: usize = 16;

/// Words the user must re-enter before a phrase counts as saved
pub const MNEMONIC_CHALLENGE_WORDS: usize = 3;

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_RECOVERY_WRAP: &str = "haven-recovery-wrap-v1";
