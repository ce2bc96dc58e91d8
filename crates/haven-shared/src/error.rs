use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Authentication failed: ciphertext rejected or wrong key")]
    Authentication,

    #[error("Key derivation parameters rejected: {0}")]
    KdfParams(String),
}

#[derive(Error, Debug)]
pub enum MnemonicError {
    #[error("Failed to generate recovery phrase")]
    Generation,

    #[error("Recovery phrase is not a valid 12-word phrase")]
    InvalidPhrase,
}
