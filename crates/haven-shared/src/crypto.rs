use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::constants::{NONCE_SIZE, SALT_SIZE};
use crate::error::CryptoError;

pub type SymmetricKey = [u8; 32];

pub fn generate_symmetric_key() -> SymmetricKey {
    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

// Returns nonce || ciphertext (24 bytes nonce prepended)
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt a `nonce || ciphertext` blob.
///
/// An [`CryptoError::Authentication`] here means either the key is wrong or
/// the blob was tampered with. This is the only way a wrong password is
/// detected for bulk data, and it must be treated as terminal, not retried.
pub fn decrypt(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::Authentication);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Authentication)
}

/// PBKDF2-HMAC-SHA256 password stretching.
///
/// Deterministic: the same password, salt, and iteration count always yield
/// the same key. The iteration count is persisted alongside the salt.
pub fn derive_password_key(password: &str, salt: &[u8], iterations: u32) -> SymmetricKey {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

// BLAKE3 KDF with domain separation
pub fn derive_subkey(context: &str, material: &[u8]) -> SymmetricKey {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(material);
    let hash = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&hash.as_bytes()[..32]);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_symmetric_key();
        let plaintext = b"a quiet place to keep things";

        let encrypted = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &encrypted).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = generate_symmetric_key();
        let key2 = generate_symmetric_key();
        let plaintext = b"journal entry";

        let encrypted = encrypt(&key1, plaintext).unwrap();
        assert!(matches!(
            decrypt(&key2, &encrypted),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = generate_symmetric_key();
        let plaintext = b"important data";

        let mut encrypted = encrypt(&key, plaintext).unwrap();
        let len = encrypted.len();
        encrypted[len - 1] ^= 0xFF;

        assert!(decrypt(&key, &encrypted).is_err());
    }

    #[test]
    fn test_empty_data_fails() {
        let key = generate_symmetric_key();
        assert!(decrypt(&key, &[]).is_err());
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = generate_symmetric_key();
        let a = encrypt(&key, b"same plaintext").unwrap();
        let b = encrypt(&key, b"same plaintext").unwrap();
        // random nonce: two encryptions of the same plaintext never collide
        assert_ne!(a, b);
    }

    #[test]
    fn test_password_key_deterministic() {
        let salt = [7u8; SALT_SIZE];
        let key1 = derive_password_key("hunter2", &salt, 1_000);
        let key2 = derive_password_key("hunter2", &salt, 1_000);
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_password_key_varies_with_inputs() {
        let salt_a = [1u8; SALT_SIZE];
        let salt_b = [2u8; SALT_SIZE];
        let base = derive_password_key("hunter2", &salt_a, 1_000);
        assert_ne!(base, derive_password_key("hunter3", &salt_a, 1_000));
        assert_ne!(base, derive_password_key("hunter2", &salt_b, 1_000));
        assert_ne!(base, derive_password_key("hunter2", &salt_a, 1_001));
    }

    #[test]
    fn test_subkey_derivation_deterministic() {
        let material = b"seed material";
        let key1 = derive_subkey("haven-test-context", material);
        let key2 = derive_subkey("haven-test-context", material);
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_different_contexts_different_keys() {
        let material = b"seed material";
        let key1 = derive_subkey("context-1", material);
        let key2 = derive_subkey("context-2", material);
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_nonce_prepended() {
        let key = generate_symmetric_key();
        let encrypted = encrypt(&key, b"test").unwrap();
        // nonce (24) + ciphertext (4 + 16 tag)
        assert!(encrypted.len() >= NONCE_SIZE + 4 + 16);
    }
}
