//! Recovery-phrase codec.
//!
//! A vault's master key can be recovered without the password through a
//! 12-word BIP-39 phrase generated once at vault creation. The phrase is
//! shown to the user exactly once, verified by re-entry of a random word
//! subset, and never written to durable storage in plaintext; the struct
//! zeroizes its memory on drop.

use bip39::{Language, Mnemonic};
use rand::seq::index::sample;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{
    KDF_CONTEXT_RECOVERY_WRAP, MNEMONIC_CHALLENGE_WORDS, MNEMONIC_ENTROPY_SIZE,
    MNEMONIC_WORD_COUNT,
};
use crate::crypto::{derive_subkey, SymmetricKey};
use crate::error::MnemonicError;

/// A validated 12-word recovery phrase. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RecoveryPhrase {
    phrase: String,
}

impl RecoveryPhrase {
    /// Generate a fresh phrase from 128 bits of OS entropy.
    pub fn generate() -> Result<Self, MnemonicError> {
        let mut entropy = [0u8; MNEMONIC_ENTROPY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut entropy);

        let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
            .map_err(|_| MnemonicError::Generation)?;
        entropy.zeroize();

        Ok(Self {
            phrase: mnemonic.to_string(),
        })
    }

    /// Parse and checksum-validate a user-entered phrase.
    ///
    /// Whitespace and case are normalized. Wrong words or wrong word order
    /// fail here (checksum) or, for the rare reordering that still
    /// checksums, produce a wrapping key that fails the later
    /// authentication check. Either way the failure is closed, not a crash.
    pub fn parse(input: &str) -> Result<Self, MnemonicError> {
        let normalized = input
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");

        if normalized.split(' ').count() != MNEMONIC_WORD_COUNT {
            return Err(MnemonicError::InvalidPhrase);
        }

        Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|_| MnemonicError::InvalidPhrase)?;

        Ok(Self { phrase: normalized })
    }

    /// The full phrase, for one-time display to the user.
    pub fn as_str(&self) -> &str {
        &self.phrase
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.phrase.split(' ')
    }

    /// Derive the symmetric key used to wrap the vault master key.
    ///
    /// Deterministic and order-sensitive: the BIP-39 seed of the phrase is
    /// stretched through BLAKE3 with a fixed context.
    pub fn wrapping_key(&self) -> SymmetricKey {
        // The phrase was validated at construction, so this re-parse
        // cannot fail; fall back to hashing the raw phrase if it somehow
        // does rather than panicking inside key derivation.
        let mut seed = match Mnemonic::parse_in_normalized(Language::English, &self.phrase) {
            Ok(mnemonic) => mnemonic.to_seed(""),
            Err(_) => {
                let mut fallback = [0u8; 64];
                fallback[..32].copy_from_slice(blake3::hash(self.phrase.as_bytes()).as_bytes());
                fallback
            }
        };
        let key = derive_subkey(KDF_CONTEXT_RECOVERY_WRAP, &seed);
        seed.zeroize();
        key
    }

    /// Random word positions (0-based) the user must re-enter before the
    /// phrase may be treated as saved.
    pub fn verification_challenge(&self) -> Vec<usize> {
        let mut indices = sample(
            &mut rand::rngs::OsRng,
            MNEMONIC_WORD_COUNT,
            MNEMONIC_CHALLENGE_WORDS,
        )
        .into_vec();
        indices.sort_unstable();
        indices
    }

    /// Check a user's answer to one challenge position.
    pub fn check_word(&self, index: usize, answer: &str) -> bool {
        self.words()
            .nth(index)
            .is_some_and(|w| w == answer.trim().to_lowercase())
    }
}
