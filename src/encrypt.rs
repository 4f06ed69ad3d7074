//! Encryption Module
//!
//! The cache core only depends on the [`CipherProvider`] capability: give it
//! an optional key hint, get back ready-to-use encrypt/decrypt transforms.
//! How keys are generated, wrapped, or persisted is up to the provider.
//!
//! [`AesGcmProvider`] is the bundled implementation: AES-256-GCM with a key
//! derived from a passphrase and a random 96-bit nonce prepended to every
//! ciphertext. Decryption is authenticated, so tampered or wrongly-keyed
//! records fail closed instead of yielding garbage plaintext.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

/// Length of the GCM nonce prepended to each ciphertext.
const NONCE_LEN: usize = 12;

// == Cipher Provider ==
/// Capability yielding encrypt/decrypt transforms for an optional
/// caller-supplied key hint.
///
/// When `hint` is `None` the provider uses its own default key material.
pub trait CipherProvider: Send + Sync {
    /// Encrypts `plaintext` under the key selected by `hint`.
    fn encrypt(&self, hint: Option<&str>, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts `ciphertext` under the key selected by `hint`.
    ///
    /// Must fail for data that was not produced by the matching `encrypt`.
    fn decrypt(&self, hint: Option<&str>, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

// == AES-GCM Provider ==
/// Symmetric AES-256-GCM provider keyed by a passphrase.
///
/// A per-call key hint overrides the provider's passphrase, mirroring a
/// per-entry password.
pub struct AesGcmProvider {
    passphrase: String,
}

impl AesGcmProvider {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }

    /// Derives the 256-bit key for the effective passphrase.
    fn derive_key(&self, hint: Option<&str>) -> Key<Aes256Gcm> {
        let phrase = hint.unwrap_or(&self.passphrase);
        let digest = Sha256::digest(phrase.as_bytes());
        Key::<Aes256Gcm>::clone_from_slice(&digest)
    }
}

impl CipherProvider for AesGcmProvider {
    fn encrypt(&self, hint: Option<&str>, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(&self.derive_key(hint));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CacheError::Cipher(format!("encrypt failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, hint: Option<&str>, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN {
            return Err(CacheError::Cipher("ciphertext shorter than nonce".to_string()));
        }
        let (nonce, body) = ciphertext.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(&self.derive_key(hint));
        cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|e| CacheError::Cipher(format!("decrypt failed: {e}")))
    }
}

// == Plain Provider ==
/// No-op provider: passes bytes through unchanged. Lets hosts keep the
/// encryption seam wired while opting out of actual encryption.
pub struct PlainProvider;

impl CipherProvider for PlainProvider {
    fn encrypt(&self, _hint: Option<&str>, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, _hint: Option<&str>, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }
}
