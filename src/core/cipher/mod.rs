//! Symmetric encryption of the secrets payload.
//!
//! The store is cipher-agnostic: anything implementing [`Cipher`] with an
//! authenticated symmetric algorithm can seal the payload. AES-256-GCM is the
//! shipped backend.
//!
//! ## Adding a New Backend
//!
//! 1. Implement the `Cipher` trait
//! 2. Add the implementation in a new file (e.g., `chacha.rs`)
//! 3. Re-export from this module
//! 4. Hand it to the store with `LocalStore::with_cipher`

use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::core::constants::{FINGERPRINT_LEN, KDF_ITERATIONS, KDF_SALT, KEY_LENGTH};
use crate::core::types::Fingerprint;
use crate::error::{CipherError, Result};

mod aes;

pub use aes::AesGcm;

/// Authenticated symmetric cipher.
pub trait Cipher {
    /// Encrypt plaintext with a derived key.
    ///
    /// # Returns
    ///
    /// Opaque text-safe ciphertext (format depends on backend implementation).
    ///
    /// # Errors
    ///
    /// Returns `CipherError` if encryption fails.
    fn encrypt(&self, plaintext: &[u8], key: &DerivedKey) -> Result<String>;

    /// Decrypt ciphertext produced by [`Cipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Malformed` if the text is not in the backend's
    /// format, and `CipherError::DecryptionFailed` if the key is wrong or the
    /// ciphertext was tampered with.
    fn decrypt(&self, encrypted: &str, key: &DerivedKey) -> Result<Zeroizing<Vec<u8>>>;

    /// Backend name for display/config.
    fn name(&self) -> &'static str;
}

/// A symmetric key derived from a passphrase.
///
/// Bytes are wiped on drop. Two keys compare equal when derived from the same
/// passphrase.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey(Zeroizing<[u8; KEY_LENGTH]>);

impl DerivedKey {
    /// Derive a key from a passphrase with PBKDF2-HMAC-SHA256.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), KDF_SALT, KDF_ITERATIONS, key.as_mut_slice());
        Self(key)
    }

    /// Rebuild a key from raw bytes (e.g., read back from the key cache).
    ///
    /// # Errors
    ///
    /// Returns `CipherError::InvalidKeyLength` if `bytes` is not exactly
    /// [`KEY_LENGTH`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LENGTH {
            return Err(CipherError::InvalidKeyLength {
                expected: KEY_LENGTH,
                actual: bytes.len(),
            }
            .into());
        }
        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &*self.0
    }

    /// One-way fingerprint safe to display.
    pub fn fingerprint(&self) -> Fingerprint {
        short_digest(&self.0[..])
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DerivedKey").field(&self.fingerprint()).finish()
    }
}

/// Truncated sha256 hex digest.
pub fn short_digest(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}
