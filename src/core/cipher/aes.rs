//! AES-256-GCM backend.
//!
//! Ciphertext is `base64(nonce || ciphertext+tag)` with a fresh random
//! 96-bit nonce per encryption.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use tracing::trace;
use zeroize::Zeroizing;

use super::{Cipher, DerivedKey};
use crate::error::{CipherError, Result};

/// Nonce length in bytes (96 bits for AES-GCM).
const NONCE_LENGTH: usize = 12;

/// AES-256-GCM cipher.
pub struct AesGcm;

impl Cipher for AesGcm {
    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }

    fn encrypt(&self, plaintext: &[u8], key: &DerivedKey) -> Result<String> {
        trace!(plaintext_len = plaintext.len(), "encrypting");

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        let encoded = BASE64.encode(&combined);
        trace!(ciphertext_len = encoded.len(), "encrypted");
        Ok(encoded)
    }

    fn decrypt(&self, encrypted: &str, key: &DerivedKey) -> Result<Zeroizing<Vec<u8>>> {
        trace!(ciphertext_len = encrypted.len(), "decrypting");

        let combined = BASE64
            .decode(encrypted.trim())
            .map_err(|e| CipherError::Malformed(format!("invalid encoding: {}", e)))?;

        if combined.len() < NONCE_LENGTH {
            return Err(CipherError::Malformed("ciphertext too short".to_string()).into());
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LENGTH);

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CipherError::DecryptionFailed(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                CipherError::DecryptionFailed("invalid key or corrupted data".to_string())
            })?;

        trace!(plaintext_len = plaintext.len(), "decrypted");
        Ok(Zeroizing::new(plaintext))
    }
}
