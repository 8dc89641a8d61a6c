//! Local encrypted secret store.
//!
//! One encrypted file of name/value pairs plus one cached key derived from
//! the passphrase. The cache and the file have independent lifecycles: the
//! cache may exist without the file, and the file may exist with no cache or
//! a cache for a different passphrase. A cached key is only ever validated by
//! trying to decrypt the file.
//!
//! ## Cache outcomes
//!
//! | file   | cache          | derived key decrypts file | outcome       |
//! |--------|----------------|---------------------------|---------------|
//! | any    | same key       | (not checked)             | `NoChange`    |
//! | absent | absent/other   | -                         | `New`         |
//! | exists | absent         | yes                       | `ValidSet`    |
//! | exists | other key      | yes                       | `ValidChange` |
//! | exists | absent/other   | no                        | `Invalid`     |
//!
//! ## Adding a New Key Cache
//!
//! 1. Implement the `KeyCache` trait
//! 2. Build the store with `LocalStore::with_cache`
//!
//! The file is sealed with [`AesGcm`] unless another [`Cipher`] is supplied
//! through `LocalStore::with_cipher`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::core::cipher::{short_digest, AesGcm, Cipher, DerivedKey};
use crate::core::types::Fingerprint;
use crate::core::validation::{validate_passphrase, validate_secret_name};
use crate::error::{CipherError, Error, Result, StoreError};

mod fs;
mod io;
mod payload;

pub use fs::Filesystem;
pub use payload::{SecretRecord, SecretsPayload};

/// Storage for the passphrase-derived key.
pub trait KeyCache {
    /// Cached key, or `None` if nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupted` if the cache exists but holds no valid key.
    fn load(&self) -> Result<Option<DerivedKey>>;

    /// Replace the cached key.
    fn save(&self, key: &DerivedKey) -> Result<()>;

    /// Delete the cached key, returning whether one existed.
    fn remove(&self) -> Result<bool>;

    /// Human-readable location for diagnostics.
    fn location(&self) -> String;
}

/// Result of caching a key derived from a passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// No secrets file yet; the key was cached and will create it.
    New,
    /// The same key was already cached; the file was not re-validated.
    NoChange,
    /// No key was cached; the new key decrypts the file and is now cached.
    ValidSet,
    /// A different key was cached; the new key decrypts the file and replaced it.
    ValidChange,
    /// The new key cannot decrypt the file; the cache was left untouched.
    Invalid,
}

impl CacheOutcome {
    /// Whether the passphrase was accepted.
    pub fn is_accepted(self) -> bool {
        !matches!(self, CacheOutcome::Invalid)
    }

    /// Stable code for machine-readable output.
    pub fn code(self) -> &'static str {
        match self {
            CacheOutcome::New => "CACHE_KEY_NEW",
            CacheOutcome::NoChange => "CACHE_KEY_NO_CHANGE",
            CacheOutcome::ValidSet => "CACHE_KEY_VALID_SET",
            CacheOutcome::ValidChange => "CACHE_KEY_VALID_CHANGE",
            CacheOutcome::Invalid => "CACHE_KEY_INVALID",
        }
    }
}

impl std::fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Whether a key is cached, without revealing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    Absent,
    Present { fingerprint: Fingerprint },
}

/// A secret value as returned by [`LocalStore::get`].
#[derive(Clone, PartialEq, Eq)]
pub enum SecretValue {
    /// Plaintext, wiped on drop.
    Revealed(Zeroizing<String>),
    /// Stable one-way hash of the value.
    Hashed(Fingerprint),
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretValue::Revealed(_) => f.write_str("Revealed(********)"),
            SecretValue::Hashed(hash) => f.debug_tuple("Hashed").field(hash).finish(),
        }
    }
}

impl SecretValue {
    pub fn revealed(&self) -> Option<&str> {
        match self {
            SecretValue::Revealed(v) => Some(v.as_str()),
            SecretValue::Hashed(_) => None,
        }
    }

    pub fn hash(&self) -> Option<&str> {
        match self {
            SecretValue::Hashed(h) => Some(h.as_str()),
            SecretValue::Revealed(_) => None,
        }
    }
}

/// Passphrase-protected secrets file with a cached derived key.
///
/// Every operation reads the whole file, and every write replaces it
/// atomically. Concurrent writers against the same file are not
/// coordinated; callers must serialize invocations.
pub struct LocalStore {
    file: PathBuf,
    cache: Box<dyn KeyCache>,
    cipher: Box<dyn Cipher>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("file", &self.file)
            .field("cache", &self.cache.location())
            .field("cipher", &self.cipher.name())
            .finish()
    }
}

impl LocalStore {
    /// Store for `file`, caching its key under `cache_root`.
    ///
    /// Relative paths are resolved against the current directory so the
    /// cache file name is stable for a given secrets file.
    pub fn new(file: impl Into<PathBuf>, cache_root: impl AsRef<Path>) -> Self {
        let file = absolute(file.into());
        let cache = Filesystem::for_secrets_file(&file, cache_root.as_ref());
        Self::with_cache(file, cache)
    }

    /// Store for `file` with a custom key cache.
    pub fn with_cache(file: impl Into<PathBuf>, cache: impl KeyCache + 'static) -> Self {
        Self {
            file: file.into(),
            cache: Box::new(cache),
            cipher: Box::new(AesGcm),
        }
    }

    /// Seal the file with `cipher` instead of AES-GCM.
    ///
    /// A file written by one cipher cannot be read by another.
    pub fn with_cipher(mut self, cipher: impl Cipher + 'static) -> Self {
        self.cipher = Box::new(cipher);
        self
    }

    /// Path of the encrypted secrets file.
    pub fn file_path(&self) -> &Path {
        &self.file
    }

    /// Location of the cached key.
    pub fn cache_location(&self) -> String {
        self.cache.location()
    }

    /// Whether a non-empty secrets file exists.
    pub fn file_exists(&self) -> bool {
        matches!(self.read_ciphertext(), Ok(Some(_)))
    }

    /// Report whether a key is cached. Never fails.
    pub fn key_status(&self) -> KeyStatus {
        match self.cache.load() {
            Ok(Some(key)) => KeyStatus::Present {
                fingerprint: key.fingerprint(),
            },
            Ok(None) => KeyStatus::Absent,
            Err(e) => {
                warn!(error = %e, "cached key unreadable");
                KeyStatus::Absent
            }
        }
    }

    /// Derive a key from `passphrase` and cache it if it fits the file.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyPassphrase` for an empty passphrase, or
    /// an I/O error if the file or cache cannot be accessed. A wrong
    /// passphrase is not an error: it yields [`CacheOutcome::Invalid`].
    pub fn set_cached_key(&self, passphrase: &str) -> Result<CacheOutcome> {
        validate_passphrase(passphrase)?;
        let new_key = DerivedKey::from_passphrase(passphrase);

        let existing = match self.cache.load() {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable cached key");
                None
            }
        };

        if existing.as_ref() == Some(&new_key) {
            debug!(fingerprint = %new_key.fingerprint(), "key already cached");
            return Ok(CacheOutcome::NoChange);
        }

        let outcome = match self.read_ciphertext()? {
            None => CacheOutcome::New,
            Some(ciphertext) => match self.open(&ciphertext, &new_key) {
                Ok(_) if existing.is_none() => CacheOutcome::ValidSet,
                Ok(_) => CacheOutcome::ValidChange,
                Err(Error::Store(StoreError::KeyInvalid(_))) => CacheOutcome::Invalid,
                Err(e) => return Err(e),
            },
        };

        if outcome.is_accepted() {
            self.cache.save(&new_key)?;
        }
        debug!(outcome = %outcome, fingerprint = %new_key.fingerprint(), "set cached key");
        Ok(outcome)
    }

    /// Look up one secret.
    ///
    /// With `reveal = false` only a stable hash of the value is returned.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoFile`, `StoreError::KeyUnavailable`,
    /// `StoreError::KeyInvalid`, or `StoreError::NotFound`.
    pub fn get(&self, name: &str, reveal: bool) -> Result<SecretValue> {
        let value = self.reveal(name)?;
        Ok(if reveal {
            SecretValue::Revealed(value)
        } else {
            SecretValue::Hashed(short_digest(value.as_bytes()))
        })
    }

    /// Plaintext of one secret. Same failure modes as [`LocalStore::get`].
    pub fn reveal(&self, name: &str) -> Result<Zeroizing<String>> {
        let (_, payload) = self.load_existing()?;
        payload
            .find(name)
            .map(|record| Zeroizing::new(record.value.clone()))
            .ok_or_else(|| StoreError::NotFound(name.to_string()).into())
    }

    /// Insert or replace a secret.
    ///
    /// Creates the file on first use, which requires a cached key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::KeyUnavailable` or `StoreError::KeyInvalid`.
    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        validate_secret_name(name)?;
        let key = self.load_key()?;

        let mut payload = match self.read_ciphertext()? {
            Some(ciphertext) => self.open(&ciphertext, &key)?,
            None => SecretsPayload::default(),
        };
        payload.upsert(name, value);
        self.seal(&payload, &key)?;

        debug!(name, count = payload.secrets.len(), "stored secret");
        Ok(())
    }

    /// Remove a secret.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoFile`, `StoreError::KeyUnavailable`,
    /// `StoreError::KeyInvalid`, or `StoreError::NotFound`.
    pub fn delete(&self, name: &str) -> Result<()> {
        let (key, mut payload) = self.load_existing()?;
        if !payload.remove(name) {
            return Err(StoreError::NotFound(name.to_string()).into());
        }
        self.seal(&payload, &key)?;

        debug!(name, count = payload.secrets.len(), "deleted secret");
        Ok(())
    }

    /// Names of all stored secrets, in insertion order. Empty when no file exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::KeyUnavailable` or `StoreError::KeyInvalid` when a
    /// file exists but cannot be opened.
    pub fn list(&self) -> Result<Vec<String>> {
        let Some(ciphertext) = self.read_ciphertext()? else {
            return Ok(Vec::new());
        };
        let key = self.load_key()?;
        Ok(self.open(&ciphertext, &key)?.names())
    }

    /// Re-encrypt the file under a new passphrase.
    ///
    /// The file is written before the cache, so an interruption between the
    /// two leaves the file readable with the old cached key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::KeyUnavailable` or `StoreError::KeyInvalid` if the
    /// current cached key cannot open the file.
    pub fn rotate_key(&self, new_passphrase: &str) -> Result<Fingerprint> {
        validate_passphrase(new_passphrase)?;
        let current = self.load_key()?;
        let new_key = DerivedKey::from_passphrase(new_passphrase);

        if let Some(ciphertext) = self.read_ciphertext()? {
            let payload = self.open(&ciphertext, &current)?;
            self.seal(&payload, &new_key)?;
            debug!(count = payload.secrets.len(), "re-encrypted secrets");
        }
        self.cache.save(&new_key)?;

        debug!(
            old = %current.fingerprint(),
            new = %new_key.fingerprint(),
            "rotated key"
        );
        Ok(new_key.fingerprint())
    }

    /// Delete the secrets file. The cached key is kept.
    ///
    /// Returns whether a file existed.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.file) {
            Ok(()) => {
                debug!(path = %self.file.display(), "cleared secrets file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the cached key. The secrets file is kept.
    ///
    /// Returns whether a key was cached.
    pub fn forget_cached_key(&self) -> Result<bool> {
        self.cache.remove()
    }

    /// Ciphertext of the file, or `None` if it is missing or empty.
    fn read_ciphertext(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.file) {
            Ok(contents) if contents.trim().is_empty() => Ok(None),
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn load_key(&self) -> Result<DerivedKey> {
        self.cache
            .load()?
            .ok_or_else(|| StoreError::KeyUnavailable.into())
    }

    /// Key and payload of an existing file.
    fn load_existing(&self) -> Result<(DerivedKey, SecretsPayload)> {
        let ciphertext = self
            .read_ciphertext()?
            .ok_or_else(|| StoreError::NoFile(self.file.clone()))?;
        let key = self.load_key()?;
        let payload = self.open(&ciphertext, &key)?;
        Ok((key, payload))
    }

    fn open(&self, ciphertext: &str, key: &DerivedKey) -> Result<SecretsPayload> {
        let plaintext = self.cipher.decrypt(ciphertext, key).map_err(|e| match e {
            Error::Cipher(CipherError::DecryptionFailed(_)) => {
                Error::from(StoreError::KeyInvalid(self.file.clone()))
            }
            Error::Cipher(CipherError::Malformed(reason)) => {
                Error::from(StoreError::Corrupted(format!("{}: {}", self.file.display(), reason)))
            }
            other => other,
        })?;
        let payload = SecretsPayload::from_bytes(&plaintext)?;
        debug!(
            path = %self.file.display(),
            count = payload.secrets.len(),
            "opened secrets file"
        );
        Ok(payload)
    }

    fn seal(&self, payload: &SecretsPayload, key: &DerivedKey) -> Result<()> {
        let plaintext = payload.to_bytes()?;
        let ciphertext = self.cipher.encrypt(&plaintext, key)?;
        io::write_atomic(&self.file, ciphertext.as_bytes())
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&path))
        .unwrap_or(path)
}

/// Default cache root: the user cache directory, else the temp directory.
pub fn default_cache_root_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("stagecraft"))
        .unwrap_or_else(std::env::temp_dir)
}
