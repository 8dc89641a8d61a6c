//! Filesystem key cache.
//!
//! Persists the derived key as raw bytes under a cache root, one file per
//! secrets file, readable only by the owner (0600 on Unix).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::io::write_atomic;
use super::KeyCache;
use crate::core::cipher::{short_digest, DerivedKey};
use crate::core::constants::CACHE_FILE_PREFIX;
use crate::error::{Result, StoreError};

/// Hex characters of the path digest used in cache file names.
const PATH_HASH_LEN: usize = 8;

/// Filesystem-based key cache.
///
/// The file name is derived from the absolute secrets-file path, so several
/// secrets files under the same cache root keep independent keys.
#[derive(Debug, Clone)]
pub struct Filesystem {
    path: PathBuf,
}

impl Filesystem {
    /// Cache for `secrets_file` under `cache_root`.
    pub fn for_secrets_file(secrets_file: &Path, cache_root: &Path) -> Self {
        let digest = short_digest(secrets_file.to_string_lossy().as_bytes());
        let name = format!("{}{}", CACHE_FILE_PREFIX, &digest[..PATH_HASH_LEN]);
        Self {
            path: cache_root.join(name),
        }
    }

    /// Location of the cached key file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn check_permissions(&self) {
        use std::os::unix::fs::PermissionsExt;

        if let Ok(metadata) = fs::metadata(&self.path) {
            let mode = metadata.permissions().mode() & 0o777;
            if mode != 0o600 {
                warn!(
                    path = %self.path.display(),
                    mode = %format!("{:o}", mode),
                    "cached key is readable by others; run chmod 600"
                );
            }
        }
    }
}

impl KeyCache for Filesystem {
    fn load(&self) -> Result<Option<DerivedKey>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        #[cfg(unix)]
        self.check_permissions();

        let key = DerivedKey::from_bytes(&bytes).map_err(|_| {
            StoreError::Corrupted(format!(
                "cached key {} has {} bytes",
                self.path.display(),
                bytes.len()
            ))
        })?;
        debug!(path = %self.path.display(), "loaded cached key");
        Ok(Some(key))
    }

    fn save(&self, key: &DerivedKey) -> Result<()> {
        write_atomic(&self.path, key.as_bytes())?;
        debug!(path = %self.path.display(), fingerprint = %key.fingerprint(), "cached key");
        Ok(())
    }

    fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed cached key");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
