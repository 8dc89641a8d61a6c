//! Local encrypted store as a secret provider.

use tracing::debug;

use super::{AbsenceReason, Lookup, Provider};
use crate::core::store::LocalStore;
use crate::error::{Error, Result, StoreError};

/// Adapter exposing a [`LocalStore`] through the provider contract.
#[derive(Debug)]
pub struct LocalSecrets {
    store: LocalStore,
}

impl LocalSecrets {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// The underlying store, for cache-state operations.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }
}

impl Provider for LocalSecrets {
    fn lookup(&self, key: &str) -> Result<Lookup> {
        let absent = match self.store.reveal(key) {
            Ok(value) => return Ok(Lookup::Found(value)),
            Err(Error::Store(e)) => match e {
                StoreError::NotFound(_) => (
                    AbsenceReason::NotFound,
                    format!("'{}' is not in {}", key, self.store.file_path().display()),
                ),
                StoreError::NoFile(path) => (
                    AbsenceReason::NoFile,
                    format!("no secrets file at {}", path.display()),
                ),
                StoreError::KeyUnavailable => (
                    AbsenceReason::NoCachedKey,
                    format!("no cached key at {}", self.store.cache_location()),
                ),
                StoreError::KeyInvalid(path) => (
                    AbsenceReason::KeyInvalid,
                    format!("cached key cannot decrypt {}", path.display()),
                ),
                other => return Err(other.into()),
            },
            Err(e) => return Err(e),
        };

        debug!(key, reason = ?absent.0, "local secret unavailable");
        Ok(Lookup::absent(absent.0, absent.1))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

impl From<LocalStore> for LocalSecrets {
    fn from(store: LocalStore) -> Self {
        Self::new(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn provider() -> (TempDir, LocalSecrets) {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().join(".secrets"), tmp.path().join("cache"));
        (tmp, LocalSecrets::new(store))
    }

    fn reason(lookup: Lookup) -> AbsenceReason {
        match lookup {
            Lookup::Absent(a) => a.reason,
            Lookup::Found(_) => panic!("expected absence"),
        }
    }

    #[test]
    fn test_states_map_to_reasons() {
        let (_tmp, provider) = provider();
        assert_eq!(reason(provider.lookup("k").unwrap()), AbsenceReason::NoFile);

        provider.store().set_cached_key("p1").unwrap();
        provider.store().set("k", "v").unwrap();
        assert_eq!(
            reason(provider.lookup("other").unwrap()),
            AbsenceReason::NotFound
        );

        provider.store().forget_cached_key().unwrap();
        assert_eq!(
            reason(provider.lookup("k").unwrap()),
            AbsenceReason::NoCachedKey
        );
    }

    #[test]
    fn test_found() {
        let (_tmp, provider) = provider();
        provider.store().set_cached_key("p1").unwrap();
        provider.store().set("k", "v").unwrap();

        assert_eq!(provider.lookup("k").unwrap(), Lookup::found("v"));
    }
}
