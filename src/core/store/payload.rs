//! Decrypted secrets payload.
//!
//! Lives only in memory for the duration of one store operation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Result, StoreError};

/// A single name/value pair. The value is wiped on drop.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub name: String,
    pub value: String,
}

impl Drop for SecretRecord {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl std::fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRecord")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered list of secrets, as stored inside the encrypted file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretsPayload {
    #[serde(default)]
    pub secrets: Vec<SecretRecord>,
}

/// Older files stored a flat `{name: value}` object, read in document order.
#[derive(Deserialize)]
#[serde(untagged)]
enum Stored {
    Current(SecretsPayload),
    Legacy(IndexMap<String, String>),
}

impl SecretsPayload {
    /// Parse decrypted bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let stored: Stored = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Corrupted(format!("invalid payload: {}", e)))?;

        Ok(match stored {
            Stored::Current(payload) => payload,
            Stored::Legacy(map) => Self {
                secrets: map
                    .into_iter()
                    .map(|(name, value)| SecretRecord { name, value })
                    .collect(),
            },
        })
    }

    /// Serialize for encryption.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(serde_json::to_vec_pretty(self)?))
    }

    pub fn find(&self, name: &str) -> Option<&SecretRecord> {
        self.secrets.iter().find(|s| s.name == name)
    }

    /// Insert or replace, keeping the original position of an existing name.
    pub fn upsert(&mut self, name: &str, value: &str) {
        match self.secrets.iter_mut().find(|s| s.name == name) {
            Some(existing) => {
                existing.value.zeroize();
                existing.value = value.to_string();
            }
            None => self.secrets.push(SecretRecord {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Remove by name, returning whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.secrets.len();
        self.secrets.retain(|s| s.name != name);
        self.secrets.len() != before
    }

    pub fn names(&self) -> Vec<String> {
        self.secrets.iter().map(|s| s.name.clone()).collect()
    }
}
