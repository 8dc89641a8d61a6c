//! Error types.
//!
//! Every domain has its own enum; `Error` wraps them so callers can use a
//! single `Result` alias and still match on the precise failure.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error for all stagecraft operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure categories shared by every error.
///
/// Each category has a different remediation: definition and cycle errors
/// are authoring mistakes, unavailable values are operator-recoverable, and
/// key-state errors need an explicit decision about the cached key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Definition,
    CircularDependency,
    UnavailableValue,
    KeyState,
    Environment,
}

impl Error {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Manifest(_) | Error::Validation(_) => ErrorKind::Definition,
            Error::Resolve(e) => e.kind(),
            Error::Store(e) => e.kind(),
            Error::Cipher(_) => ErrorKind::KeyState,
            Error::Config(_) | Error::Io(_) | Error::Json(_) | Error::TomlParse(_) => {
                ErrorKind::Environment
            }
        }
    }

    /// One-line fix for the operator, when there is one.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::Resolve(ResolveError::SecretUnavailable { guidance, .. }) => {
                Some(guidance.clone())
            }
            Error::Resolve(ResolveError::MissingRequiredValues { names }) => Some(format!(
                "export the missing variables or declare defaults for: {}",
                names.join(", ")
            )),
            Error::Store(e) => e.suggestion().map(str::to_string),
            Error::Config(ConfigError::NotFound(path)) => {
                Some(format!("create {}", path.display()))
            }
            _ => None,
        }
    }
}

/// Authoring mistakes in the variable manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate variable '{name}' (names are case-insensitive)")]
    Duplicate { name: String },

    #[error("invalid source '{source_spec}' for variable '{name}': {reason}")]
    InvalidSource {
        name: String,
        source_spec: String,
        reason: String,
    },

    #[error("invalid condition on '{name}': {reason}")]
    InvalidCondition { name: String, reason: String },

    #[error("group '{group}' references undefined variable '{name}'")]
    UndefinedGroupMember { group: String, name: String },

    #[error("invalid definition of '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// Failures of a resolution pass.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("circular dependency detected at '{name}': {}", chain.join(" -> "))]
    CircularDependency { name: String, chain: Vec<String> },

    #[error("'{referenced_by}' references undefined variable '{name}'")]
    UndefinedVariable { name: String, referenced_by: String },

    #[error("variable '{name}' uses unregistered derived function '{function}'")]
    UnknownFunction { name: String, function: String },

    #[error("derived function '{function}' for '{name}' failed: {reason}")]
    DerivedFailed {
        name: String,
        function: String,
        reason: String,
    },

    #[error("cannot evaluate condition on required variable '{name}': '{key}' has no value")]
    ConditionEvaluation { name: String, key: String },

    #[error("secret '{secret}' for '{name}' unavailable from {provider}: {reason}")]
    SecretUnavailable {
        name: String,
        secret: String,
        provider: String,
        reason: String,
        guidance: String,
    },

    #[error("'{name}' references '{reference}', which has no value")]
    UnresolvedReference { name: String, reference: String },

    #[error("missing required values: {}", names.join(", "))]
    MissingRequiredValues { names: Vec<String> },

    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error("configuration already resolved for this session")]
    AlreadyResolved,

    #[error("validator '{validator}' rejected configuration: {message}")]
    Validation { validator: String, message: String },
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::CircularDependency { .. } => ErrorKind::CircularDependency,
            ResolveError::SecretUnavailable { .. }
            | ResolveError::MissingRequiredValues { .. }
            | ResolveError::UnresolvedReference { .. }
            | ResolveError::ConditionEvaluation { .. }
            | ResolveError::Validation { .. } => ErrorKind::UnavailableValue,
            ResolveError::AlreadyResolved => ErrorKind::Environment,
            ResolveError::UndefinedVariable { .. }
            | ResolveError::UnknownFunction { .. }
            | ResolveError::DerivedFailed { .. }
            | ResolveError::UnknownGroup(_) => ErrorKind::Definition,
        }
    }
}

/// Local secret store state errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no secrets file at {0}")]
    NoFile(PathBuf),

    #[error("no cached key: set one from the passphrase first")]
    KeyUnavailable,

    #[error("cached key cannot decrypt {0} (wrong passphrase)")]
    KeyInvalid(PathBuf),

    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("corrupted secrets payload: {0}")]
    Corrupted(String),

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) | StoreError::NoFile(_) => ErrorKind::UnavailableValue,
            StoreError::WriteFailed { .. } => ErrorKind::Environment,
            StoreError::KeyUnavailable | StoreError::KeyInvalid(_) | StoreError::Corrupted(_) => {
                ErrorKind::KeyState
            }
        }
    }

    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::NoFile(_) => Some("set a secret to create the secrets file"),
            StoreError::KeyUnavailable => Some("cache a key from your passphrase"),
            StoreError::KeyInvalid(_) => {
                Some("cache the key for the correct passphrase, or force-clear the cached key")
            }
            StoreError::NotFound(_) => Some("list the stored secret names"),
            _ => None,
        }
    }
}

/// Encryption and key derivation failures.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

/// Project layout and settings errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown environment '{name}' (available: {})", available.join(", "))]
    UnknownEnvironment { name: String, available: Vec<String> },

    #[error("unknown test mode '{name}' (available: {})", available.join(", "))]
    UnknownTestMode { name: String, available: Vec<String> },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Input validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("passphrase cannot be empty")]
    EmptyPassphrase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_key_state() {
        let err: Error = StoreError::KeyInvalid(PathBuf::from(".secrets")).into();
        assert_eq!(err.kind(), ErrorKind::KeyState);
        assert!(err.suggestion().unwrap().contains("force-clear"));

        let err: Error = StoreError::KeyUnavailable.into();
        assert_eq!(err.kind(), ErrorKind::KeyState);
    }

    #[test]
    fn test_missing_values_message_lists_every_name() {
        let err: Error = ResolveError::MissingRequiredValues {
            names: vec!["A".to_string(), "B".to_string()],
        }
        .into();

        assert_eq!(err.to_string(), "missing required values: A, B");
        assert_eq!(err.kind(), ErrorKind::UnavailableValue);
        assert!(err.suggestion().unwrap().contains("A, B"));
    }

    #[test]
    fn test_cycle_message_shows_chain() {
        let err = ResolveError::CircularDependency {
            name: "A".to_string(),
            chain: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "circular dependency detected at 'A': A -> B -> A"
        );
        assert_eq!(err.kind(), ErrorKind::CircularDependency);
    }
}
