//! Type aliases for domain concepts.
//!
//! Provides semantic type aliases to make function signatures more descriptive.

/// A manifest variable name (e.g., DATABASE_URL, APP_ID).
///
/// Must be a valid environment variable name.
pub type VarName = String;

/// A secret name as known to a secret provider (e.g., `api-key`).
pub type SecretName = String;

/// Key into a static overlay document.
pub type OverlayKey = String;

/// Name of a registered derived function.
pub type FunctionName = String;

/// Truncated hex digest identifying a key or value without revealing it.
pub type Fingerprint = String;
