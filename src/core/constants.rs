//! Constants used throughout stagecraft.
//!
//! Centralizes file names, environment variable names and crypto parameters.

/// Directory holding project configuration, relative to the project root.
pub const CONFIG_DIR: &str = "config";

/// Application settings file inside [`CONFIG_DIR`].
pub const APP_FILE: &str = "app.toml";

/// Variable manifest file inside [`CONFIG_DIR`].
pub const MANIFEST_FILE: &str = "variables.toml";

/// Environment overlay document inside [`CONFIG_DIR`].
pub const ENVIRONMENTS_FILE: &str = "environments.toml";

/// Test-mode overlay document inside [`CONFIG_DIR`].
pub const TESTS_FILE: &str = "tests.toml";

/// Default encrypted secrets file name.
pub const SECRETS_FILE: &str = ".secrets";

/// Overrides the secrets file path.
pub const ENV_SECRETS_REPO: &str = "LOCAL_SECRETS_REPO";

/// Overrides the cached-key directory.
pub const ENV_SECRETS_CACHE: &str = "LOCAL_SECRETS_CACHE";

/// Overrides the remote secret manager project.
pub const ENV_PROJECT_ID: &str = "PROJECT_ID";

/// Log filter variable read by [`crate::logging::init`].
pub const ENV_LOG: &str = "STAGECRAFT_LOG";

/// File name prefix for cached keys.
pub const CACHE_FILE_PREFIX: &str = "stagecraft_key_";

/// Fixed salt for passphrase key derivation.
///
/// Changing this invalidates every existing secrets file.
pub const KDF_SALT: &[u8] = b"stagecraft_secrets_salt_v1";

/// PBKDF2-HMAC-SHA256 iteration count.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Derived key length in bytes (AES-256).
pub const KEY_LENGTH: usize = 32;

/// Hex characters kept from a sha256 digest for fingerprints and value hashes.
pub const FINGERPRINT_LEN: usize = 16;

/// Default timeout for one remote secret lookup, in seconds.
pub const REMOTE_TIMEOUT_SECS: u64 = 30;
