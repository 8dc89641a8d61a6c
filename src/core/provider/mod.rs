//! Value providers.
//!
//! Every source a manifest variable can name is reached through the same
//! [`Provider::lookup`] contract. A provider answers either with a value or
//! with an [`Absence`] that says why nothing was found and what the operator
//! can do about it. Only genuinely broken environments (unreadable files,
//! corrupted payloads) surface as errors.
//!
//! ## Adding a New Secret Provider
//!
//! 1. Implement the `Provider` trait
//! 2. Map each "not available" condition to an [`AbsenceReason`]
//! 3. Pass it to [`Providers::new`]

use zeroize::Zeroizing;

use crate::core::derived::DerivedRegistry;
use crate::error::Result;

mod app;
mod local;
mod remote;
mod static_config;

pub use app::AppIdentity;
pub use local::LocalSecrets;
pub use remote::RemoteSecrets;
pub use static_config::{Layer, Overlay, StaticConfig};

pub(crate) use static_config::scalar_to_string;

/// Uniform lookup contract shared by all value sources.
pub trait Provider {
    /// Look up one key.
    ///
    /// # Errors
    ///
    /// Only for failures that no default can paper over. A missing value is
    /// `Ok(Lookup::Absent(..))`.
    fn lookup(&self, key: &str) -> Result<Lookup>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Answer to a single lookup.
#[derive(Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Zeroizing<String>),
    Absent(Absence),
}

impl std::fmt::Debug for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lookup::Found(_) => f.write_str("Found(********)"),
            Lookup::Absent(absence) => f.debug_tuple("Absent").field(absence).finish(),
        }
    }
}

impl Lookup {
    pub fn found(value: impl Into<String>) -> Self {
        Lookup::Found(Zeroizing::new(value.into()))
    }

    pub fn absent(reason: AbsenceReason, detail: impl Into<String>) -> Self {
        Lookup::Absent(Absence {
            reason,
            detail: detail.into(),
        })
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Why a provider had no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsenceReason {
    /// The provider works but does not hold this key.
    NotFound,
    /// Local store: no key has been cached from the passphrase.
    NoCachedKey,
    /// Local store: the secrets file does not exist.
    NoFile,
    /// Local store: the cached key cannot decrypt the file.
    KeyInvalid,
    /// Remote store: no project configured.
    NoProjectId,
    /// Remote store: the CLI tool is not installed.
    ToolMissing,
    /// Remote store: the caller's identity lacks access.
    PermissionDenied,
    /// Remote store: any other failure, including exhausted retries.
    Remote,
}

impl AbsenceReason {
    /// One-line remediation for this reason.
    pub fn guidance(self) -> &'static str {
        match self {
            AbsenceReason::NotFound => "create the secret, or declare a default for the variable",
            AbsenceReason::NoCachedKey => "cache the key by entering the secrets passphrase",
            AbsenceReason::NoFile => "set the secret in the local store to create the secrets file",
            AbsenceReason::KeyInvalid => {
                "wrong passphrase: cache the key for the correct passphrase, or force-clear the cached key"
            }
            AbsenceReason::NoProjectId => "set PROJECT_ID or secrets.project_id in config/app.toml",
            AbsenceReason::ToolMissing => {
                "install the gcloud CLI: https://cloud.google.com/sdk/docs/install"
            }
            AbsenceReason::PermissionDenied => {
                "grant the active gcloud identity roles/secretmanager.secretAccessor"
            }
            AbsenceReason::Remote => "check network access and `gcloud auth login`",
        }
    }
}

/// Detail of an unsuccessful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Absence {
    pub reason: AbsenceReason,
    pub detail: String,
}

impl Absence {
    pub fn guidance(&self) -> &'static str {
        self.reason.guidance()
    }
}

impl std::fmt::Display for Absence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.detail)
    }
}

/// Everything the resolver can draw values from.
pub struct Providers {
    pub static_config: StaticConfig,
    pub secrets: Box<dyn Provider>,
    pub app: AppIdentity,
    pub derived: DerivedRegistry,
}

impl Providers {
    /// Providers with empty overlays and no derived functions.
    pub fn new(app: AppIdentity, secrets: impl Provider + 'static) -> Self {
        Self {
            static_config: StaticConfig::default(),
            secrets: Box::new(secrets),
            app,
            derived: DerivedRegistry::new(),
        }
    }

    pub fn with_static_config(mut self, static_config: StaticConfig) -> Self {
        self.static_config = static_config;
        self
    }

    pub fn with_derived(mut self, derived: DerivedRegistry) -> Self {
        self.derived = derived;
        self
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("static_config", &self.static_config)
            .field("secrets", &self.secrets.name())
            .field("app", &self.app)
            .field("derived", &self.derived)
            .finish()
    }
}
