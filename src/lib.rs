//! Stagecraft - configuration and secrets resolution for build tooling.
//!
//! Answers one question per process start: what is the final value of every
//! setting and secret the application needs, and where did each value come
//! from?
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── logging           # tracing subscriber setup
//! ├── error             # Error types
//! └── core/
//!     ├── manifest      # Variable definitions (config/variables.toml)
//!     ├── resolver/     # Session, staging, ResolvedSet
//!     ├── provider/     # Provider trait
//!     │   ├── static    # Test-mode and environment overlays
//!     │   ├── local     # Local encrypted store adapter
//!     │   ├── remote    # gcloud secret manager
//!     │   └── app       # Application id
//!     ├── derived       # Derived function registry
//!     ├── placeholder   # {ref:NAME} expansion
//!     ├── store/        # Local encrypted store
//!     │   ├── mod       # LocalStore, KeyCache trait
//!     │   ├── fs        # Filesystem key cache
//!     │   └── payload   # Decrypted secrets payload
//!     ├── cipher/       # Encryption backends
//!     │   ├── mod       # Cipher trait, key derivation
//!     │   └── aes       # AES-256-GCM implementation
//!     └── workspace     # Project layout bootstrap
//! ```
//!
//! # Example
//!
//! ```no_run
//! use stagecraft::{Selection, Session, Workspace};
//!
//! # fn main() -> stagecraft::error::Result<()> {
//! let workspace = Workspace::open(".")?;
//! let manifest = workspace.manifest()?;
//! let providers = workspace.providers(Some("dev"), None)?;
//!
//! let mut session = Session::new();
//! let resolved = session.resolve(&manifest, &providers, Selection::All)?;
//! eprintln!("{}", resolved.report());
//! resolved.project();
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;
pub mod logging;

pub use crate::core::derived::{DerivedContext, DerivedRegistry};
pub use crate::core::manifest::{Condition, Expected, Manifest, Source, VariableDefinition};
pub use crate::core::provider::{
    Absence, AbsenceReason, AppIdentity, LocalSecrets, Lookup, Provider, Providers, RemoteSecrets,
    StaticConfig,
};
pub use crate::core::resolver::{
    Provenance, ResolvedSet, Selection, Session, StagedVariable, Validator,
};
pub use crate::core::store::{CacheOutcome, KeyStatus, LocalStore, SecretValue};
pub use crate::core::workspace::Workspace;
pub use crate::error::{Error, ErrorKind, Result};
