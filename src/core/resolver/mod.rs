//! Configuration resolution.
//!
//! A [`Session`] turns a [`Manifest`] plus [`Providers`] into one
//! [`ResolvedSet`]: the final value of every variable and where it came
//! from.
//!
//! ## Precedence
//!
//! ```text
//! process environment   (always wins, for every source kind)
//!   └─ source lookup    (static: test mode > environment overlay;
//!                        secret:; app:id; derived:)
//!        └─ default     ({ref:..} placeholders expanded)
//! ```
//!
//! ## Pass structure
//!
//! 1. Definition check: every name a condition, default or derived function
//!    refers to exists, and every derived function is registered.
//! 2. Depth-first staging of the selection with cycle detection.
//! 3. Completeness check: all missing required variables reported together.
//! 4. Validators.

use std::collections::HashMap;

use tracing::{debug, info_span};

use crate::core::manifest::Manifest;
use crate::core::provider::Providers;
use crate::core::types::VarName;
use crate::error::{ResolveError, Result};

mod staged;
mod stager;

pub use staged::{Provenance, ResolvedSet, StagedVariable};

use stager::{check_definitions, Stager};

/// Which variables a pass stages and includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The whole manifest.
    All,
    /// One group plus whatever its members depend on.
    Group(String),
    /// Named variables plus whatever they depend on.
    Names(Vec<VarName>),
}

impl Selection {
    fn names(&self, manifest: &Manifest) -> Result<Vec<VarName>> {
        match self {
            Selection::All => Ok(manifest.variables().iter().map(|v| v.name.clone()).collect()),
            Selection::Group(group) => manifest
                .group(group)
                .map(<[VarName]>::to_vec)
                .ok_or_else(|| ResolveError::UnknownGroup(group.clone()).into()),
            Selection::Names(names) => Ok(names.clone()),
        }
    }
}

/// Check run against a finished [`ResolvedSet`].
pub trait Validator {
    fn name(&self) -> &str;

    /// Whether this validator applies to `set`. Defaults to always.
    fn should_validate(&self, _set: &ResolvedSet) -> bool {
        true
    }

    /// Reject the set with a human-readable message.
    fn validate(&self, set: &ResolvedSet) -> std::result::Result<(), String>;
}

/// One-shot resolution context.
///
/// Holds a snapshot of the process environment taken at construction and
/// the result of the single successful [`Session::resolve`] call. A failed
/// pass leaves the session unresolved.
pub struct Session {
    env: HashMap<String, String>,
    validators: Vec<Box<dyn Validator>>,
    resolved: Option<ResolvedSet>,
}

impl Session {
    /// Session over a snapshot of the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn new() -> Self {
        let env: Vec<(String, String)> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self::with_env(env)
    }

    /// Session over an explicit environment.
    pub fn with_env<I, K, V>(env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            env: env.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            validators: Vec::new(),
            resolved: None,
        }
    }

    /// Register a post-resolution validator.
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// The resolved set, once resolution has succeeded.
    pub fn resolved(&self) -> Option<&ResolvedSet> {
        self.resolved.as_ref()
    }

    /// Resolve `selection` against `manifest`.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::AlreadyResolved` on any call after a successful
    /// one; the first result is left untouched. Otherwise returns the first
    /// definition, cycle or secret error encountered, or
    /// `ResolveError::MissingRequiredValues` naming every required variable
    /// without a value.
    pub fn resolve(
        &mut self,
        manifest: &Manifest,
        providers: &Providers,
        selection: Selection,
    ) -> Result<&ResolvedSet> {
        if self.resolved.is_some() {
            return Err(ResolveError::AlreadyResolved.into());
        }

        let _span = info_span!("resolve", selection = ?selection).entered();

        check_definitions(manifest, providers)?;
        let names = selection.names(manifest)?;

        let mut stager = Stager::new(manifest, providers, &self.env);
        for name in &names {
            stager.stage_selected(name)?;
        }
        let staged = stager.finish();

        let missing: Vec<VarName> = staged
            .iter()
            .filter(|v| v.is_missing())
            .map(|v| v.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(ResolveError::MissingRequiredValues { names: missing }.into());
        }

        let set = ResolvedSet::new(staged);
        for validator in &self.validators {
            if !validator.should_validate(&set) {
                continue;
            }
            validator
                .validate(&set)
                .map_err(|message| ResolveError::Validation {
                    validator: validator.name().to_string(),
                    message,
                })?;
        }

        debug!(
            staged = set.len(),
            included = set.included().count(),
            "resolution complete"
        );
        Ok(&*self.resolved.insert(set))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("env_vars", &self.env.len())
            .field("validators", &self.validators.len())
            .field("resolved", &self.resolved.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{Condition, Expected, Source, VariableDefinition};
    use crate::core::provider::{AppIdentity, Lookup, Overlay, Provider, StaticConfig};
    use crate::error::Error;

    struct NoSecrets;

    impl Provider for NoSecrets {
        fn lookup(&self, key: &str) -> Result<Lookup> {
            Ok(Lookup::absent(
                crate::core::provider::AbsenceReason::NotFound,
                format!("{} missing", key),
            ))
        }

        fn name(&self) -> &'static str {
            "none"
        }
    }

    fn providers() -> Providers {
        Providers::new(AppIdentity::new("demo"), NoSecrets)
    }

    fn static_var(name: &str, key: &str) -> VariableDefinition {
        VariableDefinition::new(name, Source::StaticConfig { key: key.into() })
    }

    fn overlay(pairs: &[(&str, &str)]) -> Overlay {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn resolve(manifest: &Manifest, providers: &Providers) -> Result<ResolvedSet> {
        let mut session = Session::with_env(Vec::<(String, String)>::new());
        session
            .resolve(manifest, providers, Selection::All)
            .map(Clone::clone)
    }

    #[test]
    fn test_app_id_and_ref_default() {
        let manifest = Manifest::new(vec![
            VariableDefinition::new("app_id", Source::AppIdentity),
            static_var("BUCKET", "bucket").with_default("{ref:app_id}-assets"),
        ])
        .unwrap();

        let set = resolve(&manifest, &providers()).unwrap();
        assert_eq!(set.value("app_id"), Some("demo"));
        assert_eq!(set.value("BUCKET"), Some("demo-assets"));
        assert_eq!(
            set.get("BUCKET").unwrap().provenance,
            Some(Provenance::Default)
        );
    }

    #[test]
    fn test_condition_not_met_is_excluded() {
        let manifest = Manifest::new(vec![
            static_var("STUB_AI", "stub_ai"),
            static_var("MODEL", "model")
                .with_condition(Condition::new().and("STUB_AI", Expected::Bool(false))),
        ])
        .unwrap();
        let providers = providers().with_static_config(
            StaticConfig::default().with_environment(overlay(&[("stub_ai", "TRUE"), ("model", "m")])),
        );

        let set = resolve(&manifest, &providers).unwrap();
        let model = set.get("MODEL").unwrap();
        assert_eq!(model.provenance, Some(Provenance::ConditionNotMet));
        assert!(!model.included);
        assert_eq!(set.included().count(), 1);
    }

    #[test]
    fn test_missing_required_reported_together() {
        let manifest = Manifest::new(vec![
            static_var("A", "a"),
            static_var("B", "b").optional(),
            static_var("C", "c"),
        ])
        .unwrap();

        let err = resolve(&manifest, &providers()).unwrap_err();
        match err {
            Error::Resolve(ResolveError::MissingRequiredValues { names }) => {
                assert_eq!(names, vec!["A", "C"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_group() {
        let manifest = Manifest::new(vec![static_var("A", "a")]).unwrap();
        let mut session = Session::with_env(Vec::<(String, String)>::new());
        let err = session
            .resolve(&manifest, &providers(), Selection::Group("nope".into()))
            .unwrap_err();
        assert!(matches!(err, Error::Resolve(ResolveError::UnknownGroup(_))));
        assert!(session.resolved().is_none());
    }

    #[test]
    fn test_failed_pass_can_be_retried() {
        let manifest = Manifest::new(vec![static_var("A", "a")]).unwrap();
        let mut session = Session::with_env([("A", "1")]);

        assert!(session
            .resolve(&manifest, &providers(), Selection::Group("nope".into()))
            .is_err());
        assert!(session
            .resolve(&manifest, &providers(), Selection::All)
            .is_ok());
    }
}
