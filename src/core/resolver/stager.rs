//! Depth-first staging.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::staged::{Provenance, StagedVariable};
use crate::core::derived::DerivedContext;
use crate::core::manifest::{Manifest, Source, VariableDefinition};
use crate::core::placeholder;
use crate::core::provider::{Layer, Lookup, Providers};
use crate::core::types::VarName;
use crate::error::{ResolveError, Result};

/// Reject definitions that could never resolve, before any value is staged.
pub(super) fn check_definitions(manifest: &Manifest, providers: &Providers) -> Result<()> {
    let undefined = |name: &str, referenced_by: &str| ResolveError::UndefinedVariable {
        name: name.to_string(),
        referenced_by: referenced_by.to_string(),
    };

    for var in manifest.variables() {
        for key in var.condition_keys() {
            if !manifest.contains(key) {
                return Err(undefined(key, &var.name).into());
            }
        }

        if let Some(default) = &var.default {
            for reference in placeholder::references(default) {
                if !manifest.contains(reference) {
                    return Err(undefined(reference, &var.name).into());
                }
            }
        }

        if let Source::Derived { function } = &var.source {
            let func = providers
                .derived
                .get(function)
                .ok_or_else(|| ResolveError::UnknownFunction {
                    name: var.name.clone(),
                    function: function.clone(),
                })?;
            for input in func.inputs() {
                if !manifest.contains(input) {
                    return Err(undefined(input, &var.name).into());
                }
            }
        }
    }
    Ok(())
}

/// What staging produced for one variable before it is recorded.
struct Outcome {
    value: Option<String>,
    provenance: Option<Provenance>,
    secret: bool,
}

impl Outcome {
    fn absent() -> Self {
        Self {
            value: None,
            provenance: None,
            secret: false,
        }
    }

    fn condition_not_met() -> Self {
        Self {
            value: None,
            provenance: Some(Provenance::ConditionNotMet),
            secret: false,
        }
    }
}

/// State of one resolution pass.
pub(super) struct Stager<'a> {
    manifest: &'a Manifest,
    providers: &'a Providers,
    env: &'a HashMap<String, String>,
    staged: HashMap<VarName, StagedVariable>,
    /// Names currently being staged, outermost first.
    in_progress: Vec<VarName>,
}

impl<'a> Stager<'a> {
    pub(super) fn new(
        manifest: &'a Manifest,
        providers: &'a Providers,
        env: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            manifest,
            providers,
            env,
            staged: HashMap::with_capacity(manifest.len()),
            in_progress: Vec::new(),
        }
    }

    /// Stage `name` for inclusion in the output.
    pub(super) fn stage_selected(&mut self, name: &str) -> Result<()> {
        self.stage(name, None, true).map(|_| ())
    }

    /// Staged variables in manifest order.
    pub(super) fn finish(self) -> Vec<StagedVariable> {
        let manifest = self.manifest;
        let mut staged: Vec<StagedVariable> = self.staged.into_values().collect();
        staged.sort_by_key(|v| manifest.position(&v.name).unwrap_or(usize::MAX));
        staged
    }

    /// Stage `name` once and return its declared spelling, which keys the
    /// staged map however the name was written at the call site.
    fn stage(&mut self, name: &str, referenced_by: Option<&str>, include: bool) -> Result<&'a str> {
        let manifest = self.manifest;
        let definition = manifest
            .get(name)
            .ok_or_else(|| ResolveError::UndefinedVariable {
                name: name.to_string(),
                referenced_by: referenced_by.unwrap_or("selection").to_string(),
            })?;
        let name = definition.name.as_str();

        if let Some(existing) = self.staged.get_mut(name) {
            if include && existing.value.is_some() && existing.condition_met() {
                existing.included = true;
            }
            return Ok(name);
        }

        if let Some(value) = self.env.get(name) {
            trace!(name, "process environment override");
            self.record(
                definition,
                Outcome {
                    value: Some(value.clone()),
                    provenance: Some(Provenance::ProcessEnvironment),
                    secret: false,
                },
                true,
            );
            return Ok(name);
        }

        if let Some(start) = self.in_progress.iter().position(|n| n == name) {
            let mut chain = self.in_progress[start..].to_vec();
            chain.push(name.to_string());
            return Err(ResolveError::CircularDependency {
                name: name.to_string(),
                chain,
            }
            .into());
        }

        self.in_progress.push(name.to_string());
        let outcome = self.compute(definition);
        self.in_progress.pop();

        self.record(definition, outcome?, include);
        Ok(name)
    }

    fn record(&mut self, definition: &VariableDefinition, outcome: Outcome, include: bool) {
        let included = include
            && outcome.value.is_some()
            && outcome.provenance != Some(Provenance::ConditionNotMet);
        debug!(
            name = %definition.name,
            provenance = ?outcome.provenance,
            has_value = outcome.value.is_some(),
            included,
            "staged"
        );
        self.staged.insert(
            definition.name.clone(),
            StagedVariable {
                name: definition.name.clone(),
                value: outcome.value.map(Zeroizing::new),
                provenance: outcome.provenance,
                included,
                required: definition.required,
                secret: outcome.secret,
            },
        );
    }

    fn compute(&mut self, definition: &VariableDefinition) -> Result<Outcome> {
        let name = definition.name.as_str();

        if !self.condition_holds(definition)? {
            return Ok(Outcome::condition_not_met());
        }

        let mut outcome = self.dispatch(definition)?;

        if let Some(raw) = outcome.value.take() {
            outcome.value = Some(self.expand(name, &raw)?);
            return Ok(outcome);
        }

        if let Some(default) = &definition.default {
            return Ok(Outcome {
                value: Some(self.expand(name, default)?),
                provenance: Some(Provenance::Default),
                secret: false,
            });
        }

        Ok(Outcome::absent())
    }

    /// Evaluate the condition, staging each key first.
    fn condition_holds(&mut self, definition: &VariableDefinition) -> Result<bool> {
        let Some(condition) = &definition.condition else {
            return Ok(true);
        };
        let name = definition.name.as_str();

        for (key, expected) in condition.clauses() {
            let key = self.stage(key, Some(name), false)?;
            match self.staged.get(key).and_then(StagedVariable::value) {
                None if definition.required => {
                    return Err(ResolveError::ConditionEvaluation {
                        name: name.to_string(),
                        key: key.to_string(),
                    }
                    .into())
                }
                None => {
                    trace!(name, key = %key, "condition key absent");
                    return Ok(false);
                }
                Some(actual) if !expected.matches(actual) => {
                    trace!(name, key = %key, expected = %expected, "condition not met");
                    return Ok(false);
                }
                Some(_) => {}
            }
        }
        Ok(true)
    }

    fn dispatch(&mut self, definition: &VariableDefinition) -> Result<Outcome> {
        let name = definition.name.as_str();
        let providers = self.providers;

        match &definition.source {
            Source::StaticConfig { key } => Ok(match providers.static_config.get(key) {
                Some((value, layer)) => Outcome {
                    value: Some(value.to_string()),
                    provenance: Some(match layer {
                        Layer::TestMode => Provenance::TestModeOverride,
                        Layer::Environment => Provenance::EnvironmentConfig,
                    }),
                    secret: false,
                },
                None => Outcome::absent(),
            }),

            Source::Secret { name: secret } => match providers.secrets.lookup(secret)? {
                Lookup::Found(value) => Ok(Outcome {
                    value: Some(value.to_string()),
                    provenance: Some(Provenance::SecretStore),
                    secret: true,
                }),
                Lookup::Absent(_) if definition.default.is_some() => {
                    debug!(name, secret = %secret, "secret unavailable, using default");
                    Ok(Outcome::absent())
                }
                Lookup::Absent(absence) => Err(ResolveError::SecretUnavailable {
                    name: name.to_string(),
                    secret: secret.clone(),
                    provider: providers.secrets.name().to_string(),
                    reason: absence.detail.clone(),
                    guidance: format!(
                        "{}; or export {} to override it, or declare a default",
                        absence.guidance(),
                        name
                    ),
                }
                .into()),
            },

            Source::AppIdentity => Ok(Outcome {
                value: Some(providers.app.id().to_string()),
                provenance: Some(Provenance::AppIdentity),
                secret: false,
            }),

            Source::Derived { function } => {
                let func =
                    providers
                        .derived
                        .get(function)
                        .ok_or_else(|| ResolveError::UnknownFunction {
                            name: name.to_string(),
                            function: function.clone(),
                        })?;

                let mut declared = Vec::with_capacity(func.inputs().len());
                for input in func.inputs() {
                    declared.push((input.as_str(), self.stage(input, Some(name), false)?));
                }

                let inputs: BTreeMap<&str, Option<&str>> = declared
                    .into_iter()
                    .map(|(input, staged_as)| {
                        let value = self.staged.get(staged_as).and_then(StagedVariable::value);
                        (input, value)
                    })
                    .collect();
                let ctx = DerivedContext::new(name, function, inputs);
                let value = func.call(&ctx)?;

                Ok(Outcome {
                    value,
                    provenance: Some(Provenance::Derived),
                    secret: false,
                })
            }
        }
    }

    /// Substitute `{ref:..}` placeholders with staged values.
    fn expand(&mut self, name: &str, value: &str) -> Result<String> {
        if !placeholder::has_references(value) {
            return Ok(value.to_string());
        }
        placeholder::expand(value, |reference| self.reference(name, reference))
    }

    fn reference(&mut self, name: &str, reference: &str) -> Result<String> {
        if !self.manifest.contains(reference) {
            return Err(ResolveError::UndefinedVariable {
                name: reference.to_string(),
                referenced_by: name.to_string(),
            }
            .into());
        }
        let staged_as = self.stage(reference, Some(name), false)?;
        self.staged
            .get(staged_as)
            .and_then(StagedVariable::value)
            .map(str::to_string)
            .ok_or_else(|| {
                ResolveError::UnresolvedReference {
                    name: name.to_string(),
                    reference: reference.to_string(),
                }
                .into()
            })
    }
}
