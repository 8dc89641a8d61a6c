//! Resolution output.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::process::Command;

use zeroize::Zeroizing;

use crate::core::types::VarName;

/// Values longer than this are truncated in [`ResolvedSet::report`].
const REPORT_VALUE_WIDTH: usize = 24;
const REPORT_MASK: &str = "********";

/// Which source supplied a staged value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    ProcessEnvironment,
    TestModeOverride,
    EnvironmentConfig,
    SecretStore,
    AppIdentity,
    Derived,
    Default,
    ConditionNotMet,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::ProcessEnvironment => "process-environment",
            Provenance::TestModeOverride => "test-mode-override",
            Provenance::EnvironmentConfig => "environment-config",
            Provenance::SecretStore => "secret-store",
            Provenance::AppIdentity => "app-identity",
            Provenance::Derived => "derived",
            Provenance::Default => "default",
            Provenance::ConditionNotMet => "condition-not-met",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One variable after staging.
#[derive(Clone, PartialEq, Eq)]
pub struct StagedVariable {
    pub name: VarName,
    pub value: Option<Zeroizing<String>>,
    /// `None` when no source produced a value.
    pub provenance: Option<Provenance>,
    /// Projected into the environment.
    pub included: bool,
    pub required: bool,
    /// Value came from a secret provider.
    pub secret: bool,
}

impl StagedVariable {
    pub fn value(&self) -> Option<&str> {
        self.value.as_ref().map(|v| v.as_str())
    }

    pub fn condition_met(&self) -> bool {
        self.provenance != Some(Provenance::ConditionNotMet)
    }

    /// Required, condition met, and still no value.
    pub fn is_missing(&self) -> bool {
        self.required && self.value.is_none() && self.condition_met()
    }
}

impl fmt::Debug for StagedVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match (&self.value, self.secret) {
            (Some(_), true) => Some(REPORT_MASK),
            (Some(v), false) => Some(v.as_str()),
            (None, _) => None,
        };
        f.debug_struct("StagedVariable")
            .field("name", &self.name)
            .field("value", &value)
            .field("provenance", &self.provenance)
            .field("included", &self.included)
            .finish_non_exhaustive()
    }
}

/// Complete output of one resolution pass, in manifest order.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSet {
    variables: Vec<StagedVariable>,
    index: HashMap<VarName, usize>,
}

impl ResolvedSet {
    pub(crate) fn new(variables: Vec<StagedVariable>) -> Self {
        let index = variables
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name.clone(), i))
            .collect();
        Self { variables, index }
    }

    pub fn get(&self, name: &str) -> Option<&StagedVariable> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    /// Resolved value of `name`, if any.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(StagedVariable::value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedVariable> {
        self.variables.iter()
    }

    /// Included variables as `(name, value)` pairs.
    pub fn included(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables
            .iter()
            .filter(|v| v.included)
            .filter_map(|v| v.value().map(|value| (v.name.as_str(), value)))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Write every included variable into the current process environment.
    ///
    /// Mutating the process environment is only sound while no other thread
    /// reads or writes it; call this once at startup, before spawning threads.
    pub fn project(&self) {
        for (name, value) in self.included() {
            std::env::set_var(name, value);
        }
    }

    /// Add every included variable to a child process environment.
    pub fn apply_to<'c>(&self, command: &'c mut Command) -> &'c mut Command {
        command.envs(self.included())
    }

    /// Provenance table for diagnostics. Secret values are masked.
    pub fn report(&self) -> String {
        let mut rows: Vec<&StagedVariable> = self.variables.iter().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = String::new();
        let _ = writeln!(out, "{:<25} {:<25} {:<25}", "VARIABLE", "VALUE", "SOURCE");
        let _ = writeln!(out, "{}", "-".repeat(76));
        for var in rows {
            let value = match var.value() {
                Some(_) if var.secret => REPORT_MASK.to_string(),
                Some(v) => truncate(v),
                None => "(unset)".to_string(),
            };
            let source = var.provenance.map_or("-", Provenance::as_str);
            let _ = writeln!(out, "{:<25} {:<25} {:<25}", var.name, value, source);
        }
        out
    }
}

fn truncate(value: &str) -> String {
    if value.chars().count() > REPORT_VALUE_WIDTH {
        let head: String = value.chars().take(REPORT_VALUE_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}
