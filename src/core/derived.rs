//! Derived functions.
//!
//! A derived variable is computed from other variables by a named function
//! registered at startup. Each function declares its inputs up front; the
//! resolver stages exactly those inputs and hands the function a
//! [`DerivedContext`] that refuses access to anything else.

use std::collections::BTreeMap;

use crate::core::types::{FunctionName, VarName};
use crate::error::{ResolveError, Result};

type DeriveFn = dyn Fn(&DerivedContext<'_>) -> Result<Option<String>>;

/// A registered function and its declared inputs.
pub struct DerivedFunction {
    inputs: Vec<VarName>,
    func: Box<DeriveFn>,
}

impl DerivedFunction {
    pub fn inputs(&self) -> &[VarName] {
        &self.inputs
    }

    /// Run the function. `Ok(None)` means it produced no value.
    pub fn call(&self, ctx: &DerivedContext<'_>) -> Result<Option<String>> {
        (self.func)(ctx)
    }
}

/// Name → function table.
#[derive(Default)]
pub struct DerivedRegistry {
    functions: BTreeMap<FunctionName, DerivedFunction>,
}

impl DerivedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name`, replacing any earlier registration.
    ///
    /// # Example
    ///
    /// ```
    /// use stagecraft::DerivedRegistry;
    ///
    /// let mut registry = DerivedRegistry::new();
    /// registry.register("database_url", &["DB_HOST", "DB_NAME"], |ctx| {
    ///     Ok(Some(format!(
    ///         "postgres://{}/{}",
    ///         ctx.require("DB_HOST")?,
    ///         ctx.require("DB_NAME")?
    ///     )))
    /// });
    /// assert!(registry.contains("database_url"));
    /// ```
    pub fn register<F>(&mut self, name: &str, inputs: &[&str], func: F) -> &mut Self
    where
        F: Fn(&DerivedContext<'_>) -> Result<Option<String>> + 'static,
    {
        self.functions.insert(
            name.to_string(),
            DerivedFunction {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                func: Box::new(func),
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&DerivedFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for DerivedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.functions.keys()).finish()
    }
}

/// Read-only view of a derived function's staged inputs.
pub struct DerivedContext<'a> {
    variable: &'a str,
    function: &'a str,
    inputs: BTreeMap<&'a str, Option<&'a str>>,
}

impl<'a> DerivedContext<'a> {
    /// View for `function` computing `variable` over staged `inputs`.
    pub fn new(
        variable: &'a str,
        function: &'a str,
        inputs: BTreeMap<&'a str, Option<&'a str>>,
    ) -> Self {
        Self {
            variable,
            function,
            inputs,
        }
    }

    /// Variable being computed.
    pub fn variable(&self) -> &str {
        self.variable
    }

    /// Staged value of a declared input, `None` if it resolved absent.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::DerivedFailed` for a name the function did not
    /// declare.
    pub fn get(&self, name: &str) -> Result<Option<&'a str>> {
        self.inputs
            .get(name)
            .copied()
            .ok_or_else(|| self.fail(format!("reads undeclared input '{}'", name)))
    }

    /// Staged value of a declared input that must be present.
    pub fn require(&self, name: &str) -> Result<&'a str> {
        self.get(name)?
            .ok_or_else(|| self.fail(format!("input '{}' has no value", name)))
    }

    /// Build an error attributed to this function.
    pub fn fail(&self, reason: impl Into<String>) -> crate::error::Error {
        ResolveError::DerivedFailed {
            name: self.variable.to_string(),
            function: self.function.to_string(),
            reason: reason.into(),
        }
        .into()
    }
}
