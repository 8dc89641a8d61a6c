//! Variable manifest.
//!
//! The manifest is the declarative list of every setting and secret an
//! application needs. It is loaded once and never mutated.
//!
//! ```toml
//! [[variables]]
//! name = "API_KEY"
//! source = "secret:api-key"
//! condition = { STUB_AI = false }
//! default = "{ref:APP_ID}-dev"
//! required = false
//! group = "ai"
//!
//! [groups]
//! ai = ["API_KEY"]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::core::provider::scalar_to_string;
use crate::core::types::{FunctionName, OverlayKey, SecretName, VarName};
use crate::core::validation::{validate_secret_name, validate_var_name};
use crate::error::{ManifestError, Result};

/// Where a variable's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `static:<key>`: test-mode overlay, then environment overlay.
    StaticConfig { key: OverlayKey },
    /// `secret:<name>`: the active secret provider.
    Secret { name: SecretName },
    /// `app:id`: the application id.
    AppIdentity,
    /// `derived:<function>`: a registered derived function.
    Derived { function: FunctionName },
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, arg) = s
            .split_once(':')
            .ok_or_else(|| "expected '<kind>:<value>'".to_string())?;
        let arg = arg.trim();

        match kind.trim() {
            "static" if !arg.is_empty() => Ok(Source::StaticConfig {
                key: arg.to_string(),
            }),
            "secret" if !arg.is_empty() => {
                validate_secret_name(arg).map_err(|e| e.to_string())?;
                Ok(Source::Secret {
                    name: arg.to_string(),
                })
            }
            "derived" if !arg.is_empty() => Ok(Source::Derived {
                function: arg.to_string(),
            }),
            "app" if arg == "id" => Ok(Source::AppIdentity),
            "app" => Err(format!("unknown app attribute '{}' (only 'app:id')", arg)),
            "static" | "secret" | "derived" => Err("missing value after ':'".to_string()),
            other => Err(format!(
                "unknown source kind '{}' (expected static, secret, app or derived)",
                other
            )),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::StaticConfig { key } => write!(f, "static:{}", key),
            Source::Secret { name } => write!(f, "secret:{}", name),
            Source::AppIdentity => f.write_str("app:id"),
            Source::Derived { function } => write!(f, "derived:{}", function),
        }
    }
}

/// Expected value in a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    Bool(bool),
    Text(String),
}

impl Expected {
    /// Whether a staged value satisfies this expectation.
    ///
    /// `Bool` accepts a value that reads as `true`/`false` in any case,
    /// ignoring surrounding whitespace. `Text` requires an identical string.
    pub fn matches(&self, staged: &str) -> bool {
        match self {
            Expected::Bool(expected) => parse_bool(staged) == Some(*expected),
            Expected::Text(expected) => staged == expected,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Bool(b) => write!(f, "{}", b),
            Expected::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Ordered conjunction of `variable == expected` clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    clauses: Vec<(VarName, Expected)>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, name: impl Into<VarName>, expected: Expected) -> Self {
        self.clauses.push((name.into(), expected));
        self
    }

    pub fn clauses(&self) -> &[(VarName, Expected)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub name: VarName,
    pub source: Source,
    pub condition: Option<Condition>,
    pub default: Option<String>,
    pub required: bool,
    pub group: Option<String>,
    pub description: Option<String>,
}

impl VariableDefinition {
    /// Required variable with no condition or default.
    pub fn new(name: impl Into<VarName>, source: Source) -> Self {
        Self {
            name: name.into(),
            source,
            condition: None,
            default: None,
            required: true,
            group: None,
            description: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Variables this definition names in its condition.
    pub fn condition_keys(&self) -> impl Iterator<Item = &str> {
        self.condition
            .iter()
            .flat_map(|c| c.clauses().iter().map(|(name, _)| name.as_str()))
    }
}

/// Validated, ordered set of variable definitions.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    variables: Vec<VariableDefinition>,
    /// Lowercased name to position.
    index: HashMap<String, usize>,
    groups: BTreeMap<String, Vec<VarName>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    variables: Vec<RawVariable>,
    #[serde(default)]
    groups: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVariable {
    name: String,
    source: String,
    #[serde(default)]
    condition: Option<toml::Table>,
    #[serde(default)]
    default: Option<toml::Value>,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default)]
    optional: Option<bool>,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RawVariable {
    fn into_definition(self) -> Result<VariableDefinition> {
        let name = self.name;
        validate_var_name(&name)?;

        let source = self
            .source
            .parse::<Source>()
            .map_err(|reason| ManifestError::InvalidSource {
                name: name.clone(),
                source_spec: self.source.clone(),
                reason,
            })?;

        let required = match (self.required, self.optional) {
            (Some(r), Some(o)) if r == o => {
                return Err(ManifestError::Invalid {
                    name,
                    reason: "'required' and 'optional' contradict each other".to_string(),
                }
                .into())
            }
            (Some(r), _) => r,
            (None, Some(o)) => !o,
            (None, None) => true,
        };

        let condition = self
            .condition
            .map(|table| parse_condition(&name, &table))
            .transpose()?;

        let default = self
            .default
            .map(|value| {
                scalar_to_string(&value).ok_or_else(|| ManifestError::Invalid {
                    name: name.clone(),
                    reason: "default must be a string, number or boolean".to_string(),
                })
            })
            .transpose()?;

        Ok(VariableDefinition {
            name,
            source,
            condition,
            default,
            required,
            group: self.group,
            description: self.description,
        })
    }
}

fn parse_condition(name: &str, table: &toml::Table) -> Result<Condition> {
    let mut condition = Condition::new();
    for (key, value) in table {
        let expected = match value {
            toml::Value::Boolean(b) => Expected::Bool(*b),
            toml::Value::String(s) => Expected::Text(s.clone()),
            toml::Value::Integer(i) => Expected::Text(i.to_string()),
            toml::Value::Float(f) => Expected::Text(f.to_string()),
            _ => {
                return Err(ManifestError::InvalidCondition {
                    name: name.to_string(),
                    reason: format!("value for '{}' must be a boolean, string or number", key),
                }
                .into())
            }
        };
        condition = condition.and(key.clone(), expected);
    }
    if condition.is_empty() {
        return Err(ManifestError::InvalidCondition {
            name: name.to_string(),
            reason: "condition table is empty".to_string(),
        }
        .into());
    }
    Ok(condition)
}

impl Manifest {
    /// Build a manifest from definitions, in order.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::Duplicate` if two names differ only in case,
    /// or a validation error for a name that is not a valid environment
    /// variable name.
    pub fn new(variables: Vec<VariableDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(variables.len());
        let mut groups: BTreeMap<String, Vec<VarName>> = BTreeMap::new();

        for (i, var) in variables.iter().enumerate() {
            validate_var_name(&var.name)?;
            if index.insert(var.name.to_ascii_lowercase(), i).is_some() {
                return Err(ManifestError::Duplicate {
                    name: var.name.clone(),
                }
                .into());
            }
            if let Some(group) = &var.group {
                groups.entry(group.clone()).or_default().push(var.name.clone());
            }
        }

        Ok(Self {
            variables,
            index,
            groups,
        })
    }

    /// Add explicit members to a group.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::UndefinedGroupMember` for an unknown name.
    pub fn with_group<I, S>(mut self, group: &str, members: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<VarName>,
    {
        let entry = self.groups.entry(group.to_string()).or_default();
        for member in members {
            let member = member.into();
            let Some(&i) = self.index.get(&member.to_ascii_lowercase()) else {
                return Err(ManifestError::UndefinedGroupMember {
                    group: group.to_string(),
                    name: member,
                }
                .into());
            };
            let member = self.variables[i].name.clone();
            if !entry.contains(&member) {
                entry.push(member);
            }
        }
        Ok(self)
    }

    /// Parse a TOML manifest document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let raw: RawManifest = toml::from_str(contents).map_err(ManifestError::Parse)?;

        let variables = raw
            .variables
            .into_iter()
            .map(RawVariable::into_definition)
            .collect::<Result<Vec<_>>>()?;

        let mut manifest = Self::new(variables)?;
        for (group, members) in raw.groups {
            manifest = manifest.with_group(&group, members)?;
        }

        debug!(
            variables = manifest.len(),
            groups = manifest.groups.len(),
            "loaded manifest"
        );
        Ok(manifest)
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Definitions in manifest order.
    pub fn variables(&self) -> &[VariableDefinition] {
        &self.variables
    }

    /// Definition for `name`, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&VariableDefinition> {
        self.position(name).map(|i| &self.variables[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Manifest position of `name`, matched case-insensitively.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_ascii_lowercase()).copied()
    }

    /// Members of a group, or `None` if no such group exists.
    pub fn group(&self, name: &str) -> Option<&[VarName]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
