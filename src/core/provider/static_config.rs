//! Static overlay provider.
//!
//! Two optional key/value documents: the test-mode overlay and the
//! environment overlay. The test-mode overlay wins.

use std::collections::BTreeMap;

use tracing::trace;

use super::{AbsenceReason, Lookup, Provider};
use crate::core::types::OverlayKey;
use crate::error::{ConfigError, Result};

/// A flat key/value overlay with every value already stringified.
pub type Overlay = BTreeMap<OverlayKey, String>;

/// Which overlay supplied a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    TestMode,
    Environment,
}

#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    test_mode: Option<Overlay>,
    environment: Option<Overlay>,
}

impl StaticConfig {
    pub fn new(test_mode: Option<Overlay>, environment: Option<Overlay>) -> Self {
        Self {
            test_mode,
            environment,
        }
    }

    pub fn with_test_mode(mut self, overlay: Overlay) -> Self {
        self.test_mode = Some(overlay);
        self
    }

    pub fn with_environment(mut self, overlay: Overlay) -> Self {
        self.environment = Some(overlay);
        self
    }

    /// Value for `key` and the overlay it came from.
    pub fn get(&self, key: &str) -> Option<(&str, Layer)> {
        let hit = self
            .test_mode
            .as_ref()
            .and_then(|o| o.get(key))
            .map(|v| (v.as_str(), Layer::TestMode))
            .or_else(|| {
                self.environment
                    .as_ref()
                    .and_then(|o| o.get(key))
                    .map(|v| (v.as_str(), Layer::Environment))
            });
        trace!(key, layer = ?hit.map(|(_, layer)| layer), "static lookup");
        hit
    }

    /// Build an overlay from a TOML table.
    ///
    /// Strings are taken as-is; booleans, numbers and datetimes are
    /// stringified (`true`/`false`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for arrays and nested tables.
    pub fn overlay_from_table(table: &toml::Table) -> Result<Overlay> {
        let mut overlay = Overlay::new();
        for (key, value) in table {
            overlay.insert(key.clone(), stringify(key, value)?);
        }
        Ok(overlay)
    }
}

fn stringify(key: &str, value: &toml::Value) -> Result<String> {
    scalar_to_string(value).ok_or_else(|| {
        ConfigError::InvalidValue {
            field: "overlay",
            reason: format!("'{}' must be a string, number or boolean", key),
        }
        .into()
    })
}

/// String form of a scalar TOML value. `None` for arrays and tables.
pub(crate) fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

impl Provider for StaticConfig {
    fn lookup(&self, key: &str) -> Result<Lookup> {
        Ok(match self.get(key) {
            Some((value, _)) => Lookup::found(value),
            None => Lookup::absent(
                AbsenceReason::NotFound,
                format!("'{}' is not set in the test-mode or environment config", key),
            ),
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
