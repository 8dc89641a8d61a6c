//! Application identity provider.

use super::{Lookup, Provider};
use crate::error::Result;

/// Answers every lookup with the fixed application id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    id: String,
}

impl AppIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Provider for AppIdentity {
    fn lookup(&self, _key: &str) -> Result<Lookup> {
        Ok(Lookup::found(self.id.as_str()))
    }

    fn name(&self) -> &'static str {
        "app"
    }
}
