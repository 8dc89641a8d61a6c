//! Test support utilities for stagecraft integration tests.
//!
//! Every fixture lives in its own temp directory and no test mutates the
//! process environment, so tests can run in parallel.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use stagecraft::error::Result;
use stagecraft::{AbsenceReason, AppIdentity, LocalStore, Lookup, Provider, Providers, Workspace};
use tempfile::TempDir;

/// Local store in an isolated temp directory.
pub struct StoreFixture {
    pub dir: TempDir,
    pub store: LocalStore,
}

impl StoreFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let store = LocalStore::new(dir.path().join(".secrets"), dir.path().join("cache"));
        Self { dir, store }
    }

    /// A second handle on the same file and cache.
    pub fn reopen(&self) -> LocalStore {
        LocalStore::new(self.dir.path().join(".secrets"), self.dir.path().join("cache"))
    }

    pub fn cache_file(&self) -> PathBuf {
        PathBuf::from(self.store.cache_location())
    }

    /// Delete the cached key file directly, as an operator would.
    pub fn delete_cache_file(&self) {
        std::fs::remove_file(self.cache_file()).expect("cache file should exist");
    }
}

/// In-memory secret provider that counts lookups.
#[derive(Clone, Default)]
pub struct FixedSecrets {
    values: BTreeMap<String, String>,
    lookups: Rc<Cell<usize>>,
}

impl FixedSecrets {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            lookups: Rc::default(),
        }
    }

    /// Shared lookup counter, readable after the provider is moved.
    pub fn counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.lookups)
    }
}

impl Provider for FixedSecrets {
    fn lookup(&self, key: &str) -> Result<Lookup> {
        self.lookups.set(self.lookups.get() + 1);
        Ok(match self.values.get(key) {
            Some(value) => Lookup::found(value.as_str()),
            None => Lookup::absent(AbsenceReason::NotFound, format!("'{}' not set", key)),
        })
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Providers with app id `demo` and the given secrets.
pub fn providers_with(secrets: &[(&str, &str)]) -> Providers {
    Providers::new(AppIdentity::new("demo"), FixedSecrets::new(secrets))
}

pub fn overlay(pairs: &[(&str, &str)]) -> stagecraft::core::provider::Overlay {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Project directory with a `config/` layout.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new(app_toml: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let project = Self { dir };
        project.write("app.toml", app_toml);
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, file: &str, contents: &str) {
        let config = self.dir.path().join("config");
        std::fs::create_dir_all(&config).expect("failed to create config dir");
        std::fs::write(config.join(file), contents).expect("failed to write config file");
    }

    /// Open with no environment overrides except `LOCAL_SECRETS_CACHE`,
    /// which points inside the project.
    pub fn open(&self) -> Workspace {
        let cache = self.dir.path().join("cache");
        Workspace::open_with_env(self.root(), move |key| {
            (key == "LOCAL_SECRETS_CACHE").then(|| cache.to_string_lossy().into_owned())
        })
        .expect("failed to open workspace")
    }
}
