//! Project layout.
//!
//! A workspace is a project root with a `config/` directory:
//!
//! ```text
//! config/
//! ├── app.toml            # application id and secret manager settings
//! ├── variables.toml      # variable manifest
//! ├── environments.toml   # [environments.<name>] overlays (optional)
//! └── tests.toml          # [modes.<name>] overlays (optional)
//! ```
//!
//! `LOCAL_SECRETS_REPO`, `LOCAL_SECRETS_CACHE` and `PROJECT_ID` override the
//! matching `app.toml` settings.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::core::constants;
use crate::core::manifest::Manifest;
use crate::core::provider::{
    AppIdentity, LocalSecrets, Overlay, Provider, Providers, RemoteSecrets, StaticConfig,
};
use crate::core::store::{default_cache_root_dir, LocalStore};
use crate::error::{ConfigError, Result};

/// `config/app.toml`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application id, served by `app:id`.
    pub id: String,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

/// `[secrets]` section of `app.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretsConfig {
    #[serde(default)]
    pub manager: SecretManager,
    /// Secrets file, relative to the project root.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Directory for the cached key.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Remote project (google manager only).
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Which secret provider `secret:` variables use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretManager {
    #[default]
    Local,
    Google,
}

/// Environment overrides captured when the workspace is opened.
#[derive(Debug, Clone, Default)]
struct Overrides {
    secrets_repo: Option<PathBuf>,
    secrets_cache: Option<PathBuf>,
    project_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: AppConfig,
    overrides: Overrides,
}

impl Workspace {
    /// Open the project at `root`, reading overrides from the process
    /// environment.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_env(root, |key| std::env::var(key).ok())
    }

    /// Open the project at `root` with an explicit environment lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if `config/app.toml` is missing, or a
    /// parse error if it is malformed.
    pub fn open_with_env<F>(root: impl AsRef<Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = root.as_ref().to_path_buf();
        let path = root.join(constants::CONFIG_DIR).join(constants::APP_FILE);

        let contents = read_optional(&path)?.ok_or_else(|| ConfigError::NotFound(path.clone()))?;
        let config: AppConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        if config.id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "id",
                reason: "application id cannot be empty".to_string(),
            }
            .into());
        }

        let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());
        let overrides = Overrides {
            secrets_repo: non_empty(constants::ENV_SECRETS_REPO).map(PathBuf::from),
            secrets_cache: non_empty(constants::ENV_SECRETS_CACHE).map(PathBuf::from),
            project_id: non_empty(constants::ENV_PROJECT_ID),
        };

        debug!(root = %root.display(), id = %config.id, manager = ?config.secrets.manager, "opened workspace");
        Ok(Self {
            root,
            config,
            overrides,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn config_path(&self, file: &str) -> PathBuf {
        self.root.join(constants::CONFIG_DIR).join(file)
    }

    pub fn app_identity(&self) -> AppIdentity {
        AppIdentity::new(self.config.id.as_str())
    }

    /// Load `config/variables.toml`.
    pub fn manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.config_path(constants::MANIFEST_FILE))
    }

    /// Path of the local secrets file.
    pub fn secrets_file(&self) -> PathBuf {
        if let Some(path) = &self.overrides.secrets_repo {
            return path.clone();
        }
        let file = self
            .config
            .secrets
            .file
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::SECRETS_FILE));
        self.root.join(file)
    }

    /// Directory holding the cached key.
    pub fn cache_root(&self) -> PathBuf {
        self.overrides
            .secrets_cache
            .clone()
            .or_else(|| self.config.secrets.cache_dir.clone())
            .unwrap_or_else(default_cache_root_dir)
    }

    /// Remote project id, environment first.
    pub fn project_id(&self) -> Option<&str> {
        self.overrides
            .project_id
            .as_deref()
            .or(self.config.secrets.project_id.as_deref())
    }

    /// The local encrypted store for this project.
    pub fn local_store(&self) -> LocalStore {
        LocalStore::new(self.secrets_file(), self.cache_root())
    }

    /// The configured secret provider.
    pub fn secret_provider(&self) -> Box<dyn Provider> {
        match self.config.secrets.manager {
            SecretManager::Local => Box::new(LocalSecrets::new(self.local_store())),
            SecretManager::Google => {
                Box::new(RemoteSecrets::new(self.project_id().map(str::to_string)))
            }
        }
    }

    /// Overlays for the named environment and test mode.
    ///
    /// A missing overlay file is an empty overlay. Naming an entry the file
    /// does not define is an error.
    pub fn static_config(
        &self,
        environment: Option<&str>,
        test_mode: Option<&str>,
    ) -> Result<StaticConfig> {
        let environment = match environment {
            Some(name) => self.overlay(constants::ENVIRONMENTS_FILE, "environments", name)?,
            None => None,
        };
        let test_mode = match test_mode {
            Some(name) => self.overlay(constants::TESTS_FILE, "modes", name)?,
            None => None,
        };
        Ok(StaticConfig::new(test_mode, environment))
    }

    /// Providers for one resolution pass. Register derived functions with
    /// [`Providers::with_derived`].
    pub fn providers(&self, environment: Option<&str>, test_mode: Option<&str>) -> Result<Providers> {
        Ok(Providers {
            static_config: self.static_config(environment, test_mode)?,
            secrets: self.secret_provider(),
            app: self.app_identity(),
            derived: Default::default(),
        })
    }

    fn overlay(&self, file: &str, section: &str, name: &str) -> Result<Option<Overlay>> {
        let path = self.config_path(file);
        let Some(contents) = read_optional(&path)? else {
            debug!(path = %path.display(), "no overlay file");
            return Ok(None);
        };

        let document: toml::Table = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        let entries = document
            .get(section)
            .and_then(toml::Value::as_table)
            .cloned()
            .unwrap_or_default();

        let Some(table) = entries.get(name).and_then(toml::Value::as_table) else {
            let available = entries.keys().cloned().collect();
            return Err(if section == "modes" {
                ConfigError::UnknownTestMode {
                    name: name.to_string(),
                    available,
                }
            } else {
                ConfigError::UnknownEnvironment {
                    name: name.to_string(),
                    available,
                }
            }
            .into());
        };

        let overlay = StaticConfig::overlay_from_table(table)?;
        debug!(file, name, keys = overlay.len(), "loaded overlay");
        Ok(Some(overlay))
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    fn write(root: &Path, file: &str, contents: &str) {
        let dir = root.join(constants::CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), contents).unwrap();
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_app_config() {
        let tmp = TempDir::new().unwrap();
        let err = Workspace::open_with_env(tmp.path(), no_env).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NotFound(_))));
        assert!(err.suggestion().unwrap().contains("app.toml"));
    }

    #[test]
    fn test_defaults() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app.toml", "id = \"demo\"\n");

        let ws = Workspace::open_with_env(tmp.path(), no_env).unwrap();
        assert_eq!(ws.config().secrets.manager, SecretManager::Local);
        assert_eq!(ws.secrets_file(), tmp.path().join(".secrets"));
        assert_eq!(ws.app_identity().id(), "demo");
        assert_eq!(ws.secret_provider().name(), "local");
        assert!(ws.project_id().is_none());
    }

    #[test]
    fn test_env_overrides() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "app.toml",
            r#"
            id = "demo"
            [secrets]
            manager = "google"
            project_id = "from-file"
            cache_dir = "/var/cache/demo"
            "#,
        );

        let ws = Workspace::open_with_env(tmp.path(), |key| match key {
            "PROJECT_ID" => Some("from-env".to_string()),
            "LOCAL_SECRETS_REPO" => Some("/srv/secrets".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(ws.project_id(), Some("from-env"));
        assert_eq!(ws.secrets_file(), PathBuf::from("/srv/secrets"));
        assert_eq!(ws.cache_root(), PathBuf::from("/var/cache/demo"));
        assert_eq!(ws.secret_provider().name(), "google");
    }

    #[test]
    fn test_empty_id_rejected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app.toml", "id = \"\"\n");
        assert!(Workspace::open_with_env(tmp.path(), no_env).is_err());
    }

    #[test]
    fn test_overlays() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app.toml", "id = \"demo\"\n");
        write(
            tmp.path(),
            "environments.toml",
            r#"
            [environments.dev]
            port = 8080
            [environments.prod]
            port = 80
            "#,
        );
        write(
            tmp.path(),
            "tests.toml",
            r#"
            [modes.unit]
            port = 9000
            stub_ai = true
            "#,
        );

        let ws = Workspace::open_with_env(tmp.path(), no_env).unwrap();
        let config = ws.static_config(Some("dev"), Some("unit")).unwrap();
        assert_eq!(config.get("port").unwrap().0, "9000");
        assert_eq!(config.get("stub_ai").unwrap().0, "true");

        let config = ws.static_config(Some("prod"), None).unwrap();
        assert_eq!(config.get("port").unwrap().0, "80");

        let err = ws.static_config(Some("staging"), None).unwrap_err();
        match err {
            Error::Config(ConfigError::UnknownEnvironment { available, .. }) => {
                assert_eq!(available, vec!["dev", "prod"]);
            }
            other => panic!("unexpected error: {}", other),
        }

        assert!(matches!(
            ws.static_config(None, Some("e2e")),
            Err(Error::Config(ConfigError::UnknownTestMode { .. }))
        ));
    }

    #[test]
    fn test_missing_overlay_files_are_empty() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app.toml", "id = \"demo\"\n");

        let ws = Workspace::open_with_env(tmp.path(), no_env).unwrap();
        let config = ws.static_config(Some("dev"), Some("unit")).unwrap();
        assert!(config.get("anything").is_none());
    }
}
