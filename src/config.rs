//! Configuration management for crm-notes.
//!
//! Settings live in `crm-notes.yaml` in the working directory:
//!
//! ```yaml
//! backend: http
//! base_url: https://crm.example.com/api
//! timeout_secs: 30
//! read_retries: 2
//! max_attachment_bytes: 5242880
//! ```
//!
//! `CRM_NOTES_BASE_URL` overrides `base_url` when set.

use crate::codec::DEFAULT_MAX_ATTACHMENT_BYTES;
use crate::error::{Error, Result};
use crate::tasks::{HttpTaskStore, SqliteTaskStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file path relative to the base directory.
pub const CONFIG_FILE_PATH: &str = "crm-notes.yaml";

/// Environment variable overriding [`Config::base_url`].
pub const BASE_URL_ENV: &str = "CRM_NOTES_BASE_URL";

/// Database file used by the `sqlite` backend when none is configured.
pub const DEFAULT_DATABASE_PATH: &str = ".crm-notes/tasks.sqlite3";

/// Which task store to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The CRM REST API.
    #[default]
    Http,
    /// A local `SQLite` file.
    Sqlite,
}

/// crm-notes configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Store backend.
    #[serde(default)]
    pub backend: Backend,

    /// Root URL of the REST API. Required for the `http` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Database path for the `sqlite` backend, relative to the base directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How many times a failed read is retried. Writes are never retried.
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    /// Largest attachment accepted, in raw bytes.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: usize,
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_read_retries() -> u32 {
    2
}

const fn default_max_attachment_bytes() -> usize {
    DEFAULT_MAX_ATTACHMENT_BYTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            base_url: None,
            database_path: None,
            timeout_secs: default_timeout_secs(),
            read_retries: default_read_retries(),
            max_attachment_bytes: default_max_attachment_bytes(),
        }
    }
}

impl Config {
    /// Load config from a specific base directory, returning None if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_from(base_dir: &Path) -> Result<Option<Self>> {
        let config_path = Self::config_path(base_dir);
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Load config from `base_dir` (or defaults) and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn resolve(base_dir: &Path) -> Result<Self> {
        let mut config = Self::load_from(base_dir)?.unwrap_or_default();
        if let Some(url) = std::env::var(BASE_URL_ENV).ok().filter(|u| !u.trim().is_empty()) {
            config.base_url = Some(url);
        }
        Ok(config)
    }

    /// Save config to a specific base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, base_dir: &Path) -> Result<()> {
        let config_path = Self::config_path(base_dir);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config file path for a base directory.
    pub fn config_path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE_PATH)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check that the settings needed by the selected backend are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.backend == Backend::Http {
            let url = self.base_url.as_deref().unwrap_or_default();
            if url.trim().is_empty() {
                return Err(Error::Config(format!(
                    "the http backend needs base_url in {CONFIG_FILE_PATH} or {BASE_URL_ENV}"
                )));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::Config(format!("base_url must be an http(s) URL, got '{url}'")));
            }
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Build the REST store described by this config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the config is not valid for `http`.
    pub fn http_store(&self) -> Result<HttpTaskStore> {
        self.validate()?;
        let url = self.base_url.as_deref().unwrap_or_default();
        Ok(HttpTaskStore::new(url, self.timeout(), self.read_retries))
    }

    /// Open the `SQLite` store described by this config.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn sqlite_store(&self, base_dir: &Path) -> Result<SqliteTaskStore> {
        let path = self.database_path.as_deref().unwrap_or_else(|| Path::new(DEFAULT_DATABASE_PATH));
        SqliteTaskStore::new(base_dir.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_config() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load_from(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            base_url: Some("https://crm.example.com/api".to_string()),
            read_retries: 5,
            ..Config::default()
        };
        config.save_to(dir.path()).unwrap();

        let loaded = Config::load_from(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let dir = TempDir::new().unwrap();
        std::fs::write(Config::config_path(dir.path()), "backend: sqlite\n").unwrap();

        let loaded = Config::load_from(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.backend, Backend::Sqlite);
        assert_eq!(loaded.timeout_secs, 30);
        assert_eq!(loaded.read_retries, 2);
        assert_eq!(loaded.max_attachment_bytes, DEFAULT_MAX_ATTACHMENT_BYTES);
    }

    #[test]
    fn test_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(Config::config_path(dir.path()), "backend: [unclosed").unwrap();
        assert!(Config::load_from(dir.path()).is_err());
    }

    #[test]
    fn test_validate_http_requires_url() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config { base_url: Some("ftp://x".to_string()), ..Config::default() };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config { base_url: Some("http://localhost:8080".to_string()), ..Config::default() };
        assert!(config.validate().is_ok());
        assert_eq!(config.http_store().unwrap().base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_validate_sqlite_needs_no_url() {
        let config = Config { backend: Backend::Sqlite, ..Config::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config { backend: Backend::Sqlite, timeout_secs: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    /// Sets an environment variable for the duration of a test.
    struct EnvGuard {
        name: &'static str,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(name: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(name).ok();
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
            Self { name, original }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(value) => std::env::set_var(self.name, value),
                None => std::env::remove_var(self.name),
            }
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_resolve_env_overrides_base_url() {
        let dir = TempDir::new().unwrap();
        Config { base_url: Some("https://file.example.com".to_string()), ..Config::default() }
            .save_to(dir.path())
            .unwrap();
        let _env = EnvGuard::set(BASE_URL_ENV, Some("https://env.example.com"));

        let config = Config::resolve(dir.path()).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://env.example.com"));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial_test::serial]
    fn test_resolve_without_file_uses_env() {
        let dir = TempDir::new().unwrap();
        let _env = EnvGuard::set(BASE_URL_ENV, Some("http://localhost:8080"));

        let config = Config::resolve(dir.path()).unwrap();
        assert_eq!(config.backend, Backend::Http);
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    #[serial_test::serial]
    fn test_resolve_ignores_blank_env() {
        let dir = TempDir::new().unwrap();
        Config { base_url: Some("https://file.example.com".to_string()), ..Config::default() }
            .save_to(dir.path())
            .unwrap();
        let _env = EnvGuard::set(BASE_URL_ENV, Some("   "));

        let config = Config::resolve(dir.path()).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://file.example.com"));
    }

    #[test]
    #[serial_test::serial]
    fn test_resolve_without_file_or_env_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let _env = EnvGuard::set(BASE_URL_ENV, None);

        let config = Config::resolve(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sqlite_store_uses_default_path() {
        let dir = TempDir::new().unwrap();
        let config = Config { backend: Backend::Sqlite, ..Config::default() };
        let store = config.sqlite_store(dir.path()).unwrap();
        assert_eq!(store.db_path(), dir.path().join(DEFAULT_DATABASE_PATH));
        assert!(store.db_path().exists());
    }
}
