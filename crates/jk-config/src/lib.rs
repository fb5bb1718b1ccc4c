//! Context configuration for the jk CLI.
//!
//! A context names a Jenkins connection: base URL, username, TLS options.
//! Contexts persist to a single YAML file in the user config directory;
//! API tokens never touch this file and live in the OS keyring instead
//! (see [`secret`]).

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod secret;

const CONFIG_DIR: &str = "jk";
const CONFIG_FILE: &str = "config.yaml";
const LEGACY_CONFIG_FILE: &str = "config.yml";
const CURRENT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("context {0:?} not found")]
    ContextNotFound(String),

    #[error("could not determine the user configuration directory")]
    NoConfigDir,

    #[error("read config: {0}")]
    Read(#[source] std::io::Error),

    #[error("write config: {0}")]
    Write(#[source] std::io::Error),

    #[error("decode config: {0}")]
    Decode(#[source] serde_yaml::Error),

    #[error("encode config: {0}")]
    Encode(#[source] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// A named Jenkins connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Context {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy: String,
    #[serde(default, rename = "ca_file", skip_serializing_if = "String::is_empty")]
    pub ca_file: String,
    #[serde(default, rename = "allow_insecure_store", skip_serializing_if = "is_false")]
    pub allow_insecure_store: bool,
}

/// User-level CLI preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(default, rename = "output_format", skip_serializing_if = "String::is_empty")]
    pub output_format: String,
    #[serde(default, rename = "max_concurrency", skip_serializing_if = "is_zero")]
    pub max_concurrency: u32,
}

/// The persisted CLI configuration.
///
/// At most one context is active at a time. The map is ordered so the
/// file stays diff-friendly across saves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub active: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contexts: BTreeMap<String, Context>,
    #[serde(default, skip_serializing_if = "preferences_empty")]
    pub preferences: Preferences,
    #[serde(skip)]
    path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            active: String::new(),
            contexts: BTreeMap::new(),
            preferences: Preferences::default(),
            path: PathBuf::new(),
        }
    }
}

impl Config {
    /// Loads configuration from the default location, returning defaults
    /// when no file exists yet. Both `config.yaml` and the legacy
    /// `config.yml` spelling are accepted.
    pub fn load() -> ConfigResult<Self> {
        let path = default_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let candidate = if path.exists() {
            path.to_path_buf()
        } else {
            let legacy = path.with_file_name(LEGACY_CONFIG_FILE);
            if legacy.exists() {
                legacy
            } else {
                let mut cfg = Config::default();
                cfg.path = path.to_path_buf();
                return Ok(cfg);
            }
        };

        let data = std::fs::read(&candidate).map_err(ConfigError::Read)?;
        let mut cfg: Config = serde_yaml::from_slice(&data).map_err(ConfigError::Decode)?;
        cfg.path = path.to_path_buf();
        Ok(cfg)
    }

    /// Persists the configuration atomically: temp file in the target
    /// directory, 0600 permissions, then rename over the destination.
    pub fn save(&mut self) -> ConfigResult<()> {
        if self.path.as_os_str().is_empty() {
            self.path = default_path()?;
        }
        if self.version == 0 {
            self.version = CURRENT_VERSION;
        }

        let dir = self
            .path
            .parent()
            .ok_or(ConfigError::NoConfigDir)?
            .to_path_buf();
        std::fs::create_dir_all(&dir).map_err(ConfigError::Write)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700));
        }

        let data = serde_yaml::to_string(self).map_err(ConfigError::Encode)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".config-")
            .suffix(".yaml")
            .tempfile_in(&dir)
            .map_err(ConfigError::Write)?;
        tmp.write_all(data.as_bytes()).map_err(ConfigError::Write)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))
                .map_err(ConfigError::Write)?;
        }
        tmp.persist(&self.path)
            .map_err(|e| ConfigError::Write(e.error))?;
        tracing::debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_context(&mut self, name: impl Into<String>, ctx: Context) {
        self.contexts.insert(name.into(), ctx);
    }

    /// Removes a named context, clearing the active selection when it
    /// pointed at the removed entry.
    pub fn remove_context(&mut self, name: &str) {
        self.contexts.remove(name);
        if self.active == name {
            self.active.clear();
        }
    }

    pub fn context(&self, name: &str) -> ConfigResult<&Context> {
        self.contexts
            .get(name)
            .ok_or_else(|| ConfigError::ContextNotFound(name.to_string()))
    }

    /// Sets the active context after verifying it exists. An empty name
    /// clears the selection.
    pub fn set_active(&mut self, name: &str) -> ConfigResult<()> {
        if name.is_empty() {
            self.active.clear();
            return Ok(());
        }
        if !self.contexts.contains_key(name) {
            return Err(ConfigError::ContextNotFound(name.to_string()));
        }
        self.active = name.to_string();
        Ok(())
    }

    /// Returns the active context, if one is selected.
    pub fn active_context(&self) -> ConfigResult<Option<(&str, &Context)>> {
        if self.active.is_empty() {
            return Ok(None);
        }
        match self.contexts.get(&self.active) {
            Some(ctx) => Ok(Some((self.active.as_str(), ctx))),
            None => Err(ConfigError::ContextNotFound(self.active.clone())),
        }
    }
}

/// Default on-disk location of the config file.
pub fn default_path() -> ConfigResult<PathBuf> {
    let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

fn is_false(v: &bool) -> bool {
    !v
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

fn preferences_empty(p: &Preferences) -> bool {
    *p == Preferences::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> Context {
        Context {
            url: "https://jenkins.example.com".to_string(),
            username: "ci-bot".to_string(),
            ..Context::default()
        }
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(cfg.version, CURRENT_VERSION);
        assert!(cfg.contexts.is_empty());
        assert!(cfg.active.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut cfg = Config::load_from(&path).unwrap();
        cfg.set_context("prod", sample_context());
        cfg.set_active("prod").unwrap();
        cfg.save().unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.active, "prod");
        assert_eq!(loaded.context("prod").unwrap(), &sample_context());
    }

    #[test]
    fn test_load_accepts_legacy_yml_extension() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("config.yml");
        std::fs::write(
            &legacy,
            "version: 1\nactive: dev\ncontexts:\n  dev:\n    url: http://localhost:8080\n",
        )
        .unwrap();

        let cfg = Config::load_from(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(cfg.active, "dev");
        assert_eq!(cfg.context("dev").unwrap().url, "http://localhost:8080");
    }

    #[test]
    fn test_set_active_unknown_context_fails() {
        let mut cfg = Config::default();
        let err = cfg.set_active("nope").unwrap_err();
        assert!(matches!(err, ConfigError::ContextNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_remove_context_clears_active() {
        let mut cfg = Config::default();
        cfg.set_context("prod", sample_context());
        cfg.set_active("prod").unwrap();
        cfg.remove_context("prod");
        assert!(cfg.active.is_empty());
        assert!(cfg.active_context().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_save_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut cfg = Config::load_from(&path).unwrap();
        cfg.set_context("prod", sample_context());
        cfg.save().unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
