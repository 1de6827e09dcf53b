//! Configuration management for conduit.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (CONDUIT_*)
//! 2. Config file (`<config dir>/conduit/config.toml`)
//! 3. Default values

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use conduit_core::RuntimeConfig;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tracing filter directive used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Flow file run when `conduit run` gets no path
    #[serde(default)]
    pub default_flow: Option<PathBuf>,

    /// Core runtime settings
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_log_level() -> String {
    "conduit=info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_flow: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to `path`.
    #[cfg(test)]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Override settings from `CONDUIT_*` variables looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(level) = var("CONDUIT_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(flow) = var("CONDUIT_FLOW") {
            self.default_flow = Some(PathBuf::from(flow));
        }
        if let Some(name) = var("CONDUIT_NAME") {
            self.runtime.name = name;
        }
        if let Some(cache) = var("CONDUIT_CONVERTER_CACHE") {
            self.runtime.converters.cache = parse_flag("CONDUIT_CONVERTER_CACHE", &cache)?;
        }
        if let Some(builtin) = var("CONDUIT_BUILTIN_CONVERTERS") {
            self.runtime.converters.builtin = parse_flag("CONDUIT_BUILTIN_CONVERTERS", &builtin)?;
        }
        Ok(())
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CONDUIT_CONFIG") {
            PathBuf::from(path)
        } else if let Some(dirs) = BaseDirs::new() {
            dirs.config_dir().join("conduit").join("config.toml")
        } else {
            PathBuf::from(".conduit").join("config.toml")
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{} must be a boolean, got '{}'", key, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(entries: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, "conduit=info");
        assert!(config.default_flow.is_none());
        assert!(config.runtime.converters.cache);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = tempdir().expect("Failed to create temp dir");
        let config = Config::load_from(&temp.path().join("absent.toml")).expect("Failed to load config");
        assert_eq!(config.log_level, "conduit=info");
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("conduit").join("config.toml");

        let mut config = Config::default();
        config.log_level = "conduit=debug".into();
        config.default_flow = Some(PathBuf::from("flows/main.toml"));
        config.runtime.converters.cache = false;
        config.save(&path).expect("Failed to save config");

        let loaded = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded.log_level, "conduit=debug");
        assert_eq!(loaded.default_flow, Some(PathBuf::from("flows/main.toml")));
        assert!(!loaded.runtime.converters.cache);
    }

    #[test]
    fn test_partial_file() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[runtime.converters]\nbuiltin = true\ncache = false\n").unwrap();

        let loaded = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded.log_level, "conduit=info");
        assert_eq!(loaded.runtime.name, "conduit");
        assert!(!loaded.runtime.converters.cache);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("CONDUIT_LOG_LEVEL", "conduit=trace"),
                ("CONDUIT_FLOW", "other.toml"),
                ("CONDUIT_CONVERTER_CACHE", "off"),
            ]))
            .unwrap();

        assert_eq!(config.log_level, "conduit=trace");
        assert_eq!(config.default_flow, Some(PathBuf::from("other.toml")));
        assert!(!config.runtime.converters.cache);
    }

    #[test]
    fn test_env_rejects_bad_flag() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("CONDUIT_CONVERTER_CACHE", "maybe")])).is_err());
    }
}
