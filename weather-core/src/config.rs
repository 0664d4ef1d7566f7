use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{location::DEFAULT_CITY_NAME, provider::cwb::DEFAULT_BASE_URL};

pub const AUTHORIZATION_KEY_ENV: &str = "CWB_AUTHORIZATION_KEY";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// authorization_key = "CWB-..."
/// cityName = "臺南市"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Open-data API key, sent as the `Authorization` query parameter.
    pub authorization_key: Option<String>,

    /// Last city saved from the settings form.
    #[serde(rename = "cityName")]
    pub city_name: Option<String>,

    /// Override of the upstream REST base URL.
    pub base_url: Option<String>,

    pub request_timeout_secs: Option<u64>,

    /// Offline sunrise/sunset dataset; when absent sun times come from the API.
    pub sun_table_path: Option<PathBuf>,
}

impl Config {
    /// Load config from the platform path, with environment overrides applied.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Ok(Self::load_from(&path)?.with_env_overrides(std::env::vars()))
    }

    /// Load config from `path`, or return an empty default if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the platform path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("tw", "cwb-weather", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn with_env_overrides<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            if key.as_ref() == AUTHORIZATION_KEY_ENV {
                let value = value.into();
                if !value.trim().is_empty() {
                    self.authorization_key = Some(value.trim().to_string());
                }
            }
        }
        self
    }

    pub fn authorization_key(&self) -> Option<&str> {
        self.authorization_key.as_deref().filter(|key| !key.is_empty())
    }

    /// Stored city, or the default city when none was saved.
    pub fn city_name(&self) -> &str {
        self.city_name.as_deref().unwrap_or(DEFAULT_CITY_NAME)
    }

    pub fn set_city_name(&mut self, city_name: impl Into<String>) {
        self.city_name = Some(city_name.into());
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_is_stored() {
        let cfg = Config::default();

        assert_eq!(cfg.city_name(), "臺北市");
        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
        assert_eq!(cfg.request_timeout_secs(), DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(cfg.authorization_key().is_none());
    }

    #[test]
    fn missing_file_loads_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config { authorization_key: Some("CWB-KEY".into()), ..Config::default() };
        cfg.set_city_name("臺南市");
        cfg.save_to(&path).unwrap();

        let stored = fs::read_to_string(&path).unwrap();
        assert!(stored.contains("cityName = \"臺南市\""));

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.city_name(), "臺南市");
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "cityName = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn env_key_overrides_stored_key() {
        let cfg = Config { authorization_key: Some("FILE".into()), ..Config::default() }
            .with_env_overrides([(AUTHORIZATION_KEY_ENV, "ENV")]);
        assert_eq!(cfg.authorization_key(), Some("ENV"));

        let cfg = Config { authorization_key: Some("FILE".into()), ..Config::default() }
            .with_env_overrides([(AUTHORIZATION_KEY_ENV, "  ")]);
        assert_eq!(cfg.authorization_key(), Some("FILE"));
    }
}
