//! Configuration for the hymn selector.
//!
//! Values are resolved in three layers, later layers winning:
//! - `config.json` in the user's config directory (`hymn-selector/`)
//! - environment variables: `HYMNS_CATALOG`, `HYMNS_DATABASE`,
//!   `HYMNS_LOOKBACK`, `HYMNS_FESTIVE_SLOT`, `HYMNS_SEED`
//! - command-line flags, applied by the binary

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

use crate::engine::{FestiveSlot, SelectionPolicy, DEFAULT_LOOKBACK};

const APP_NAME: &str = "hymn-selector";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_CATALOG: &str = "data/italian_hymns_full.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// JSON file holding the hymn catalog.
    pub catalog_path: PathBuf,
    /// SQLite history database. `None` uses the user's data directory.
    pub database_path: Option<PathBuf>,
    /// Number of previous services whose hymns are avoided.
    pub lookback: usize,
    /// Slot that carries the occasion on festive services.
    pub festive_slot: FestiveSlot,
    /// Fixed seed for reproducible draws.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from(DEFAULT_CATALOG),
            database_path: None,
            lookback: DEFAULT_LOOKBACK,
            festive_slot: FestiveSlot::default(),
            seed: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults if missing or unreadable), then apply
    /// environment overrides.
    pub fn load() -> Self {
        let mut config = match get_config_path().and_then(|path| Self::from_file(&path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config = serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Unparsable values are logged
    /// and ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("HYMNS_CATALOG") {
            self.catalog_path = PathBuf::from(path);
        }
        if let Some(path) = var("HYMNS_DATABASE") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(value) = var("HYMNS_LOOKBACK") {
            match value.parse() {
                Ok(lookback) => self.lookback = lookback,
                Err(_) => tracing::warn!("Ignoring invalid HYMNS_LOOKBACK '{}'", value),
            }
        }
        if let Some(value) = var("HYMNS_FESTIVE_SLOT") {
            match value.parse() {
                Ok(slot) => self.festive_slot = slot,
                Err(e) => tracing::warn!("Ignoring HYMNS_FESTIVE_SLOT: {}", e),
            }
        }
        if let Some(value) = var("HYMNS_SEED") {
            match value.parse() {
                Ok(seed) => self.seed = Some(seed),
                Err(_) => tracing::warn!("Ignoring invalid HYMNS_SEED '{}'", value),
            }
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            lookback: self.lookback,
            festive_slot: self.festive_slot,
        }
    }

    /// Write the configuration to the user's config directory.
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.lookback, 4);
        assert_eq!(config.festive_slot, FestiveSlot::Opening);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"lookback": 6, "festive_slot": "closing"}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.lookback, 6);
        assert_eq!(config.festive_slot, FestiveSlot::Closing);
        assert_eq!(config.catalog_path, PathBuf::from(DEFAULT_CATALOG));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("HYMNS_CATALOG", "/srv/hymns.json"),
            ("HYMNS_DATABASE", "/srv/history.db"),
            ("HYMNS_LOOKBACK", "2"),
            ("HYMNS_FESTIVE_SLOT", "closing"),
            ("HYMNS_SEED", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.catalog_path, PathBuf::from("/srv/hymns.json"));
        assert_eq!(config.database_path, Some(PathBuf::from("/srv/history.db")));
        assert_eq!(
            config.policy(),
            SelectionPolicy {
                lookback: 2,
                festive_slot: FestiveSlot::Closing,
            }
        );
        assert!(config.seed.is_none());
    }
}
