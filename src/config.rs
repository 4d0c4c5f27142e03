use crate::storage;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Maximum entries kept; 0 keeps everything.
    pub history_limit: usize,
    pub poll_interval_ms: u64,
    pub copied_indicator_ms: u64,
    /// Entries shown in the tray menu.
    pub menu_entries: usize,
    pub preview_chars: usize,
    pub history_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_limit: 200,
            poll_interval_ms: 500,
            copied_indicator_ms: 2000,
            menu_entries: 20,
            preview_chars: 60,
            history_file: None,
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(50))
    }

    pub fn copied_indicator(&self) -> Duration {
        Duration::from_millis(self.copied_indicator_ms)
    }

    pub fn history_path(&self) -> Result<PathBuf> {
        match &self.history_file {
            Some(path) => Ok(path.clone()),
            None => storage::default_history_path(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Result<Self> {
        let base = BaseDirs::new().context("unable to resolve home directory")?;
        let path = base.home_dir().join(".config").join("clipshelf.yaml");
        Ok(Self { path })
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read config {}", self.path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parse config {}", self.path.display()))?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            storage::ensure_dir(parent)?;
        }
        let contents = serde_yaml::to_string(config)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("write config {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn config_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let store = ConfigStore::at(dir.path().join("clipshelf.yaml"));
        let mut cfg = Config::default();
        cfg.history_limit = 15;
        cfg.poll_interval_ms = 250;
        cfg.history_file = Some(PathBuf::from("custom/history.jsonl"));
        store.save(&cfg)?;
        assert_eq!(store.load()?, cfg);
        Ok(())
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("clipshelf.yaml");
        fs::write(&path, "history_limit: 3\n")?;
        let cfg = ConfigStore::at(path).load()?;
        assert_eq!(cfg.history_limit, 3);
        assert_eq!(cfg.copied_indicator(), Duration::from_secs(2));
        assert_eq!(cfg.menu_entries, Config::default().menu_entries);
        Ok(())
    }

    #[test]
    fn explicit_history_file_wins() -> Result<()> {
        let cfg = Config {
            history_file: Some(PathBuf::from("/tmp/h.jsonl")),
            ..Config::default()
        };
        assert_eq!(cfg.history_path()?, PathBuf::from("/tmp/h.jsonl"));
        Ok(())
    }

    #[test]
    fn poll_interval_has_a_floor() {
        let cfg = Config {
            poll_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(cfg.poll_interval(), Duration::from_millis(50));
    }
}
