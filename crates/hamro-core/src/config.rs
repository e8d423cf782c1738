use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::ai::gemini::{DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECONDS};
use crate::models::ModelDescriptor;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub default_model: Option<String>,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub user_name: Option<String>,
    pub workspace_name: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("hamro").join("config.json"))
    }

    pub fn model(&self) -> String {
        self.default_model
            .clone()
            .unwrap_or_else(|| ModelDescriptor::default_model().id.to_string())
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    pub fn user_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or("Buddy")
    }

    pub fn workspace_name(&self) -> &str {
        self.workspace_name.as_deref().unwrap_or("Hamro AI")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();

        assert_eq!(config, Config::new());
        assert_eq!(config.model(), "gemini-3-flash-preview");
        assert_eq!(config.api_base(), DEFAULT_API_BASE);
        assert_eq!(config.user_name(), "Buddy");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"default_model":"gemini-3-pro-preview"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model(), "gemini-3-pro-preview");
        assert_eq!(config.api_key, None);
        assert_eq!(config.timeout_seconds(), DEFAULT_TIMEOUT_SECONDS);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("hamro").join("config.json");

        let config = Config {
            api_key: Some("abc".to_string()),
            ..Config::new()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap().api_key.as_deref(), Some("abc"));
    }
}
