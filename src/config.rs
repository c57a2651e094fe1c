use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use anyhow::{Result, anyhow};

use crate::client::DEFAULT_SERVER_URL;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub server_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        Ok(())
    }

    /// Resolved server endpoint, falling back to the built-in default.
    pub fn endpoint(&self) -> String {
        self.server_url
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("medbot").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_falls_back_to_default() {
        let config = Config::default();
        assert_eq!(config.endpoint(), DEFAULT_SERVER_URL);
    }

    #[test]
    fn endpoint_prefers_configured_url() {
        let config = Config {
            server_url: Some("http://chat.example:9000".to_string()),
        };
        assert_eq!(config.endpoint(), "http://chat.example:9000");
    }

    #[test]
    fn empty_file_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.server_url.is_none());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config {
            server_url: Some("http://localhost:8123".to_string()),
        };
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded: Config = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.server_url.as_deref(), Some("http://localhost:8123"));
    }
}
