use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Centralized configuration for the export pipeline.
///
/// Loaded from `~/.chatarc/config.toml`; every field has a default so a
/// missing file means defaults, not an error. CLI flags override file values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Backend API base URL, no trailing slash.
    pub base_url: String,
    /// Randomized pre-request pacing window, milliseconds. This is
    /// deliberate anti-detection pacing, not a performance knob.
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    /// Permanent-failure attempt bound per request.
    pub max_retries: u32,
    /// Conversation listing page size.
    pub page_size: usize,
    /// Cap on conversations fetched by the listing; `None` means unlimited.
    pub conversation_limit: Option<usize>,
    /// Where export artifacts are written; `None` means current directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_url: "https://chatgpt.com/backend-api".to_owned(),
            delay_min_ms: 100,
            delay_max_ms: 3300,
            max_retries: 3,
            page_size: 100,
            conversation_limit: None,
            output_dir: None,
        }
    }
}

impl ExportConfig {
    /// Get config file path: ~/.chatarc/config.toml
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chatarc/config.toml")
    }

    /// Load config from the default location, falling back to defaults when
    /// the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|err| CoreError::config(format!("invalid TOML in {:?}: {}", path, err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)
            .map_err(|err| CoreError::config(format!("failed to serialize config: {}", err)))?;
        fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.delay_min_ms > self.delay_max_ms {
            return Err(CoreError::config(format!(
                "delay_min_ms ({}) exceeds delay_max_ms ({})",
                self.delay_min_ms, self.delay_max_ms
            )));
        }
        if self.page_size == 0 {
            return Err(CoreError::config("page_size must be at least 1"));
        }
        if self.base_url.is_empty() {
            return Err(CoreError::config("base_url must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pacing_contract() {
        let config = ExportConfig::default();
        assert_eq!(config.delay_min_ms, 100);
        assert_eq!(config.delay_max_ms, 3300);
        assert_eq!(config.max_retries, 3);
        assert!(config.conversation_limit.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ExportConfig::default();
        config.page_size = 250;
        config.conversation_limit = Some(20_000);
        config.save_to(&path).unwrap();

        let loaded = ExportConfig::load_from(&path).unwrap();
        assert_eq!(loaded.page_size, 250);
        assert_eq!(loaded.conversation_limit, Some(20_000));
        assert_eq!(loaded.base_url, config.base_url);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "page_size = 10\n").unwrap();

        let loaded = ExportConfig::load_from(&path).unwrap();
        assert_eq!(loaded.page_size, 10);
        assert_eq!(loaded.delay_max_ms, 3300);
    }

    #[test]
    fn inverted_delay_window_rejected() {
        let config = ExportConfig {
            delay_min_ms: 500,
            delay_max_ms: 100,
            ..ExportConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
