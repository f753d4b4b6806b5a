use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub speech: SpeechConfig,
    pub model: ModelConfig,
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Speech-to-text provider (AssemblyAI-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub language: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_endpoint: None,
            language: Some("en".to_string()),
        }
    }
}

/// Generative-text provider used for task and minutes extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_endpoint: None,
            model: "gemini-1.5-pro".to_string(),
        }
    }
}

/// Live-meeting capture settings. The browser binary, profile directory and
/// audio device all vary per machine, so none of them are hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Browser executable to drive. None lets the automation library find one.
    pub browser_path: Option<String>,
    /// Browser profile directory (needed when the meeting requires a signed-in
    /// account).
    pub user_data_dir: Option<String>,
    /// CSS selector for the meeting's join control.
    pub join_selector: String,
    /// Seconds to wait for the join control before giving up.
    pub join_timeout_seconds: u64,
    /// ffmpeg input format for the capture device (e.g. pulse, alsa, dshow).
    pub audio_format: String,
    /// Capture device identifier passed to ffmpeg.
    pub audio_device: String,
    /// Hard cap on a single capture, in seconds.
    pub max_duration_seconds: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            browser_path: None,
            user_data_dir: None,
            join_selector: "button[aria-label=\"Join now\"]".to_string(),
            join_timeout_seconds: 60,
            audio_format: "pulse".to_string(),
            audio_device: "default".to_string(),
            max_duration_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Maximum recording files kept on disk; oldest are pruned past this.
    pub max_recordings: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { max_recordings: 50 }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capture_config() {
        let capture = CaptureConfig::default();
        assert_eq!(capture.join_selector, "button[aria-label=\"Join now\"]");
        assert_eq!(capture.max_duration_seconds, 3600);
        assert!(capture.browser_path.is_none());
    }

    #[test]
    fn test_config_round_trip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, 5000);
        assert_eq!(parsed.model.model, "gemini-1.5-pro");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[server]\nport = 8080\n").unwrap();
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.server.host, "127.0.0.1");
        assert_eq!(parsed.capture.join_timeout_seconds, 60);
    }
}
