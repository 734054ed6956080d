use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Narration and playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    /// Sample rate of the PCM returned by the speech service
    pub sample_rate: u32,
    pub fallback_duration_secs: f64,
    /// Pause between visual generation requests
    pub visual_delay_ms: u64,
    /// Pause between narration synthesis requests
    pub narration_delay_ms: u64,
    pub segment_load_attempts: u32,
    /// How often the player samples the playback position
    pub frame_interval_ms: u64,
    pub volume: f32,
    pub preferred_device: Option<String>,
    pub output_directory: PathBuf,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            fallback_duration_secs: 5.0,
            visual_delay_ms: 600,
            narration_delay_ms: 0,
            segment_load_attempts: 3,
            frame_interval_ms: 16,
            volume: 1.0,
            preferred_device: None,
            output_directory: PathBuf::from("narrated-deck"),
        }
    }
}

impl NarratorConfig {
    pub fn visual_delay(&self) -> Duration {
        Duration::from_millis(self.visual_delay_ms)
    }

    pub fn narration_delay(&self) -> Duration {
        Duration::from_millis(self.narration_delay_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

/// Loads and persists [`NarratorConfig`] as TOML
pub struct ConfigManager {
    config: NarratorConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        let config = match Self::load_config(&config_path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring unreadable config {}: {}", config_path.display(), e);
                NarratorConfig::default()
            }
        };

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &NarratorConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut NarratorConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ConfigError> {
        self.config.volume = volume.clamp(0.0, 1.0);
        self.save_config()
    }

    pub fn set_preferred_device(&mut self, device: Option<String>) -> Result<(), ConfigError> {
        self.config.preferred_device = device;
        self.save_config()
    }

    pub fn set_segment_load_attempts(&mut self, attempts: u32) -> Result<(), ConfigError> {
        self.config.segment_load_attempts = attempts.max(1);
        self.save_config()
    }

    pub fn set_output_directory(&mut self, directory: PathBuf) -> Result<(), ConfigError> {
        self.config.output_directory = directory;
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = NarratorConfig::default();
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("narrated-deck");

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<NarratorConfig, ConfigError> {
        if !path.exists() {
            return Ok(NarratorConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: NarratorConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;
        Ok(())
    }
}
