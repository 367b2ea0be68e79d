//! Configuration management for CrabCapture
//!
//! Loads and saves the capture-session options from a TOML file.

use crate::types::{CaptureMode, PreviewType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config file: {0}")]
    Write(#[source] std::io::Error),
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CrabCaptureConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

/// Capture-session behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Mode used when the device reports one it does not support
    pub default_capture_mode: CaptureMode,
    /// Lock the camera's own screen while the session is alive
    pub lock_camera_screen: bool,
    /// Reassert cached settings after a capture finishes on legacy firmware
    pub reassert_after_capture: bool,
}

/// Preview stream options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PreviewConfig {
    pub preview_type: PreviewType,
}

/// Live push options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LiveConfig {
    /// RTMP endpoint for live modes; empty refuses to start a push
    pub rtmp_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_capture_mode: CaptureMode::RecordNormal,
            lock_camera_screen: true,
            reassert_after_capture: true,
        }
    }
}

impl CrabCaptureConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config: CrabCaptureConfig = toml::from_str(&contents)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::Write)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string).map_err(ConfigError::Write)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("crabcapture.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let live_mode = self.session.default_capture_mode.is_live_mode();
        let live_preview = self.preview.preview_type == PreviewType::Live;

        if live_preview && !live_mode {
            return Err("Live preview type requires a live default capture mode".to_string());
        }
        if live_mode && !live_preview {
            return Err("Live default capture mode requires the live preview type".to_string());
        }

        Ok(())
    }
}
