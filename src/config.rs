//! Recorder configuration
//!
//! Configuration is layered: defaults, then an optional JSON file, then
//! environment overrides, then whatever the caller sets explicitly.

use crate::export::{ExportFormat, TranscodeSettings};
use crate::recorder::negotiator::DEFAULT_PREFERENCES;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const ENV_DURATION: &str = "SURFACE_RECORDER_DURATION";
const ENV_FPS: &str = "SURFACE_RECORDER_FPS";
const ENV_DOWNLOAD_DIR: &str = "SURFACE_RECORDER_DOWNLOAD_DIR";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a capture session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderConfig {
    /// Maximum recording length in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Capture sampling rate
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// How often the capture stream hands over a chunk
    #[serde(default = "default_timeslice_ms")]
    pub timeslice_ms: u64,

    /// Watchdog tick interval
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Target bitrate of the native recording
    #[serde(default = "default_video_bits_per_second")]
    pub video_bits_per_second: u64,

    /// Format the artifact should be delivered in
    #[serde(default = "default_delivery_format")]
    pub delivery_format: ExportFormat,

    /// Native recording formats, most preferred first
    #[serde(default = "default_format_preferences")]
    pub format_preferences: Vec<String>,

    /// Re-encoding settings
    #[serde(default)]
    pub transcode: TranscodeSettings,

    /// Where downloads are saved
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Base name for downloaded files
    #[serde(default = "default_suggested_name")]
    pub suggested_name: String,
}

fn default_duration_secs() -> u64 {
    10
}

fn default_fps() -> u32 {
    60
}

fn default_timeslice_ms() -> u64 {
    100
}

fn default_tick_ms() -> u64 {
    100
}

fn default_video_bits_per_second() -> u64 {
    25_000_000
}

fn default_delivery_format() -> ExportFormat {
    ExportFormat::Mp4
}

fn default_format_preferences() -> Vec<String> {
    DEFAULT_PREFERENCES.iter().map(|s| s.to_string()).collect()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_suggested_name() -> String {
    "recording".to_string()
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            fps: default_fps(),
            timeslice_ms: default_timeslice_ms(),
            tick_ms: default_tick_ms(),
            video_bits_per_second: default_video_bits_per_second(),
            delivery_format: default_delivery_format(),
            format_preferences: default_format_preferences(),
            transcode: TranscodeSettings::default(),
            download_dir: default_download_dir(),
            suggested_name: default_suggested_name(),
        }
    }
}

impl RecorderConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        tracing::debug!("Loaded recorder config from {:?}", path);
        Ok(config)
    }

    /// Save config to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply environment overrides; unparsable values are ignored
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(duration) = env::var(ENV_DURATION).ok().and_then(|v| v.parse().ok()) {
            self.duration_secs = duration;
        }
        if let Some(fps) = env::var(ENV_FPS).ok().and_then(|v| v.parse().ok()) {
            self.fps = fps;
        }
        if let Ok(dir) = env::var(ENV_DOWNLOAD_DIR) {
            if !dir.is_empty() {
                self.download_dir = PathBuf::from(dir);
            }
        }
        self
    }

    pub fn with_duration_secs(mut self, secs: u64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_delivery_format(mut self, format: ExportFormat) -> Self {
        self.delivery_format = format;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Check that every interval and limit is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration_secs == 0 {
            return Err(ConfigError::Invalid("duration must be at least 1 second".to_string()));
        }
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be positive".to_string()));
        }
        if self.timeslice_ms == 0 {
            return Err(ConfigError::Invalid("timeslice must be positive".to_string()));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("watchdog tick must be positive".to_string()));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
