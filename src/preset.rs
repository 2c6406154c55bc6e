//! Settings presets
//!
//! A preset is a small JSON document holding a sketch's parameter values
//! so they can be exported and loaded back later.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current preset document version
pub const PRESET_VERSION: &str = "1.0";

const DEFAULT_PRESET_NAME: &str = "My Preset";
const MAX_FILE_STEM_LEN: usize = 50;

/// Preset-related errors
#[derive(Error, Debug)]
pub enum PresetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid preset format: {0}")]
    InvalidFormat(String),
}

/// A saved set of parameter values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Document version
    #[serde(default = "default_version")]
    pub version: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// When the preset was saved (RFC 3339)
    #[serde(default)]
    pub timestamp: String,

    /// Parameter values
    pub settings: serde_json::Value,
}

fn default_version() -> String {
    PRESET_VERSION.to_string()
}

impl Preset {
    /// Create a preset stamped with the current time
    pub fn new(name: Option<&str>, settings: serde_json::Value) -> Self {
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_PRESET_NAME);

        Self {
            version: default_version(),
            name: Some(name.to_string()),
            timestamp: Utc::now().to_rfc3339(),
            settings,
        }
    }
}

/// File stem for a preset name
///
/// Every character outside `[a-zA-Z0-9]` becomes `-`, the result is
/// lower-cased and cut to 50 characters.
pub fn sanitize_preset_name(name: &str) -> String {
    let name = if name.is_empty() { "preset" } else { name };
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .take(MAX_FILE_STEM_LEN)
        .collect()
}

/// Write `settings` as a preset into `dir`, returning the file path
pub fn save_preset(
    dir: &Path,
    name: Option<&str>,
    settings: serde_json::Value,
) -> Result<PathBuf, PresetError> {
    if !settings.is_object() {
        return Err(PresetError::InvalidFormat(
            "settings must be a JSON object".to_string(),
        ));
    }

    let preset = Preset::new(name, settings);
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    let path = dir.join(format!("{}.json", sanitize_preset_name(name.unwrap_or(""))));
    let content = serde_json::to_string_pretty(&preset)?;
    fs::write(&path, content)?;

    tracing::debug!("Saved preset {:?} to {:?}", preset.name, path);
    Ok(path)
}

/// Read a preset file
///
/// The only requirement on the document is a `settings` object.
pub fn load_preset(path: &Path) -> Result<Preset, PresetError> {
    let content = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;

    match value.get("settings") {
        Some(settings) if settings.is_object() => {}
        _ => {
            return Err(PresetError::InvalidFormat(
                "missing settings object".to_string(),
            ))
        }
    }

    let preset: Preset = serde_json::from_value(value)?;
    tracing::debug!("Loaded preset {:?} from {:?}", preset.name, path);
    Ok(preset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_preset_name() {
        assert_eq!(sanitize_preset_name("Warm Glow #2"), "warm-glow--2");
        assert_eq!(sanitize_preset_name(""), "preset");
        assert_eq!(sanitize_preset_name(&"A".repeat(80)).len(), 50);
    }

    #[test]
    fn test_save_and_load_preset() {
        let dir = tempdir().unwrap();
        let settings = json!({ "count": 120, "color": "#ff8800" });

        let path = save_preset(dir.path(), Some("Particles"), settings.clone()).unwrap();
        assert_eq!(path.file_name().unwrap(), "particles.json");

        let preset = load_preset(&path).unwrap();
        assert_eq!(preset.version, PRESET_VERSION);
        assert_eq!(preset.name.as_deref(), Some("Particles"));
        assert_eq!(preset.settings, settings);
        assert!(chrono::DateTime::parse_from_rfc3339(&preset.timestamp).is_ok());
    }

    #[test]
    fn test_unnamed_preset() {
        let dir = tempdir().unwrap();
        let path = save_preset(dir.path(), None, json!({})).unwrap();
        assert_eq!(path.file_name().unwrap(), "preset.json");
        assert_eq!(load_preset(&path).unwrap().name.as_deref(), Some("My Preset"));
    }

    #[test]
    fn test_load_without_settings_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, r#"{ "version": "1.0", "name": "x" }"#).unwrap();

        assert!(matches!(load_preset(&path), Err(PresetError::InvalidFormat(_))));
    }

    #[test]
    fn test_load_minimal_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("minimal.json");
        fs::write(&path, r#"{ "settings": { "speed": 2 } }"#).unwrap();

        let preset = load_preset(&path).unwrap();
        assert!(preset.name.is_none());
        assert_eq!(preset.settings["speed"], 2);
    }

    #[test]
    fn test_non_object_settings_rejected_on_save() {
        let dir = tempdir().unwrap();
        let result = save_preset(dir.path(), Some("x"), json!([1, 2]));
        assert!(matches!(result, Err(PresetError::InvalidFormat(_))));
    }
}
