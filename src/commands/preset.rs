//! Preset commands

use crate::capture::TestPattern;
use crate::preset::{load_preset, save_preset, Preset};
use crate::utils::error::AppResult;
use std::path::{Path, PathBuf};

/// Save test pattern settings as a preset
///
/// `settings` is a JSON object; when absent the default pattern is saved.
pub fn run_preset_save(
    dir: &Path,
    name: Option<&str>,
    settings: Option<&str>,
) -> AppResult<PathBuf> {
    let settings = match settings {
        Some(raw) => serde_json::from_str(raw)?,
        None => serde_json::to_value(TestPattern::default())?,
    };

    let path = save_preset(dir, name, settings)?;
    println!("Saved preset to {}", path.display());
    Ok(path)
}

/// Load a preset and print its settings
pub fn run_preset_load(path: &Path) -> AppResult<Preset> {
    let preset = load_preset(path)?;
    println!(
        "{} (saved {})",
        preset.name.as_deref().unwrap_or("unnamed preset"),
        preset.timestamp
    );
    println!("{}", serde_json::to_string_pretty(&preset.settings)?);
    Ok(preset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::AppError;
    use tempfile::tempdir;

    #[test]
    fn test_save_default_pattern_and_load() {
        let dir = tempdir().unwrap();
        let path = run_preset_save(dir.path(), Some("Default Bands"), None).unwrap();
        assert_eq!(path.file_name().unwrap(), "default-bands.json");

        let preset = run_preset_load(&path).unwrap();
        let pattern: TestPattern = serde_json::from_value(preset.settings).unwrap();
        assert_eq!(pattern, TestPattern::default());
    }

    #[test]
    fn test_invalid_settings_json() {
        let dir = tempdir().unwrap();
        let result = run_preset_save(dir.path(), None, Some("{not json"));
        assert!(matches!(result, Err(AppError::Serialization(_))));
    }
}
