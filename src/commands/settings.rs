//! Commands for flasher settings files.
//!
//! Settings are read from the file named by `--config`; without one the
//! built-in defaults apply.

use std::path::{Path, PathBuf};

use crate::settings::{FlasherSettings, SettingsManager};

/// Load settings from `path`, or defaults when no file was given.
pub fn load_settings(path: Option<&Path>) -> Result<FlasherSettings, String> {
    match path {
        Some(path) => SettingsManager::new(path).load(),
        None => Ok(FlasherSettings::default()),
    }
}

/// Effective settings as pretty-printed JSON.
pub fn show_settings(path: Option<&Path>) -> Result<String, String> {
    let settings = load_settings(path)?;

    if settings.has_non_default_settings() {
        log::debug!("using non-default settings from {:?}", path);
    }

    serde_json::to_string_pretty(&settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))
}

/// Write a settings file holding the defaults.
///
/// An existing file is left alone.
pub fn init_settings(path: &Path) -> Result<PathBuf, String> {
    if path.exists() {
        return Err(format!("Settings file {} already exists", path.display()));
    }

    let manager = SettingsManager::new(path);
    manager.save(&FlasherSettings::default())?;
    Ok(manager.settings_path().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestContext;

    #[test]
    fn test_show_without_file_is_defaults() {
        let json = show_settings(None).unwrap();
        let settings: FlasherSettings = serde_json::from_str(&json).unwrap();

        assert_eq!(settings, FlasherSettings::default());
    }

    #[test]
    fn test_init_then_load_round_trip() {
        let ctx = TestContext::new();
        let path = ctx.path("conf/flasher.json");

        let written = init_settings(&path).unwrap();

        assert_eq!(written, path);
        assert!(ctx.read_file("conf/flasher.json").contains("\"remount_timeout_ms\": 100000"));
        assert_eq!(load_settings(Some(&path)).unwrap(), FlasherSettings::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let ctx = TestContext::new();
        let path = ctx.create_file("flasher.json", r#"{"strict_remount": true}"#);

        let err = init_settings(&path).unwrap_err();

        assert!(err.contains("already exists"));
        assert!(load_settings(Some(&path)).unwrap().strict_remount);
    }
}
