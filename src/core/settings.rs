use crate::shared::paths::{ensure_dir, get_settings_path};
use global_hotkey::hotkey::HotKey;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_QUICK_ADD_SHORTCUT: &str = "ctrl+shift+a";
pub const DEFAULT_SHOW_WINDOW_SHORTCUT: &str = "ctrl+shift+t";
pub const DEFAULT_DATA_FILE: &str = "todos.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub quick_add_shortcut: String,
    pub show_window_shortcut: String,
    pub sound_enabled: bool,
    /// Data file name, relative to the storage dir unless absolute.
    pub data_file: String,
    pub summary: SummarySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            quick_add_shortcut: DEFAULT_QUICK_ADD_SHORTCUT.to_string(),
            show_window_shortcut: DEFAULT_SHOW_WINDOW_SHORTCUT.to_string(),
            sound_enabled: true,
            data_file: DEFAULT_DATA_FILE.to_string(),
            summary: SummarySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummarySettings {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            base_url: "https://ark.cn-beijing.volces.com/api/v3".to_string(),
            model: "doubao-seed-1-6-flash-250615".to_string(),
            api_key_env: "ARK_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings file I/O failed: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Failed to parse shortcut: {0}")]
    ShortcutParseError(String),
    #[error("Failed to register shortcut: {0}")]
    ShortcutRegisterError(String),
    #[error("Shortcut conflict: {0}")]
    ShortcutConflict(String),
    #[error("Global shortcuts are not available on {0} without a GUI event loop")]
    ShortcutUnsupported(String),
}

/// Load settings from disk, returning defaults if the file doesn't exist or is invalid.
pub fn load_settings() -> AppSettings {
    load_settings_from(&get_settings_path())
}

pub fn load_settings_from(path: &Path) -> AppSettings {
    if !path.exists() {
        tracing::info!(target: "system", "Settings file not found, using defaults");
        return AppSettings::default();
    }

    match load_settings_from_file(path) {
        Ok(settings) => {
            tracing::info!(target: "system", "Settings loaded from {:?}", path);
            settings
        }
        Err(e) => {
            tracing::warn!(target: "system", "Failed to load settings: {}, using defaults", e);
            AppSettings::default()
        }
    }
}

fn load_settings_from_file(path: &Path) -> Result<AppSettings, SettingsError> {
    let contents = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str(&contents)?;
    Ok(settings)
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let contents = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, contents)?;

    tracing::info!(target: "system", "Settings saved to {:?}", path);
    Ok(())
}

/// Parse a shortcut string (e.g. "ctrl+shift+a", "F9") into a HotKey.
pub fn parse_shortcut(shortcut_str: &str) -> Result<HotKey, SettingsError> {
    shortcut_str
        .parse()
        .map_err(|e: global_hotkey::hotkey::HotKeyParseError| {
            SettingsError::ShortcutParseError(format!("'{}': {}", shortcut_str, e))
        })
}

fn normalize_shortcut(shortcut: &str) -> String {
    shortcut.to_lowercase().replace(' ', "")
}

/// Checks both shortcuts parse and are not bound to the same keys.
pub fn validate_shortcuts(settings: &AppSettings) -> Result<(HotKey, HotKey), SettingsError> {
    let quick_add = parse_shortcut(&settings.quick_add_shortcut)?;
    let show_window = parse_shortcut(&settings.show_window_shortcut)?;

    let same_text = normalize_shortcut(&settings.quick_add_shortcut)
        == normalize_shortcut(&settings.show_window_shortcut);

    if same_text || quick_add.id() == show_window.id() {
        return Err(SettingsError::ShortcutConflict(
            "Quick add and show window cannot use the same shortcut".to_string(),
        ));
    }

    Ok((quick_add, show_window))
}
