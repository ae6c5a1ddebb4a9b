// global player settings; loaded on startup, saved whenever an offset is nudged
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const FRETFALL_DIR: &str = ".fretfall";
const SETTINGS_FILE: &str = "settings.json";

pub const DEFAULT_GLOBAL_OFFSET_MS: f64 = -360.0;
pub const DEFAULT_LOOKAHEAD_SEC: f64 = 2.0;
pub const MIN_LOOKAHEAD_SEC: f64 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub frets: [char; 5],
    pub strum: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            frets: ['z', 'x', 'c', 'v', 'b'],
            strum: ' ',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub global_offset_ms: f64,
    pub lookahead_sec: f64,
    pub keys: KeyBindings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_offset_ms: DEFAULT_GLOBAL_OFFSET_MS,
            lookahead_sec: DEFAULT_LOOKAHEAD_SEC,
            keys: KeyBindings::default(),
        }
    }
}

impl Settings {
    pub fn lookahead(&self) -> f64 {
        self.lookahead_sec.max(MIN_LOOKAHEAD_SEC)
    }
}

// $HOME/.fretfall/settings.json, falling back to the working directory
pub fn default_settings_path() -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(FRETFALL_DIR).join(SETTINGS_FILE)
}

// missing or unreadable settings are not fatal, the defaults are playable
pub fn load_settings(path: &Path) -> Settings {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            log::debug!("no settings at {} ({e}), using defaults", path.display());
            return Settings::default();
        }
    };
    serde_json::from_str(&data).unwrap_or_else(|e| {
        log::warn!("ignoring malformed settings {}: {e}", path.display());
        Settings::default()
    })
}

// Save settings to disk, making the directory if it doesn't exist already
pub fn save_settings(path: &Path, settings: &Settings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("nope.json"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.global_offset_ms, -360.0);
    }

    #[test]
    fn test_round_trip_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".fretfall").join("settings.json");
        let settings = Settings { global_offset_ms: -120.0, ..Settings::default() };
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "lookahead_sec": 0.1 }"#).unwrap();
        let settings = load_settings(&path);
        assert_eq!(settings.global_offset_ms, DEFAULT_GLOBAL_OFFSET_MS);
        assert_eq!(settings.lookahead(), MIN_LOOKAHEAD_SEC);
        assert_eq!(settings.keys.frets[0], 'z');
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings(&path), Settings::default());
    }
}
