//! Settings Store — a single validated record persisted under one key.
//!
//! Grounded on `nayru-app/src/state.rs`'s `ReaderConfig{kokoro_url, voice,
//! speed}` shape (`Default` impl, no validation, owned in-memory by the
//! Tauri shell). That shell is out of scope here, so this store owns real
//! persistence: one JSON file under a per-user config directory located via
//! `dirs::config_dir()`, loaded through [`reader_core::types::Settings::from_persisted`]
//! so one obsolete or corrupt field never discards the rest of the record.

use std::path::PathBuf;

use reader_core::types::Settings;
use tracing::warn;

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Resolves the default path: `{dirs::config_dir()}/reader/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("reader").join("settings.json"))
    }

    /// Loads and validates the persisted record, falling back per-field to
    /// [`Settings::default`] if a field is missing or obsolete, and to the
    /// full default if the file is absent or not valid JSON at all.
    pub fn load(&self) -> Settings {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Settings::from_persisted(&text),
            Err(_) => Settings::default(),
        }
    }

    /// Writes the full record as one blob. Fails silently.
    pub fn save(&self, settings: &Settings) {
        if let Some(parent) = self.path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                warn!("settings store: could not create {parent:?}, write skipped");
                return;
            }
        }
        match serde_json::to_string_pretty(settings) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!("settings store: write failed: {e}");
                }
            }
            Err(e) => warn!("settings store: serialize failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let path = std::env::temp_dir().join(format!("reader-settings-test-missing-{}.json", std::process::id()));
        let store = SettingsStore::new(path);
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn save_then_load_roundtrips_validated() {
        let path = std::env::temp_dir().join(format!("reader-settings-test-{}.json", std::process::id()));
        let store = SettingsStore::new(path.clone());
        let settings = Settings { rate: 2.0, ..Settings::default() };
        store.save(&settings);
        assert_eq!(store.load(), settings);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("reader-settings-test-corrupt-{}.json", std::process::id()));
        std::fs::write(&path, "not json").unwrap();
        let store = SettingsStore::new(path.clone());
        assert_eq!(store.load(), Settings::default());
        let _ = std::fs::remove_file(&path);
    }
}
