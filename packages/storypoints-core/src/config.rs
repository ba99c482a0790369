/// User settings and pipeline timing.
///
/// Settings are stored one key per option through a `SettingsStore`. Missing
/// or unusable values fall back to defaults; loading never fails.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::codec;
use crate::storage::{SettingsStore, StorageError};
use crate::watcher::self_write::ECHO_TTL;

pub const SETTING_ESTIMATES_SEQUENCE: &str = "estimatesSequence";

/// Every persisted setting key.
pub const ALL_SETTINGS: &[&str] = &[SETTING_ESTIMATES_SEQUENCE];

pub const DEFAULT_ESTIMATES: &[&str] = &["?", "0", "0.5", "1", "2", "3", "5", "8", "13", "21"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Comma-separated picker values, e.g. `?,0,0.5,1`.
    #[serde(default = "default_estimates_sequence")]
    pub estimates_sequence: String,
}

fn default_estimates_sequence() -> String {
    DEFAULT_ESTIMATES.join(",")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            estimates_sequence: default_estimates_sequence(),
        }
    }
}

impl Settings {
    /// Ordered values offered by the estimate picker.
    ///
    /// Spaces are ignored and entries that are not a valid marker token are
    /// dropped. Falls back to the default sequence when nothing is left.
    pub fn estimate_values(&self) -> Vec<String> {
        let values: Vec<String> = self
            .estimates_sequence
            .replace(' ', "")
            .split(',')
            .filter(|v| !v.is_empty() && codec::is_valid_token(v))
            .map(str::to_string)
            .collect();
        if values.is_empty() {
            DEFAULT_ESTIMATES.iter().map(|v| v.to_string()).collect()
        } else {
            values
        }
    }

    pub fn restore_defaults(&mut self) {
        *self = Self::default();
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            SETTING_ESTIMATES_SEQUENCE => Some(self.estimates_sequence.as_str()),
            _ => None,
        }
    }

    /// Set a setting by its persisted key. Returns false for unknown keys.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        match key {
            SETTING_ESTIMATES_SEQUENCE => {
                self.estimates_sequence = value.to_string();
                true
            }
            _ => false,
        }
    }
}

/// Load every known setting, with defaults for missing or empty values.
pub fn load_settings(store: &dyn SettingsStore) -> Settings {
    let mut settings = Settings::default();
    for key in ALL_SETTINGS {
        match store.get(key) {
            Ok(Some(value)) if !value.trim().is_empty() => {
                settings.set(key, &value);
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!(
                    "[storypoints.config] Failed to read {} from {}: {}, using default",
                    key,
                    store.name(),
                    e
                );
            }
        }
    }
    log::info!(
        "[storypoints.config] Settings loaded from {}: {:?}",
        store.name(),
        settings
    );
    settings
}

/// Persist every known setting.
pub fn save_settings(store: &dyn SettingsStore, settings: &Settings) -> Result<(), StorageError> {
    for key in ALL_SETTINGS {
        if let Some(value) = settings.get(key) {
            store.set(key, value)?;
        }
    }
    log::info!("[storypoints.config] Settings saved to {}", store.name());
    Ok(())
}

/// Debounce delays of the recompute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Card refresh window (immediate, then suppress).
    pub card_delay: Duration,
    /// List header refresh window (immediate, then suppress).
    pub header_delay: Duration,
    /// List recompute window (immediate, then suppress).
    pub list_delay: Duration,
    /// Quiet period before a full rescan after a structural change.
    pub rescan_delay: Duration,
    /// Quiet period before the text direction pass.
    pub direction_delay: Duration,
    /// How long a written card title waits for its echo.
    pub fingerprint_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            card_delay: Duration::from_millis(250),
            header_delay: Duration::from_millis(250),
            list_delay: Duration::from_millis(500),
            rescan_delay: Duration::from_millis(500),
            direction_delay: Duration::from_millis(500),
            fingerprint_ttl: ECHO_TTL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_default_sequence() {
        let settings = Settings::default();
        assert_eq!(settings.estimates_sequence, "?,0,0.5,1,2,3,5,8,13,21");
        assert_eq!(settings.estimate_values().len(), 10);
    }

    #[test]
    fn test_estimate_values_cleans_input() {
        let settings = Settings {
            estimates_sequence: " 1, 2 ,,abc, ?, .5 ".to_string(),
        };
        assert_eq!(settings.estimate_values(), vec!["1", "2", "?", ".5"]);
    }

    #[test]
    fn test_estimate_values_falls_back_when_empty() {
        let settings = Settings {
            estimates_sequence: "x,y".to_string(),
        };
        assert_eq!(settings.estimate_values()[0], "?");
    }

    #[test]
    fn test_restore_defaults() {
        let mut settings = Settings {
            estimates_sequence: "1,2".to_string(),
        };
        settings.restore_defaults();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_missing_and_empty_use_defaults() {
        let store = MemoryStore::new();
        assert_eq!(load_settings(&store), Settings::default());

        store.set(SETTING_ESTIMATES_SEQUENCE, "  ").unwrap();
        assert_eq!(load_settings(&store), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        let mut settings = Settings::default();
        assert!(settings.set(SETTING_ESTIMATES_SEQUENCE, "1,2,3"));
        assert!(!settings.set("unknown", "x"));
        save_settings(&store, &settings).unwrap();
        assert_eq!(load_settings(&store).estimates_sequence, "1,2,3");
    }

    #[test]
    fn test_settings_json_is_camel_case() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains("estimatesSequence"));
        let parsed: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, Settings::default());
    }
}
