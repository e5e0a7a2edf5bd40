//! Durable runtime settings read and written by the screen filter.
//!
//! The filter parameters (colour, intensity, dim and the two feature flags) are
//! seeded from `shadefilter.toml` at every start; `set` and `next-profile`
//! override them until the next start or config edit. The runtime fields
//! (`filter_is_on`, the saved brightness pair and the active profile) survive
//! restarts through `$XDG_STATE_HOME/shadefilter/state.json`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::constants::*;

/// Snapshot of every value the filter reads from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub color: u32,
    pub intensity: u32,
    pub dim: u32,
    pub lower_brightness: bool,
    pub secure_suspend: bool,
    pub filter_is_on: bool,
    pub saved_brightness: i32,
    pub saved_auto_brightness: bool,
    pub profile_index: usize,
    pub profile_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR,
            intensity: DEFAULT_INTENSITY,
            dim: DEFAULT_DIM,
            lower_brightness: DEFAULT_LOWER_BRIGHTNESS,
            secure_suspend: DEFAULT_SECURE_SUSPEND,
            filter_is_on: false,
            saved_brightness: NO_SAVED_BRIGHTNESS,
            saved_auto_brightness: false,
            profile_index: 0,
            profile_name: CUSTOM_PROFILE_NAME.to_string(),
        }
    }
}

impl Settings {
    /// Filter parameters from the configuration, runtime fields at their defaults.
    pub fn from_config(config: &Config) -> Self {
        Self {
            color: config.color(),
            intensity: config.intensity(),
            dim: config.dim(),
            lower_brightness: config.lower_brightness(),
            secure_suspend: config.secure_suspend(),
            ..Self::default()
        }
    }

    /// Take the runtime fields from a previous run.
    ///
    /// A profile is only restored while it still exists in `config`, and its
    /// values win over the top-level filter parameters.
    pub fn restore_runtime(&mut self, previous: &Settings, config: &Config) {
        self.filter_is_on = previous.filter_is_on;
        self.saved_brightness = previous.saved_brightness;
        self.saved_auto_brightness = previous.saved_auto_brightness;

        if let Some(profile) = config.profiles.get(previous.profile_index)
            && profile.name == previous.profile_name
        {
            self.profile_index = previous.profile_index;
            self.profile_name = profile.name.clone();
            self.color = profile.color;
            self.intensity = profile.intensity;
            self.dim = profile.dim;
        }
    }
}

/// Key/value settings shared between the filter and the daemon.
///
/// Reads are served from memory; writes may fail when persisting.
pub trait SettingsStore: Send {
    fn settings(&self) -> &Settings;

    /// Apply `edit` and persist the result.
    fn update(&mut self, edit: &mut dyn FnMut(&mut Settings)) -> Result<()>;
}

/// Store persisted as JSON in the XDG state directory.
pub struct FileStore {
    path: PathBuf,
    settings: Settings,
}

impl FileStore {
    /// Open the store at `path`, seeding it from `config`.
    ///
    /// An unreadable state file is logged and replaced.
    pub fn open(path: PathBuf, config: &Config) -> Result<Self> {
        let mut settings = Settings::from_config(config);

        if path.exists() {
            match read_settings(&path) {
                Ok(previous) => settings.restore_runtime(&previous, config),
                Err(e) => {
                    log_warning!("Ignoring unreadable state file: {e}");
                }
            }
        }

        let store = Self { path, settings };
        store.persist()?;
        Ok(store)
    }

    /// `$XDG_STATE_HOME/shadefilter/state.json`.
    pub fn default_path() -> Result<PathBuf> {
        let state_dir = dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
            .context("Could not determine state directory")?;
        Ok(state_dir.join("shadefilter").join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.settings)
            .context("Failed to serialize runtime state")?;

        // Write then rename so a crash never leaves a truncated file behind
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json + "\n")
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl SettingsStore for FileStore {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn update(&mut self, edit: &mut dyn FnMut(&mut Settings)) -> Result<()> {
        edit(&mut self.settings);
        self.persist()
    }
}

fn read_settings(path: &Path) -> Result<Settings> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Store that lives only in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    settings: Settings,
}

impl MemoryStore {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl SettingsStore for MemoryStore {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn update(&mut self, edit: &mut dyn FnMut(&mut Settings)) -> Result<()> {
        edit(&mut self.settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;
    use tempfile::tempdir;

    fn night() -> Profile {
        Profile {
            name: "Night".to_string(),
            color: 2000,
            intensity: 90,
            dim: 60,
        }
    }

    #[test]
    fn test_open_seeds_from_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shadefilter").join(STATE_FILE_NAME);
        let config = Config {
            color: Some(2500),
            lower_brightness: Some(true),
            ..Default::default()
        };

        let store = FileStore::open(path.clone(), &config).unwrap();
        assert_eq!(store.settings().color, 2500);
        assert!(store.settings().lower_brightness);
        assert_eq!(store.settings().saved_brightness, NO_SAVED_BRIGHTNESS);
        assert!(path.exists());
    }

    #[test]
    fn test_runtime_fields_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STATE_FILE_NAME);
        let config = Config {
            profiles: vec![night()],
            ..Default::default()
        };

        let mut store = FileStore::open(path.clone(), &config).unwrap();
        store
            .update(&mut |s| {
                s.filter_is_on = true;
                s.saved_brightness = 120;
                s.saved_auto_brightness = true;
                s.profile_index = 0;
                s.profile_name = "Night".to_string();
                s.color = 1234;
            })
            .unwrap();
        drop(store);

        let store = FileStore::open(path, &config).unwrap();
        let settings = store.settings();
        assert!(settings.filter_is_on);
        assert_eq!(settings.saved_brightness, 120);
        assert!(settings.saved_auto_brightness);
        assert_eq!(settings.profile_name, "Night");
        // Profile values are re-applied, the one-off override is not
        assert_eq!(settings.color, 2000);
    }

    #[test]
    fn test_removed_profile_is_not_restored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STATE_FILE_NAME);
        let with_profile = Config {
            profiles: vec![night()],
            ..Default::default()
        };

        let mut store = FileStore::open(path.clone(), &with_profile).unwrap();
        store.update(&mut |s| s.profile_name = "Night".to_string()).unwrap();
        drop(store);

        let store = FileStore::open(path, &Config::default()).unwrap();
        assert_eq!(store.settings().profile_name, CUSTOM_PROFILE_NAME);
        assert_eq!(store.settings().color, DEFAULT_COLOR);
    }

    #[test]
    fn test_corrupt_state_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STATE_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let store = FileStore::open(path.clone(), &Config::default()).unwrap();
        assert!(!store.settings().filter_is_on);
        assert!(read_settings(&path).is_ok());
    }
}
