//! Configuration system for shadefilter.
//!
//! The configuration lives in `shadefilter.toml` under
//! `$XDG_CONFIG_HOME/shadefilter/` (or the directory passed with `--config`).
//! It provides the initial filter parameters and the daemon's tunables:
//!
//! ```toml
//! #[Overlay]
//! sink = "hyprsunset"        # Overlay sink: "hyprsunset" or "log"
//! color = 3400               # Tint colour temperature (1000-6500) Kelvin
//! intensity = 50             # Tint strength (0-100)%
//! dim = 30                   # Dimming (0-100)%
//! fade_duration_ms = 1000    # Fade in/out duration (0-10000)ms
//!
//! #[Brightness]
//! lower_brightness = false   # Force the backlight down while the filter is on
//! backlight = "auto"         # Backlight device under /sys/class/backlight
//!
//! #[Secure suspend]
//! secure_suspend = false     # Hide the filter while an excluded app is focused
//! monitor_interval_ms = 1000 # Foreground app sampling interval (100-60000)ms
//! excluded_apps = ["org.keepassxc.KeePassXC"]
//!
//! [[profiles]]
//! name = "Night"
//! color = 2700
//! intensity = 70
//! dim = 40
//! ```
//!
//! The daemon seeds its runtime store from these values on first start and
//! applies later edits through the hot-reload watcher: every changed field
//! becomes the matching reactive event.

pub mod builder;
pub mod loading;
pub mod validation;
pub mod watcher;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::*;
use crate::filter::ReactiveEvent;

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};
pub use watcher::start_config_watcher;

/// Where the overlay is rendered.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Tint and dim expressed as colour temperature and gamma through hyprsunset.
    Hyprsunset,
    /// Frames are only logged. Used for dry runs and environments without a compositor sink.
    Log,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Hyprsunset => "hyprsunset",
            SinkKind::Log => "log",
        }
    }
}

/// A named colour/intensity/dim triple selectable with `next-profile`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub color: u32,
    pub intensity: u32,
    pub dim: u32,
}

/// Settings loaded from `shadefilter.toml`.
///
/// Every field is optional; the accessor methods apply the defaults from
/// [`crate::constants`].
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Config {
    pub sink: Option<SinkKind>,
    pub color: Option<u32>,
    pub intensity: Option<u32>,
    pub dim: Option<u32>,
    pub fade_duration_ms: Option<u64>,
    pub lower_brightness: Option<bool>,
    /// Backlight device name; `None` or `"auto"` picks the first device found.
    pub backlight: Option<String>,
    pub secure_suspend: Option<bool>,
    pub monitor_interval_ms: Option<u64>,
    pub excluded_apps: Option<Vec<String>>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load()
    }

    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        load_from_path(path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        get_config_path()
    }

    pub fn sink(&self) -> SinkKind {
        self.sink.unwrap_or(SinkKind::Hyprsunset)
    }

    pub fn color(&self) -> u32 {
        self.color.unwrap_or(DEFAULT_COLOR)
    }

    pub fn intensity(&self) -> u32 {
        self.intensity.unwrap_or(DEFAULT_INTENSITY)
    }

    pub fn dim(&self) -> u32 {
        self.dim.unwrap_or(DEFAULT_DIM)
    }

    pub fn fade_duration_ms(&self) -> u64 {
        self.fade_duration_ms.unwrap_or(DEFAULT_FADE_DURATION_MS)
    }

    pub fn lower_brightness(&self) -> bool {
        self.lower_brightness.unwrap_or(DEFAULT_LOWER_BRIGHTNESS)
    }

    pub fn backlight_device(&self) -> Option<&str> {
        match self.backlight.as_deref() {
            None | Some("auto") => None,
            Some(name) => Some(name),
        }
    }

    pub fn secure_suspend(&self) -> bool {
        self.secure_suspend.unwrap_or(DEFAULT_SECURE_SUSPEND)
    }

    pub fn monitor_interval_ms(&self) -> u64 {
        self.monitor_interval_ms
            .unwrap_or(DEFAULT_MONITOR_INTERVAL_MS)
    }

    pub fn excluded_apps(&self) -> &[String] {
        self.excluded_apps.as_deref().unwrap_or(&[])
    }

    /// Reactive events implied by moving from `self` to `newer`.
    ///
    /// Only fields that live in the runtime store produce events; tunables such
    /// as the sampling interval are picked up by the daemon directly.
    pub fn changed_events(&self, newer: &Config) -> Vec<ReactiveEvent> {
        let mut events = Vec::new();
        if self.color() != newer.color() {
            events.push(ReactiveEvent::ColorChanged);
        }
        if self.intensity() != newer.intensity() {
            events.push(ReactiveEvent::IntensityChanged);
        }
        if self.dim() != newer.dim() {
            events.push(ReactiveEvent::DimChanged);
        }
        if self.lower_brightness() != newer.lower_brightness() {
            events.push(ReactiveEvent::LowerBrightnessChanged);
        }
        if self.secure_suspend() != newer.secure_suspend() {
            events.push(ReactiveEvent::SecureSuspendChanged);
        }
        if self.profiles != newer.profiles {
            events.push(ReactiveEvent::ProfileChanged);
        }
        events
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        log_indented!("Sink: {}", self.sink().as_str());
        log_indented!(
            "Tint: {}K @ {}% intensity, {}% dim",
            self.color(),
            self.intensity(),
            self.dim()
        );
        log_indented!("Fade duration: {}ms", self.fade_duration_ms());

        if self.lower_brightness() {
            log_indented!(
                "Lower brightness: on (backlight: {})",
                self.backlight_device().unwrap_or("auto")
            );
        }

        if self.secure_suspend() {
            log_indented!(
                "Secure suspend: on, {} excluded app(s), sampling every {}ms",
                self.excluded_apps().len(),
                self.monitor_interval_ms()
            );
        }

        if !self.profiles.is_empty() {
            let names: Vec<&str> = self.profiles.iter().map(|p| p.name.as_str()).collect();
            log_indented!("Profiles: {}", names.join(", "));
        }
    }
}

#[cfg(test)]
mod tests;
