//! Default configuration file generation.
//!
//! Writes a commented `shadefilter.toml` with aligned comments so users can see
//! every setting and its range at a glance.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::constants::*;

/// Create a default config file at `path`, creating parent directories.
pub fn create_default_config(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let content = ConfigBuilder::new()
        .add_section("Overlay")
        .add_setting(
            "sink",
            "\"hyprsunset\"",
            "Overlay sink: \"hyprsunset\" or \"log\"",
        )
        .add_setting(
            "color",
            &DEFAULT_COLOR.to_string(),
            &format!("Tint colour temperature ({MINIMUM_COLOR}-{MAXIMUM_COLOR}) Kelvin"),
        )
        .add_setting(
            "intensity",
            &DEFAULT_INTENSITY.to_string(),
            &format!("Tint strength ({MINIMUM_LEVEL}-{MAXIMUM_LEVEL})%"),
        )
        .add_setting(
            "dim",
            &DEFAULT_DIM.to_string(),
            &format!("Dimming ({MINIMUM_LEVEL}-{MAXIMUM_LEVEL})%"),
        )
        .add_setting(
            "fade_duration_ms",
            &DEFAULT_FADE_DURATION_MS.to_string(),
            &format!("Fade in/out duration (0-{MAXIMUM_FADE_DURATION_MS})ms"),
        )
        .add_section("Brightness")
        .add_setting(
            "lower_brightness",
            &DEFAULT_LOWER_BRIGHTNESS.to_string(),
            "Force the backlight down while the filter is on",
        )
        .add_setting(
            "backlight",
            "\"auto\"",
            "Backlight device under /sys/class/backlight, or \"auto\"",
        )
        .add_section("Secure suspend")
        .add_setting(
            "secure_suspend",
            &DEFAULT_SECURE_SUSPEND.to_string(),
            "Hide the filter while an excluded app is focused",
        )
        .add_setting(
            "monitor_interval_ms",
            &DEFAULT_MONITOR_INTERVAL_MS.to_string(),
            &format!(
                "Foreground app sampling interval ({MINIMUM_MONITOR_INTERVAL_MS}-{MAXIMUM_MONITOR_INTERVAL_MS})ms"
            ),
        )
        .add_setting(
            "excluded_apps",
            "[]",
            "Window classes that suspend the filter, e.g. [\"org.keepassxc.KeePassXC\"]",
        )
        .build();

    fs::write(path, content + "\n")
        .with_context(|| format!("Failed to write default config to {}", path.display()))?;

    Ok(())
}

struct ConfigBuilder {
    entries: Vec<Entry>,
}

enum Entry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(Entry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(Entry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        // Comments start one column after the longest setting line
        let width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Setting { line, .. } => Some(line.len()),
                Entry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut lines = Vec::new();
        for entry in self.entries {
            match entry {
                Entry::Section(title) => {
                    if !lines.is_empty() {
                        lines.push(String::new());
                    }
                    lines.push(title);
                }
                Entry::Setting { line, comment } => {
                    let padding = " ".repeat(width - line.len());
                    lines.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        lines.join("\n")
    }
}
