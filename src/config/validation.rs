//! Configuration validation.
//!
//! Rejects values the overlay or the monitor cannot honour, with messages that
//! name the field and its allowed range.

use anyhow::Result;

use super::Config;
use crate::constants::*;

/// Validate every field that is present.
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(color) = config.color {
        validate_color(color, "color")?;
    }
    if let Some(intensity) = config.intensity {
        validate_level(intensity, "intensity")?;
    }
    if let Some(dim) = config.dim {
        validate_level(dim, "dim")?;
    }

    if let Some(fade) = config.fade_duration_ms
        && fade > MAXIMUM_FADE_DURATION_MS
    {
        anyhow::bail!(
            "fade_duration_ms ({} ms) must be at most {} milliseconds",
            fade,
            MAXIMUM_FADE_DURATION_MS
        );
    }

    if let Some(interval) = config.monitor_interval_ms
        && !(MINIMUM_MONITOR_INTERVAL_MS..=MAXIMUM_MONITOR_INTERVAL_MS).contains(&interval)
    {
        anyhow::bail!(
            "monitor_interval_ms ({} ms) must be between {} and {} milliseconds",
            interval,
            MINIMUM_MONITOR_INTERVAL_MS,
            MAXIMUM_MONITOR_INTERVAL_MS
        );
    }

    if let Some(ref device) = config.backlight
        && (device.is_empty() || device.contains('/'))
    {
        anyhow::bail!("backlight must be a device name such as \"intel_backlight\" or \"auto\"");
    }

    if let Some(apps) = config.excluded_apps.as_ref()
        && apps.iter().any(|app| app.trim().is_empty())
    {
        anyhow::bail!("excluded_apps must not contain empty entries");
    }

    let mut seen = std::collections::HashSet::new();
    for profile in &config.profiles {
        if profile.name.trim().is_empty() {
            anyhow::bail!("Profile names must not be empty");
        }
        if profile.name == CUSTOM_PROFILE_NAME {
            anyhow::bail!("Profile name '{CUSTOM_PROFILE_NAME}' is reserved");
        }
        if !seen.insert(profile.name.as_str()) {
            anyhow::bail!("Duplicate profile name '{}'", profile.name);
        }
        validate_color(profile.color, &format!("profile '{}' color", profile.name))?;
        validate_level(
            profile.intensity,
            &format!("profile '{}' intensity", profile.name),
        )?;
        validate_level(profile.dim, &format!("profile '{}' dim", profile.name))?;
    }

    Ok(())
}

/// Colour temperature in Kelvin.
pub fn validate_color(color: u32, field: &str) -> Result<()> {
    if !(MINIMUM_COLOR..=MAXIMUM_COLOR).contains(&color) {
        anyhow::bail!(
            "{} ({}) must be between {} and {} Kelvin",
            field,
            color,
            MINIMUM_COLOR,
            MAXIMUM_COLOR
        );
    }
    Ok(())
}

/// Percentage level for intensity and dim.
pub fn validate_level(level: u32, field: &str) -> Result<()> {
    if !(MINIMUM_LEVEL..=MAXIMUM_LEVEL).contains(&level) {
        anyhow::bail!(
            "{} ({}%) must be between {}% and {}%",
            field,
            level,
            MINIMUM_LEVEL,
            MAXIMUM_LEVEL
        );
    }
    Ok(())
}
