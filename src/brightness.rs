//! Device brightness primitive backed by `/sys/class/backlight`.

use anyhow::{Context, Result};
use nix::unistd::{AccessFlags, access};
use std::fs;
use std::path::{Path, PathBuf};

const BACKLIGHT_ROOT: &str = "/sys/class/backlight";

/// Brightness as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessReading {
    pub value: i32,
    pub automatic: bool,
}

/// Read and force the display brightness.
#[cfg_attr(test, mockall::automock)]
pub trait BrightnessControl: Send {
    /// Current brightness, or `None` when it cannot be read.
    fn read(&self) -> Option<BrightnessReading>;

    fn set(&mut self, value: i32, automatic: bool) -> Result<()>;

    /// Whether this process may change the brightness at all.
    fn can_write(&self) -> bool;
}

/// A sysfs backlight device such as `intel_backlight`.
///
/// sysfs has no automatic mode: readings always report `automatic = false`
/// and requests for automatic brightness only set the value.
pub struct SysfsBacklight {
    device_dir: PathBuf,
    max_brightness: i32,
}

impl SysfsBacklight {
    /// Open `name`, or the first device found when `name` is `None`.
    pub fn open(name: Option<&str>) -> Result<Self> {
        Self::open_in(Path::new(BACKLIGHT_ROOT), name)
    }

    pub fn open_in(root: &Path, name: Option<&str>) -> Result<Self> {
        let device_dir = match name {
            Some(name) => root.join(name),
            None => first_device(root)?,
        };

        let max_brightness = read_value(&device_dir.join("max_brightness"))
            .with_context(|| format!("Failed to read max brightness of {}", device_dir.display()))?;

        Ok(Self {
            device_dir,
            max_brightness,
        })
    }

    pub fn name(&self) -> String {
        self.device_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn brightness_path(&self) -> PathBuf {
        self.device_dir.join("brightness")
    }
}

impl BrightnessControl for SysfsBacklight {
    fn read(&self) -> Option<BrightnessReading> {
        read_value(&self.brightness_path())
            .ok()
            .map(|value| BrightnessReading {
                value,
                automatic: false,
            })
    }

    fn set(&mut self, value: i32, _automatic: bool) -> Result<()> {
        // Zero turns some panels off completely
        let value = value.clamp(1, self.max_brightness.max(1));
        let path = self.brightness_path();
        fs::write(&path, value.to_string())
            .with_context(|| format!("Failed to write brightness to {}", path.display()))
    }

    fn can_write(&self) -> bool {
        access(&self.brightness_path(), AccessFlags::W_OK).is_ok()
    }
}

/// Used when no backlight device exists.
pub struct NoBacklight;

impl BrightnessControl for NoBacklight {
    fn read(&self) -> Option<BrightnessReading> {
        None
    }

    fn set(&mut self, _value: i32, _automatic: bool) -> Result<()> {
        Ok(())
    }

    fn can_write(&self) -> bool {
        false
    }
}

fn first_device(root: &Path) -> Result<PathBuf> {
    let mut devices: Vec<PathBuf> = fs::read_dir(root)
        .with_context(|| format!("Failed to list {}", root.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    devices.sort();
    devices
        .into_iter()
        .next()
        .with_context(|| format!("No backlight device under {}", root.display()))
}

fn read_value(path: &Path) -> Result<i32> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .trim()
        .parse()
        .with_context(|| format!("Invalid value in {}", path.display()))
}
