//! Overlay sink that drives hyprsunset over its IPC socket.
//!
//! hyprsunset has no notion of an overlay, so the tint is expressed as a colour
//! temperature blended towards neutral by the intensity, and the dim as gamma:
//!
//! - `temperature = 6500 - (6500 - color) * intensity / 100`
//! - `gamma = 100 - dim * (100 - 20) / 100`
//!
//! Socket path: `{XDG_RUNTIME_DIR}/hypr/{HYPRLAND_INSTANCE_SIGNATURE}/.hyprsunset.sock`.

use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use super::{Frame, Layout, OverlaySink};
use crate::constants::*;

pub struct HyprsunsetSink {
    socket_path: PathBuf,
    debug_enabled: bool,
    // Last (temperature, gamma) pair sent, to skip redundant writes during fades
    last_sent: Option<(u32, u32)>,
}

impl HyprsunsetSink {
    pub fn new(debug_enabled: bool) -> Self {
        Self::with_socket(default_socket_path(), debug_enabled)
    }

    pub fn with_socket(socket_path: PathBuf, debug_enabled: bool) -> Self {
        if !socket_path.exists() && debug_enabled {
            log_warning!("hyprsunset socket doesn't exist at {}", socket_path.display());
        }
        Self {
            socket_path,
            debug_enabled,
            last_sent: None,
        }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Send several commands over one connection so they apply together.
    fn send_batched(&mut self, commands: &[&str]) -> Result<()> {
        let mut stream = UnixStream::connect(&self.socket_path).with_context(|| {
            format!("Failed to connect to hyprsunset at {}", self.socket_path.display())
        })?;

        stream
            .set_read_timeout(Some(Duration::from_millis(SOCKET_TIMEOUT_MS)))
            .ok();

        for command in commands {
            if self.debug_enabled {
                log_indented!("Sending: {command}");
            }

            stream
                .write_all(command.as_bytes())
                .context("Failed to write command to hyprsunset")?;

            let mut buffer = [0; SOCKET_BUFFER_SIZE];
            if let Ok(bytes_read) = stream.read(&mut buffer)
                && bytes_read > 0
            {
                let response = String::from_utf8_lossy(&buffer[..bytes_read]);
                if response.contains("Invalid") || response.contains("error") {
                    anyhow::bail!("hyprsunset rejected '{command}': {}", response.trim());
                }
            }
        }

        Ok(())
    }
}

impl OverlaySink for HyprsunsetSink {
    fn name(&self) -> &'static str {
        "hyprsunset"
    }

    fn render(&mut self, frame: Frame, _layout: &Layout) -> Result<()> {
        // hyprsunset applies to every output, so the layout has nothing to change
        let values = (blended_temperature(frame), dim_gamma(frame.dim));
        if self.last_sent == Some(values) {
            return Ok(());
        }

        let (temperature, gamma) = values;
        self.send_batched(&[
            &format!("temperature {temperature}"),
            &format!("gamma {gamma}"),
        ])?;
        self.last_sent = Some(values);
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        self.last_sent = None;
        self.send_batched(&["identity", "gamma 100"])
    }

    fn is_available(&mut self) -> bool {
        self.socket_path.exists() && UnixStream::connect(&self.socket_path).is_ok()
    }
}

/// Colour temperature shown for `frame`.
pub fn blended_temperature(frame: Frame) -> u32 {
    let color = frame.color.clamp(MINIMUM_COLOR, NEUTRAL_COLOR);
    let intensity = frame.intensity.min(MAXIMUM_LEVEL);
    NEUTRAL_COLOR - (NEUTRAL_COLOR - color) * intensity / MAXIMUM_LEVEL
}

/// Gamma percentage for a dim level.
pub fn dim_gamma(dim: u32) -> u32 {
    let dim = dim.min(MAXIMUM_LEVEL);
    MAXIMUM_LEVEL - dim * (MAXIMUM_LEVEL - MINIMUM_SINK_GAMMA) / MAXIMUM_LEVEL
}

fn default_socket_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", nix::unistd::getuid()));
    let hypr_dir = PathBuf::from(runtime_dir).join("hypr");

    match std::env::var("HYPRLAND_INSTANCE_SIGNATURE") {
        Ok(signature) => hypr_dir.join(signature).join(".hyprsunset.sock"),
        Err(_) => hypr_dir.join(".hyprsunset.sock"),
    }
}
