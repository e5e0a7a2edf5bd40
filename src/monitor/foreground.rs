//! Foreground application sampling.
//!
//! The sampler polls the focused window's class and reports `StartSuspend`
//! when it enters the exclusion list and `StopSuspend` when it leaves it. The
//! first sample always reports, so a restarted sampler resynchronises a
//! filter that was left suspended.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::constants::SOCKET_TIMEOUT_MS;
use crate::filter::Command;
use crate::signals::SignalMessage;

/// Reports the class of the focused window.
pub trait ForegroundSource: Send + Sync {
    /// `Ok(None)` when nothing is focused.
    fn active_app(&self) -> Result<Option<String>>;
}

/// Focused window from Hyprland's `j/activewindow` request.
pub struct HyprlandForeground {
    socket_path: PathBuf,
}

#[derive(Deserialize)]
struct ActiveWindow {
    #[serde(default)]
    class: Option<String>,
}

impl HyprlandForeground {
    pub fn new() -> Self {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .unwrap_or_else(|_| format!("/run/user/{}", nix::unistd::getuid()));
        let signature = std::env::var("HYPRLAND_INSTANCE_SIGNATURE").unwrap_or_default();
        Self::with_socket(
            PathBuf::from(runtime_dir)
                .join("hypr")
                .join(signature)
                .join(".socket.sock"),
        )
    }

    pub fn with_socket(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }
}

impl Default for HyprlandForeground {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundSource for HyprlandForeground {
    fn active_app(&self) -> Result<Option<String>> {
        let mut stream = UnixStream::connect(&self.socket_path).with_context(|| {
            format!("Failed to connect to Hyprland at {}", self.socket_path.display())
        })?;
        stream
            .set_read_timeout(Some(Duration::from_millis(SOCKET_TIMEOUT_MS)))
            .ok();

        stream
            .write_all(b"j/activewindow")
            .context("Failed to query the active window")?;

        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .context("Failed to read the active window")?;

        parse_active_window(&response)
    }
}

/// Class of the window in a `j/activewindow` reply.
pub fn parse_active_window(response: &str) -> Result<Option<String>> {
    let window: ActiveWindow =
        serde_json::from_str(response.trim()).context("Invalid active window reply")?;
    Ok(window.class.filter(|class| !class.is_empty()))
}

/// What the sampler last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reported {
    Nothing,
    Excluded,
    Allowed,
}

/// Edge detection over successive samples.
#[derive(Debug)]
pub struct ExclusionTracker {
    excluded_apps: Vec<String>,
    reported: Reported,
}

impl ExclusionTracker {
    pub fn new(excluded_apps: Vec<String>) -> Self {
        Self {
            excluded_apps,
            reported: Reported::Nothing,
        }
    }

    /// Command to send for this sample, if the exclusion state changed.
    pub fn observe(&mut self, app: Option<&str>) -> Option<Command> {
        let excluded = app.is_some_and(|app| {
            self.excluded_apps
                .iter()
                .any(|entry| entry.eq_ignore_ascii_case(app))
        });

        match (self.reported, excluded) {
            (Reported::Excluded, true) | (Reported::Allowed, false) => None,
            (_, true) => {
                self.reported = Reported::Excluded;
                Some(Command::StartSuspend)
            }
            (_, false) => {
                self.reported = Reported::Allowed;
                Some(Command::StopSuspend)
            }
        }
    }
}

/// Background thread sampling a [`ForegroundSource`].
pub struct ForegroundSampler {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ForegroundSampler {
    pub fn spawn(
        source: Arc<dyn ForegroundSource>,
        excluded_apps: Vec<String>,
        interval: Duration,
        signal_sender: Sender<SignalMessage>,
        debug_enabled: bool,
    ) -> Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancel);

        let handle = thread::Builder::new()
            .name("foreground-sampler".to_string())
            .spawn(move || {
                let mut tracker = ExclusionTracker::new(excluded_apps);
                let mut failing = false;

                while !cancel_flag.load(Ordering::SeqCst) {
                    match source.active_app() {
                        Ok(app) => {
                            failing = false;
                            if let Some(command) = tracker.observe(app.as_deref()) {
                                if debug_enabled {
                                    log_debug!(
                                        "Foreground app {}: {}",
                                        app.as_deref().unwrap_or("none"),
                                        command.as_str()
                                    );
                                }
                                if signal_sender.send(SignalMessage::Command(command)).is_err() {
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            // Report once per outage instead of every interval
                            if !failing {
                                log_warning!("Foreground sampling failed: {e}");
                                failing = true;
                            }
                        }
                    }

                    sleep_unless_cancelled(interval, &cancel_flag);
                }
            })
            .context("Failed to spawn foreground sampler")?;

        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    /// Ask the thread to stop and wait for it.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ForegroundSampler {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Sleep in short slices so cancellation is noticed promptly.
fn sleep_unless_cancelled(duration: Duration, cancel: &AtomicBool) {
    let slice = Duration::from_millis(50);
    let start = Instant::now();
    while !cancel.load(Ordering::SeqCst) {
        let elapsed = start.elapsed();
        if elapsed >= duration {
            return;
        }
        thread::sleep(slice.min(duration - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;

    #[test]
    fn test_parse_active_window() {
        let reply = r#"{"address": "0x1", "class": "org.keepassxc.KeePassXC", "title": "db"}"#;
        assert_eq!(
            parse_active_window(reply).unwrap().as_deref(),
            Some("org.keepassxc.KeePassXC")
        );
        assert_eq!(parse_active_window("{}").unwrap(), None);
        assert_eq!(parse_active_window(r#"{"class": ""}"#).unwrap(), None);
        assert!(parse_active_window("not json").is_err());
    }

    #[test]
    fn test_tracker_reports_edges_only() {
        let mut tracker = ExclusionTracker::new(vec!["KeePassXC".to_string()]);

        assert_eq!(tracker.observe(Some("firefox")), Some(Command::StopSuspend));
        assert_eq!(tracker.observe(Some("kitty")), None);
        assert_eq!(tracker.observe(Some("keepassxc")), Some(Command::StartSuspend));
        assert_eq!(tracker.observe(Some("KeePassXC")), None);
        assert_eq!(tracker.observe(None), Some(Command::StopSuspend));
    }

    #[test]
    fn test_first_excluded_sample_suspends() {
        let mut tracker = ExclusionTracker::new(vec!["vault".to_string()]);
        assert_eq!(tracker.observe(Some("vault")), Some(Command::StartSuspend));
    }

    struct Scripted(Mutex<Vec<&'static str>>);

    impl ForegroundSource for Scripted {
        fn active_app(&self) -> Result<Option<String>> {
            let mut apps = self.0.lock().unwrap();
            let app = if apps.len() > 1 { apps.remove(0) } else { apps[0] };
            Ok(Some(app.to_string()))
        }
    }

    #[test]
    fn test_sampler_sends_commands_and_stops() {
        let source = Arc::new(Scripted(Mutex::new(vec!["editor", "vault", "vault"])));
        let (tx, rx) = mpsc::channel();

        let sampler = ForegroundSampler::spawn(
            source,
            vec!["vault".to_string()],
            Duration::from_millis(5),
            tx,
            false,
        )
        .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        sampler.stop();

        assert!(matches!(first, SignalMessage::Command(Command::StopSuspend)));
        assert!(matches!(second, SignalMessage::Command(Command::StartSuspend)));
        assert!(rx.try_recv().is_err());
    }
}
