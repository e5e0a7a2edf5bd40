//! Hot reload of `shadefilter.toml`.
//!
//! The watcher observes the configuration directory rather than the file itself
//! because editors usually replace files on save, which drops a file watch.
//! Matching events are debounced and forwarded as [`SignalMessage::Reload`].

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use crate::constants::CONFIG_FILE_NAME;
use crate::signals::SignalMessage;

/// Editors often write a file in several steps; collapse those into one reload.
const DEBOUNCE_MS: u64 = 500;

pub struct ConfigWatcher {
    signal_sender: Sender<SignalMessage>,
    config_path: PathBuf,
    debug_enabled: bool,
}

impl ConfigWatcher {
    pub fn new(signal_sender: Sender<SignalMessage>, config_path: PathBuf, debug_enabled: bool) -> Self {
        Self {
            signal_sender,
            config_path,
            debug_enabled,
        }
    }

    /// Spawn the watcher thread. Returns immediately.
    pub fn start(self) -> Result<()> {
        let Some(config_dir) = self.config_path.parent().map(Path::to_path_buf) else {
            anyhow::bail!(
                "Configuration path {} has no parent directory",
                self.config_path.display()
            );
        };

        let (tx, rx) = std::sync::mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res
                    && matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    )
                {
                    let _ = tx.send(event);
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&config_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", config_dir.display()))?;

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Watching {} for changes", self.config_path.display());
        }

        let signal_sender = self.signal_sender;
        let debug_enabled = self.debug_enabled;

        thread::spawn(move || {
            // The watcher stops delivering events once dropped
            let _watcher = watcher;

            while let Ok(event) = rx.recv() {
                if !event.paths.iter().any(|path| is_config_file(path)) {
                    continue;
                }

                // Let the editor finish writing, then drop the events it produced meanwhile
                thread::sleep(Duration::from_millis(DEBOUNCE_MS));
                let _ = rx.try_iter().count();

                if debug_enabled {
                    log_pipe!();
                    log_info!("Configuration file change detected");
                }

                if signal_sender.send(SignalMessage::Reload).is_err() {
                    break;
                }
            }
        });

        Ok(())
    }
}

/// True for the config file and the temporary files editors save next to it.
fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(CONFIG_FILE_NAME))
}

/// Start watching the configuration file at `config_path`.
pub fn start_config_watcher(
    signal_sender: Sender<SignalMessage>,
    config_path: PathBuf,
    debug_enabled: bool,
) -> Result<()> {
    ConfigWatcher::new(signal_sender, config_path, debug_enabled).start()
}
