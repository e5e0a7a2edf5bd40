//! Environment monitor.
//!
//! Watches the screen on/off state and, while the screen is on, samples the
//! foreground application. Everything it learns goes back to the daemon loop as
//! [`SignalMessage`]s; the monitor never touches filter state itself.
//!
//! ```text
//! Stopped --start (screen on)--> Running --screen off / stop--> Stopped
//!                                   ^                              |
//!                                   +---------screen on------------+  (while started)
//! ```

pub mod foreground;
pub mod screen;

use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::config::Config;
use crate::signals::SignalMessage;

pub use foreground::{ForegroundSampler, ForegroundSource, HyprlandForeground};
pub use screen::{ScreenSaverWatcher, ScreenWatcher};

/// Monitor lifecycle as driven by the screen filter.
#[cfg_attr(test, mockall::automock)]
pub trait Monitor: Send {
    fn start(&mut self);
    fn stop(&mut self);
    fn screen_turned_on(&mut self);
    fn screen_turned_off(&mut self);
    /// True while foreground sampling is running.
    fn is_running(&self) -> bool;
    fn update_settings(&mut self, settings: MonitorSettings);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub excluded_apps: Vec<String>,
    pub interval: Duration,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            excluded_apps: config.excluded_apps().to_vec(),
            interval: Duration::from_millis(config.monitor_interval_ms()),
        }
    }
}

pub struct EnvironmentMonitor {
    screen: Box<dyn ScreenWatcher>,
    foreground: Arc<dyn ForegroundSource>,
    settings: MonitorSettings,
    signal_sender: Sender<SignalMessage>,
    sampler: Option<ForegroundSampler>,
    // Started by the filter, independent of the screen state
    active: bool,
    screen_on: bool,
    debug_enabled: bool,
}

impl EnvironmentMonitor {
    pub fn new(
        screen: Box<dyn ScreenWatcher>,
        foreground: Arc<dyn ForegroundSource>,
        settings: MonitorSettings,
        signal_sender: Sender<SignalMessage>,
        debug_enabled: bool,
    ) -> Self {
        Self {
            screen,
            foreground,
            settings,
            signal_sender,
            sampler: None,
            active: false,
            screen_on: true,
            debug_enabled,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn start_sampler(&mut self) {
        if self.sampler.is_some() {
            return;
        }
        match ForegroundSampler::spawn(
            Arc::clone(&self.foreground),
            self.settings.excluded_apps.clone(),
            self.settings.interval,
            self.signal_sender.clone(),
            self.debug_enabled,
        ) {
            Ok(sampler) => {
                if self.debug_enabled {
                    log_debug!("Foreground sampler started");
                }
                self.sampler = Some(sampler);
            }
            Err(e) => log_warning!("{e:#}"),
        }
    }

    fn stop_sampler(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.stop();
            if self.debug_enabled {
                log_debug!("Foreground sampler stopped");
            }
        }
    }
}

impl Monitor for EnvironmentMonitor {
    fn start(&mut self) {
        if self.active {
            return;
        }
        self.active = true;

        if let Err(e) = self.screen.register() {
            log_warning!("Screen watcher unavailable: {e:#}");
        }
        self.screen_on = self.screen.is_screen_on();

        if self.screen_on {
            self.start_sampler();
        }
    }

    fn stop(&mut self) {
        self.active = false;
        self.stop_sampler();

        // Stopping twice unregisters twice
        if let Err(e) = self.screen.unregister()
            && self.debug_enabled
        {
            log_debug!("Ignoring screen watcher unregister: {e}");
        }
    }

    fn screen_turned_on(&mut self) {
        self.screen_on = true;
        if self.active {
            self.start_sampler();
        }
    }

    fn screen_turned_off(&mut self) {
        self.screen_on = false;
        self.stop_sampler();
    }

    fn is_running(&self) -> bool {
        self.sampler.is_some()
    }

    fn update_settings(&mut self, settings: MonitorSettings) {
        if settings == self.settings {
            return;
        }
        self.settings = settings;

        // A running sampler keeps its own copy, so restart it
        if self.sampler.is_some() {
            self.stop_sampler();
            self.start_sampler();
        }
    }
}
