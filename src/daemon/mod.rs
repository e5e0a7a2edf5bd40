//! Daemon lifecycle and the main message loop.
//!
//! [`Daemon`] wires the collaborators together and owns the process-level
//! resources (lock, signal thread, config watcher, IPC server). [`Controller`]
//! is the loop body: it turns every [`SignalMessage`] into calls on the
//! [`ScreenFilter`], and owns everything the filter itself does not know about
//! (profiles, `set`, config reloads, IPC replies).
//!
//! ```text
//! Daemon::new(debug_enabled)
//!     .dry_run(dry_run)
//!     .restore(restore)
//!     .run()?;
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::brightness::{BrightnessControl, NoBacklight, SysfsBacklight};
use crate::config::validation::{validate_color, validate_level};
use crate::config::{self, Config, SinkKind};
use crate::constants::*;
use crate::filter::{Collaborators, ReactiveEvent, ScreenFilter};
use crate::ipc::{IpcEvent, IpcNotifier, IpcRequest, IpcServer};
use crate::lock::{InstanceLock, LockAttempt};
use crate::monitor::{
    EnvironmentMonitor, HyprlandForeground, MonitorSettings, ScreenSaverWatcher,
};
use crate::overlay::{HyprsunsetSink, LogSink, Overlay, OverlaySink};
use crate::publish::{DesktopNotifier, LogPublisher, NotificationPublisher};
use crate::signals::{SignalMessage, setup_signal_handler};
use crate::store::{FileStore, MemoryStore, Settings, SettingsStore};

/// Builder for starting the daemon.
pub struct Daemon {
    debug_enabled: bool,
    dry_run: bool,
    restore: bool,
}

impl Daemon {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            dry_run: false,
            restore: false,
        }
    }

    /// Log overlay frames instead of drawing them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Turn the filter back on when it was on at last shutdown.
    pub fn restore(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    /// Run until a shutdown signal arrives.
    pub fn run(self) -> Result<()> {
        log_version!();
        if self.debug_enabled {
            log_pipe!();
            log_debug!("Debug mode enabled - showing detailed filter operations");
        }

        let _lock = match InstanceLock::acquire()? {
            LockAttempt::Acquired(lock) => lock,
            LockAttempt::Held(pid) => {
                let holder = pid.map(|pid| format!(" (PID: {pid})")).unwrap_or_default();
                anyhow::bail!("shadefilter is already running{holder}");
            }
        };

        let config_path = config::get_config_path()?;
        let config = Config::load()?;
        config.log_config();

        let signal_state = setup_signal_handler(self.debug_enabled)?;
        let sender = signal_state.signal_sender.clone();

        if let Err(e) = config::start_config_watcher(
            sender.clone(),
            config_path.clone(),
            self.debug_enabled,
        ) {
            log_warning!("Config hot reload disabled: {e:#}");
        }

        let (notifier, outbound) = IpcNotifier::new();
        let server = IpcServer::start(
            crate::ipc::socket_path(),
            outbound,
            sender.clone(),
            Arc::clone(&signal_state.running),
            self.debug_enabled,
        )?;

        let store = open_store(&config);
        let was_on = store.settings().filter_is_on;

        let collaborators = self.collaborators(&config, store, &sender, notifier.clone());
        let filter = ScreenFilter::new(collaborators, sender.clone(), self.debug_enabled);
        let mut controller = Controller::new(
            filter,
            config,
            Some(config_path),
            notifier,
            self.debug_enabled,
        );

        // Boot-time initializer
        if self.restore && was_on {
            log_block_start!("Restoring screen filter from last session");
            controller.handle(SignalMessage::Command(crate::filter::Command::On));
        }

        log_block_start!("Waiting for commands");

        while signal_state.running.load(Ordering::SeqCst) {
            let message = match signal_state
                .signal_receiver
                .recv_timeout(Duration::from_secs(1))
            {
                Ok(message) => message,
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            };

            if controller.handle(message) == Flow::Shutdown {
                break;
            }
        }

        log_block_start!("Shutting down");
        controller.shutdown();
        signal_state.running.store(false, Ordering::SeqCst);
        if let Err(e) = server.shutdown() {
            log_warning!("{e:#}");
        }
        log_end!();
        Ok(())
    }

    /// Real collaborators, falling back to logging stand-ins where the
    /// desktop does not provide one.
    fn collaborators(
        &self,
        config: &Config,
        store: Box<dyn SettingsStore>,
        sender: &std::sync::mpsc::Sender<SignalMessage>,
        notifier: IpcNotifier,
    ) -> Collaborators {
        let sink: Box<dyn OverlaySink> = if self.dry_run || config.sink() == SinkKind::Log {
            Box::new(LogSink::new(self.debug_enabled))
        } else {
            Box::new(HyprsunsetSink::new(self.debug_enabled))
        };
        let overlay = Overlay::new(sink, Duration::from_millis(config.fade_duration_ms()));
        let guard = overlay.guard();

        let monitor = EnvironmentMonitor::new(
            Box::new(ScreenSaverWatcher::new(sender.clone(), self.debug_enabled)),
            Arc::new(HyprlandForeground::new()),
            MonitorSettings::from_config(config),
            sender.clone(),
            self.debug_enabled,
        );

        let publisher: Box<dyn NotificationPublisher> =
            match DesktopNotifier::connect(sender.clone(), self.debug_enabled) {
                Ok(notifier) => Box::new(notifier),
                Err(e) => {
                    log_warning!("Notifications unavailable: {e:#}");
                    Box::new(LogPublisher::new(self.debug_enabled))
                }
            };

        let brightness: Box<dyn BrightnessControl> = if self.dry_run {
            Box::new(NoBacklight)
        } else {
            match SysfsBacklight::open(config.backlight_device()) {
                Ok(backlight) => {
                    if self.debug_enabled {
                        log_debug!("Using backlight {}", backlight.name());
                    }
                    Box::new(backlight)
                }
                Err(e) => {
                    if config.lower_brightness() {
                        log_warning!("Brightness control unavailable: {e:#}");
                    }
                    Box::new(NoBacklight)
                }
            }
        };

        Collaborators {
            store,
            overlay: Box::new(overlay),
            monitor: Box::new(monitor),
            publisher,
            broadcaster: Box::new(notifier),
            brightness,
            guard: Box::new(guard),
        }
    }
}

fn open_store(config: &Config) -> Box<dyn SettingsStore> {
    let opened = FileStore::default_path().and_then(|path| FileStore::open(path, config));
    match opened {
        Ok(store) => Box::new(store),
        Err(e) => {
            log_warning!("Runtime state will not persist: {e:#}");
            Box::new(MemoryStore::new(Settings::from_config(config)))
        }
    }
}

/// Whether the loop keeps going after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Loop body of the daemon.
pub struct Controller {
    filter: ScreenFilter,
    config: Config,
    config_path: Option<PathBuf>,
    notifier: IpcNotifier,
    debug_enabled: bool,
}

impl Controller {
    pub fn new(
        filter: ScreenFilter,
        config: Config,
        config_path: Option<PathBuf>,
        notifier: IpcNotifier,
        debug_enabled: bool,
    ) -> Self {
        Self {
            filter,
            config,
            config_path,
            notifier,
            debug_enabled,
        }
    }

    pub fn filter(&self) -> &ScreenFilter {
        &self.filter
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handle(&mut self, message: SignalMessage) -> Flow {
        match message {
            SignalMessage::Command(command) => self.filter.dispatch(command),
            SignalMessage::Event(event) => self.filter.handle_event(event),
            SignalMessage::FadeFinished {
                generation,
                outcome,
            } => self.filter.fade_finished(generation, outcome),
            SignalMessage::Request { client, request } => {
                let reply = self.handle_request(request);
                self.notifier.reply(client, reply);
            }
            SignalMessage::NextProfile => self.next_profile(),
            SignalMessage::Reload => self.reload(),
            SignalMessage::Shutdown => return Flow::Shutdown,
        }
        Flow::Continue
    }

    pub fn shutdown(&mut self) {
        self.filter.shutdown();
    }

    fn handle_request(&mut self, request: IpcRequest) -> IpcEvent {
        if self.debug_enabled {
            log_debug!("IPC request: {request:?}");
        }
        match request {
            IpcRequest::Command { command } => {
                self.filter.dispatch(command);
                IpcEvent::Ack
            }
            IpcRequest::Notify { event } => {
                self.filter.handle_event(event);
                IpcEvent::Ack
            }
            IpcRequest::NextProfile => {
                if self.config.profiles.is_empty() {
                    return IpcEvent::rejected("No profiles configured");
                }
                self.next_profile();
                IpcEvent::Ack
            }
            IpcRequest::Set { field, value } => match self.set(&field, &value) {
                Ok(()) => IpcEvent::Ack,
                Err(e) => IpcEvent::rejected(format!("{e:#}")),
            },
            IpcRequest::Subscribe => IpcEvent::state_changed(self.filter.status()),
        }
    }

    /// Change one setting and report it to the filter.
    ///
    /// Explicit colour, intensity or dim values leave the active profile, so
    /// the profile becomes "Custom".
    pub fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let event = match field {
            "color" => {
                let color = parse_number(field, value)?;
                validate_color(color, field)?;
                self.write(|s| {
                    s.color = color;
                    s.profile_name = CUSTOM_PROFILE_NAME.to_string();
                });
                ReactiveEvent::ColorChanged
            }
            "intensity" => {
                let intensity = parse_number(field, value)?;
                validate_level(intensity, field)?;
                self.write(|s| {
                    s.intensity = intensity;
                    s.profile_name = CUSTOM_PROFILE_NAME.to_string();
                });
                ReactiveEvent::IntensityChanged
            }
            "dim" => {
                let dim = parse_number(field, value)?;
                validate_level(dim, field)?;
                self.write(|s| {
                    s.dim = dim;
                    s.profile_name = CUSTOM_PROFILE_NAME.to_string();
                });
                ReactiveEvent::DimChanged
            }
            "lower_brightness" => {
                let enabled = parse_switch(field, value)?;
                self.write(|s| s.lower_brightness = enabled);
                ReactiveEvent::LowerBrightnessChanged
            }
            "secure_suspend" => {
                let enabled = parse_switch(field, value)?;
                self.write(|s| s.secure_suspend = enabled);
                ReactiveEvent::SecureSuspendChanged
            }
            _ => anyhow::bail!(
                "Unknown field '{field}' (expected color, intensity, dim, lower_brightness or secure_suspend)"
            ),
        };

        log_decorated!("Set {field} to {value}");
        self.filter.handle_event(event);
        if matches!(
            event,
            ReactiveEvent::ColorChanged | ReactiveEvent::IntensityChanged | ReactiveEvent::DimChanged
        ) {
            self.filter.handle_event(ReactiveEvent::ProfileChanged);
        }
        Ok(())
    }

    /// Advance to the next profile; "Custom" is followed by the first one.
    pub fn next_profile(&mut self) {
        let profiles = &self.config.profiles;
        if profiles.is_empty() {
            log_info!("No profiles configured");
            return;
        }

        let settings = self.filter.store().settings();
        let index = if settings.profile_name == CUSTOM_PROFILE_NAME {
            0
        } else {
            (settings.profile_index + 1) % profiles.len()
        };
        let profile = profiles[index].clone();

        self.write(|s| {
            s.profile_index = index;
            s.profile_name = profile.name.clone();
            s.color = profile.color;
            s.intensity = profile.intensity;
            s.dim = profile.dim;
        });

        log_decorated!("Profile: {}", profile.name);
        for event in [
            ReactiveEvent::ColorChanged,
            ReactiveEvent::IntensityChanged,
            ReactiveEvent::DimChanged,
            ReactiveEvent::ProfileChanged,
        ] {
            self.filter.handle_event(event);
        }
    }

    /// Reload the configuration file and apply what changed.
    pub fn reload(&mut self) {
        let Some(path) = self.config_path.clone() else {
            return;
        };
        match Config::load_from_path(&path) {
            Ok(newer) => self.apply_config(newer),
            Err(e) => {
                log_pipe!();
                log_warning!("Keeping the previous configuration: {e:#}");
            }
        }
    }

    /// Diff `newer` against the current configuration and feed the changes to
    /// the store, the monitor and the filter.
    pub fn apply_config(&mut self, newer: Config) {
        let events = self.config.changed_events(&newer);

        if self.config.sink() != newer.sink()
            || self.config.fade_duration_ms() != newer.fade_duration_ms()
            || self.config.backlight != newer.backlight
        {
            log_warning!("Sink, fade duration and backlight changes apply after a restart");
        }

        self.filter
            .monitor_mut()
            .update_settings(MonitorSettings::from_config(&newer));

        let mut emitted = Vec::new();

        if events.contains(&ReactiveEvent::ProfileChanged) {
            emitted.extend(self.rebind_profile(&newer));
        }

        for event in &events {
            let event = *event;
            match event {
                ReactiveEvent::ColorChanged => {
                    let color = newer.color();
                    self.write(|s| {
                        s.color = color;
                        s.profile_name = CUSTOM_PROFILE_NAME.to_string();
                    });
                }
                ReactiveEvent::IntensityChanged => {
                    let intensity = newer.intensity();
                    self.write(|s| {
                        s.intensity = intensity;
                        s.profile_name = CUSTOM_PROFILE_NAME.to_string();
                    });
                }
                ReactiveEvent::DimChanged => {
                    let dim = newer.dim();
                    self.write(|s| {
                        s.dim = dim;
                        s.profile_name = CUSTOM_PROFILE_NAME.to_string();
                    });
                }
                ReactiveEvent::LowerBrightnessChanged => {
                    let enabled = newer.lower_brightness();
                    self.write(|s| s.lower_brightness = enabled);
                }
                ReactiveEvent::SecureSuspendChanged => {
                    let enabled = newer.secure_suspend();
                    self.write(|s| s.secure_suspend = enabled);
                }
                _ => {}
            }
            if !emitted.contains(&event) {
                emitted.push(event);
            }
        }

        if emitted.iter().any(|event| {
            matches!(
                event,
                ReactiveEvent::ColorChanged
                    | ReactiveEvent::IntensityChanged
                    | ReactiveEvent::DimChanged
            )
        }) && !emitted.contains(&ReactiveEvent::ProfileChanged)
        {
            emitted.push(ReactiveEvent::ProfileChanged);
        }

        log_pipe!();
        log_info!("Configuration reloaded ({} change(s))", emitted.len());
        self.config = newer;

        for event in emitted {
            self.filter.handle_event(event);
        }
    }

    /// Keep the active profile across a profile list edit, or fall back to
    /// "Custom" when it was removed. Returns the events to emit.
    fn rebind_profile(&mut self, newer: &Config) -> Vec<ReactiveEvent> {
        let name = self.filter.store().settings().profile_name.clone();
        if name == CUSTOM_PROFILE_NAME {
            return vec![ReactiveEvent::ProfileChanged];
        }

        match newer
            .profiles
            .iter()
            .enumerate()
            .find(|(_, profile)| profile.name == name)
        {
            Some((index, profile)) => {
                let profile = profile.clone();
                self.write(|s| {
                    s.profile_index = index;
                    s.color = profile.color;
                    s.intensity = profile.intensity;
                    s.dim = profile.dim;
                });
                vec![
                    ReactiveEvent::ColorChanged,
                    ReactiveEvent::IntensityChanged,
                    ReactiveEvent::DimChanged,
                    ReactiveEvent::ProfileChanged,
                ]
            }
            None => {
                log_warning!("Profile '{name}' was removed, using custom values");
                self.write(|s| {
                    s.profile_index = 0;
                    s.profile_name = CUSTOM_PROFILE_NAME.to_string();
                });
                vec![ReactiveEvent::ProfileChanged]
            }
        }
    }

    fn write(&mut self, mut edit: impl FnMut(&mut Settings)) {
        if let Err(e) = self.filter.store_mut().update(&mut edit) {
            log_warning!("Failed to persist settings: {e:#}");
        }
    }
}

fn parse_number(field: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .with_context(|| format!("{field} expects a whole number, got '{value}'"))
}

fn parse_switch(field: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => anyhow::bail!("{field} expects true or false, got '{value}'"),
    }
}
