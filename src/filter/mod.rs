//! The screen filter state machine.
//!
//! [`ScreenFilter`] is the sole owner of the current [`State`]. Every command
//! and reactive event is handled on the daemon thread, so transitions never
//! interleave. Collaborators are injected through [`Collaborators`]; the filter
//! only talks to them through their traits.
//!
//! A transition looks up the target in the current state's table, checks the
//! [`PermissionGuard`], swaps the state and runs the new state's entry actions.
//! `Preview` and `Suspend` wrap the base state they were entered from: commands
//! they do not handle themselves only rewrite that base state, and the real
//! transition happens when the wrapper ends.

pub mod state;

use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;

pub use state::{BaseState, Command, ReactiveEvent, State, StateKind};

use crate::brightness::BrightnessControl;
use crate::constants::*;
use crate::monitor::Monitor;
use crate::overlay::{AnimationOutcome, Layout, OverlayController};
use crate::publish::{Broadcaster, NotificationPublisher};
use crate::signals::SignalMessage;
use crate::store::SettingsStore;

/// Capability check consulted before every transition.
#[cfg_attr(test, mockall::automock)]
pub trait PermissionGuard: Send {
    /// Whether the overlay may currently be drawn above other windows.
    fn may_draw_overlay(&mut self) -> bool;
}

/// Everything the filter drives.
pub struct Collaborators {
    pub store: Box<dyn SettingsStore>,
    pub overlay: Box<dyn OverlayController>,
    pub monitor: Box<dyn Monitor>,
    pub publisher: Box<dyn NotificationPublisher>,
    pub broadcaster: Box<dyn Broadcaster>,
    pub brightness: Box<dyn BrightnessControl>,
    pub guard: Box<dyn PermissionGuard>,
}

/// Snapshot published to IPC subscribers after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStatus {
    pub state: StateKind,
    pub filter_is_on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_to: Option<StateKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holds: Option<u32>,
    pub profile: String,
    pub color: u32,
    pub intensity: u32,
    pub dim: u32,
}

pub struct ScreenFilter {
    state: State,
    saved_brightness: i32,
    saved_auto_brightness: bool,
    // Whether the backlight is currently forced down by this process
    brightness_lowered: bool,
    // Bumped on every activation; fade completions from older activations are ignored
    fade_generation: u64,
    fade_sender: Sender<SignalMessage>,
    store: Box<dyn SettingsStore>,
    overlay: Box<dyn OverlayController>,
    monitor: Box<dyn Monitor>,
    publisher: Box<dyn NotificationPublisher>,
    broadcaster: Box<dyn Broadcaster>,
    brightness: Box<dyn BrightnessControl>,
    guard: Box<dyn PermissionGuard>,
    debug_enabled: bool,
}

impl ScreenFilter {
    /// Build the filter in `Init` and immediately dispatch `Off`.
    ///
    /// Fade completions are reported on `fade_sender` as
    /// [`SignalMessage::FadeFinished`] and must be handed back through
    /// [`ScreenFilter::fade_finished`].
    pub fn new(
        collaborators: Collaborators,
        fade_sender: Sender<SignalMessage>,
        debug_enabled: bool,
    ) -> Self {
        let Collaborators {
            store,
            overlay,
            monitor,
            publisher,
            broadcaster,
            brightness,
            guard,
        } = collaborators;

        // A brightness saved before a crash is still restored by the first Off
        let settings = store.settings();
        let saved_brightness = settings.saved_brightness;
        let saved_auto_brightness = settings.saved_auto_brightness;
        let brightness_lowered = saved_brightness != NO_SAVED_BRIGHTNESS;

        let mut filter = Self {
            state: State::Init,
            saved_brightness,
            saved_auto_brightness,
            brightness_lowered,
            fade_generation: 0,
            fade_sender,
            store,
            overlay,
            monitor,
            publisher,
            broadcaster,
            brightness,
            guard,
            debug_enabled,
        };
        filter.dispatch(Command::Off);
        filter
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn filter_is_on(&self) -> bool {
        self.state.filter_is_on()
    }

    pub fn saved_brightness(&self) -> (i32, bool) {
        (self.saved_brightness, self.saved_auto_brightness)
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    /// Write access for settings changes; follow up with [`ScreenFilter::handle_event`].
    pub fn store_mut(&mut self) -> &mut dyn SettingsStore {
        self.store.as_mut()
    }

    pub fn monitor_mut(&mut self) -> &mut dyn Monitor {
        self.monitor.as_mut()
    }

    pub fn status(&self) -> FilterStatus {
        let settings = self.store.settings();
        let (return_to, holds) = match self.state {
            State::Preview { return_to, holds } => (Some(return_to.kind()), Some(holds)),
            State::Suspend { return_to } => (Some(return_to.kind()), None),
            _ => (None, None),
        };
        FilterStatus {
            state: self.state.kind(),
            filter_is_on: self.state.filter_is_on(),
            return_to,
            holds,
            profile: settings.profile_name.clone(),
            color: settings.color,
            intensity: settings.intensity,
            dim: settings.dim,
        }
    }

    /// Handle an inbound command.
    pub fn dispatch(&mut self, command: Command) {
        if self.debug_enabled {
            log_debug!("Command {} in state {}", command.as_str(), self.state.kind());
        }

        match &mut self.state {
            State::Preview { return_to, holds } => match command {
                Command::ShowPreview => {
                    *holds += 1;
                    self.broadcaster.state_changed(&self.status());
                }
                Command::HidePreview => {
                    *holds = holds.saturating_sub(1);
                    // A refused return stays at zero holds; the next hide retries it
                    if *holds == 0 {
                        let target = return_to.kind();
                        self.move_to(target);
                    } else {
                        self.broadcaster.state_changed(&self.status());
                    }
                }
                other => {
                    defer(return_to, other);
                    self.broadcaster.state_changed(&self.status());
                }
            },
            State::Suspend { return_to } => match command {
                Command::StopSuspend => {
                    let target = return_to.kind();
                    self.move_to(target);
                }
                Command::StartSuspend => {}
                other => {
                    defer(return_to, other);
                    self.broadcaster.state_changed(&self.status());
                }
            },
            state => {
                let target = state.next_state(command);
                self.move_to(target);
            }
        }
    }

    /// React to a change that already happened elsewhere.
    pub fn handle_event(&mut self, event: ReactiveEvent) {
        if self.debug_enabled {
            log_debug!("Event {} in state {}", event.as_str(), self.state.kind());
        }

        match event {
            ReactiveEvent::ScreenTurnedOn => self.monitor.screen_turned_on(),
            ReactiveEvent::ScreenTurnedOff => self.monitor.screen_turned_off(),
            ReactiveEvent::OrientationChanged => self.overlay.relayout(Layout::full_screen()),
            ReactiveEvent::ProfileChanged => {
                self.refresh_notification();
                self.broadcaster.state_changed(&self.status());
            }
            ReactiveEvent::LowerBrightnessChanged if !self.brightness.can_write() => {
                log_warning!("Brightness cannot be changed by this process");
                self.broadcaster.brightness_denied();
            }
            event => self.state_event(event),
        }
    }

    /// Completion of a fade started by an entry action.
    ///
    /// Only the fade-out of the current `Off` activation closes the overlay;
    /// callbacks from superseded activations arrive late and are dropped.
    pub fn fade_finished(&mut self, generation: u64, outcome: AnimationOutcome) {
        if generation != self.fade_generation {
            if self.debug_enabled {
                log_debug!("Dropping stale fade completion ({outcome:?})");
            }
            return;
        }
        if matches!(self.state, State::On | State::Preview { .. }) {
            return;
        }
        self.overlay.close();
    }

    /// Hide the overlay and give back the brightness before the process exits.
    ///
    /// The stored `filter_is_on` is left alone so the next start can restore it.
    pub fn shutdown(&mut self) {
        self.overlay.cancel_dim_animation();
        self.overlay.cancel_intensity_animation();
        self.overlay.close();
        self.restore_brightness();
        self.monitor.stop();
    }

    fn move_to(&mut self, target: StateKind) {
        if target == self.state.kind() {
            return;
        }

        if !self.guard.may_draw_overlay() {
            log_warning!(
                "Permission to draw the overlay denied, staying {}",
                self.state.kind()
            );
            self.broadcaster.permission_denied();
            return;
        }

        let previous = self.state;
        self.state = match target {
            StateKind::Init => State::Init,
            StateKind::On => State::On,
            StateKind::Off => State::Off,
            StateKind::Preview => State::Preview {
                return_to: previous.base(),
                holds: 1,
            },
            StateKind::Suspend => State::Suspend {
                return_to: previous.base(),
            },
        };

        log_decorated!("Screen filter: {} → {}", previous.kind(), target);
        self.activate(previous);
    }

    fn activate(&mut self, previous: State) {
        self.fade_generation += 1;

        match self.state {
            State::Init => {
                self.enter_common();
                self.overlay.close();
            }
            State::On => self.enter_on(),
            State::Off => self.enter_off(previous),
            State::Preview { .. } => self.enter_preview(),
            State::Suspend { .. } => {
                self.overlay.close();
                self.enter_common();
            }
        }
    }

    /// Shared by every state: keep the store, notification and listeners in line.
    fn enter_common(&mut self) {
        let filter_is_on = self.state.filter_is_on();
        let changed = self.store.settings().filter_is_on != filter_is_on;

        if let Err(e) = self.store.update(&mut |s| s.filter_is_on = filter_is_on) {
            log_warning!("Failed to persist filter state: {e}");
        }
        if changed {
            self.broadcaster.filter_toggled(filter_is_on);
        }
        self.refresh_notification();
        self.broadcaster.state_changed(&self.status());
    }

    fn enter_on(&mut self) {
        let settings = self.store.settings().clone();

        self.overlay.set_color(settings.color);
        self.overlay.open(Layout::full_screen());
        self.enter_common();
        self.overlay.animate_dim(settings.dim, None);
        self.overlay.animate_intensity(settings.intensity, None);

        // The setting may have changed while a wrapper deferred it
        self.sync_brightness(settings.lower_brightness);

        if settings.secure_suspend {
            self.monitor.start();
        } else {
            self.monitor.stop();
        }
    }

    fn enter_off(&mut self, previous: State) {
        self.enter_common();

        if matches!(previous, State::Preview { .. }) {
            self.overlay.close();
        } else {
            let generation = self.fade_generation;
            let sender = self.fade_sender.clone();
            self.overlay.animate_intensity(MIN_INTENSITY, None);
            self.overlay.animate_dim(
                MIN_DIM,
                Some(Box::new(move |outcome| {
                    let _ = sender.send(SignalMessage::FadeFinished {
                        generation,
                        outcome,
                    });
                })),
            );
        }

        self.restore_brightness();
        self.monitor.stop();
    }

    fn enter_preview(&mut self) {
        let settings = self.store.settings().clone();

        self.enter_common();
        self.overlay.cancel_dim_animation();
        self.overlay.cancel_intensity_animation();
        self.overlay.open(Layout::full_screen());
        self.overlay.set_dim(settings.dim);
        self.overlay.set_intensity(settings.intensity);
        self.overlay.set_color(settings.color);
    }

    fn state_event(&mut self, event: ReactiveEvent) {
        let settings = self.store.settings().clone();
        let live = matches!(self.state, State::On | State::Preview { .. });

        match event {
            ReactiveEvent::ColorChanged if live => self.overlay.set_color(settings.color),
            ReactiveEvent::IntensityChanged if live => {
                self.overlay.cancel_intensity_animation();
                self.overlay.set_intensity(settings.intensity);
            }
            ReactiveEvent::DimChanged if live => {
                self.overlay.cancel_dim_animation();
                self.overlay.set_dim(settings.dim);
            }
            ReactiveEvent::LowerBrightnessChanged if self.state == State::On => {
                self.sync_brightness(settings.lower_brightness);
            }
            ReactiveEvent::SecureSuspendChanged if self.state == State::On => {
                if settings.secure_suspend {
                    self.monitor.start();
                } else {
                    self.monitor.stop();
                }
            }
            _ => {}
        }

        if matches!(
            event,
            ReactiveEvent::ColorChanged | ReactiveEvent::IntensityChanged | ReactiveEvent::DimChanged
        ) {
            self.broadcaster.state_changed(&self.status());
        }
    }

    fn refresh_notification(&mut self) {
        let profile = self.store.settings().profile_name.clone();
        self.publisher.refresh(self.state.filter_is_on(), &profile);
    }

    /// Lower or restore so the backlight matches `lower`.
    ///
    /// Lowering twice would snapshot the forced minimum over the real value.
    fn sync_brightness(&mut self, lower: bool) {
        match (lower, self.brightness_lowered) {
            (true, false) => self.lower_brightness(),
            (false, true) => self.restore_brightness(),
            _ => {}
        }
    }

    /// Snapshot the brightness, then force it to the minimum.
    fn lower_brightness(&mut self) {
        match self.brightness.read() {
            Some(reading) => {
                self.saved_brightness = reading.value;
                self.saved_auto_brightness = reading.automatic;
            }
            None => {
                log_warning!("Current brightness unavailable, nothing will be restored");
                self.saved_brightness = NO_SAVED_BRIGHTNESS;
                self.saved_auto_brightness = false;
            }
        }
        self.persist_saved_brightness();
        self.set_brightness(LOWERED_BRIGHTNESS, false);
        self.brightness_lowered = true;
    }

    fn restore_brightness(&mut self) {
        self.brightness_lowered = false;
        if self.saved_brightness == NO_SAVED_BRIGHTNESS {
            return;
        }
        self.set_brightness(self.saved_brightness, self.saved_auto_brightness);
        self.saved_brightness = NO_SAVED_BRIGHTNESS;
        self.saved_auto_brightness = false;
        self.persist_saved_brightness();
    }

    fn persist_saved_brightness(&mut self) {
        let (value, automatic) = (self.saved_brightness, self.saved_auto_brightness);
        if let Err(e) = self.store.update(&mut |s| {
            s.saved_brightness = value;
            s.saved_auto_brightness = automatic;
        }) {
            log_warning!("Failed to persist saved brightness: {e}");
        }
    }

    /// No-op when brightness is not writable or `value` is negative.
    fn set_brightness(&mut self, value: i32, automatic: bool) {
        if value < 0 || !self.brightness.can_write() {
            return;
        }
        if let Err(e) = self.brightness.set(value, automatic) {
            log_warning!("Failed to set brightness: {e}");
        }
    }
}

/// Record what `return_to` would become without transitioning.
///
/// Commands that lead into a wrapper cannot be deferred and are dropped.
fn defer(return_to: &mut BaseState, command: Command) {
    if let Some(base) = return_to.next_state(command).as_base() {
        *return_to = base;
    }
}

#[cfg(test)]
mod tests;
