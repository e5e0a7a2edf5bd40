//! Recording collaborators for driving a [`ScreenFilter`] in tests.
//!
//! Every fake is a cheap handle around shared state: the filter owns one
//! clone, the test keeps another to inspect what happened.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::brightness::{BrightnessControl, BrightnessReading};
use crate::filter::{Collaborators, Command, FilterStatus, PermissionGuard, ScreenFilter};
use crate::monitor::{Monitor, MonitorSettings};
use crate::overlay::{AnimationOutcome, FadeCallback, Layout, OverlayController};
use crate::publish::{Broadcaster, NotificationPublisher};
use crate::signals::SignalMessage;
use crate::store::{MemoryStore, Settings};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayCall {
    Open,
    Close,
    Relayout,
    SetDim(u32),
    SetIntensity(u32),
    SetColor(u32),
    AnimateDim { level: u32, with_callback: bool },
    AnimateIntensity { level: u32, with_callback: bool },
    CancelDim,
    CancelIntensity,
}

#[derive(Default)]
struct OverlayLog {
    calls: Vec<OverlayCall>,
    open: bool,
    pending_dim: Option<FadeCallback>,
    pending_intensity: Option<FadeCallback>,
}

/// Overlay that records calls and holds fade callbacks until told to finish
/// them. Like the real overlay, superseding or cancelling a fade reports
/// [`AnimationOutcome::Cancelled`].
#[derive(Clone, Default)]
pub struct RecordingOverlay {
    log: Arc<Mutex<OverlayLog>>,
}

impl RecordingOverlay {
    pub fn calls(&self) -> Vec<OverlayCall> {
        lock(&self.log).calls.clone()
    }

    pub fn count(&self, call: &OverlayCall) -> usize {
        lock(&self.log).calls.iter().filter(|c| *c == call).count()
    }

    pub fn clear(&self) {
        lock(&self.log).calls.clear();
    }

    pub fn is_open(&self) -> bool {
        lock(&self.log).open
    }

    pub fn pending_fades(&self) -> usize {
        let log = lock(&self.log);
        usize::from(log.pending_dim.is_some()) + usize::from(log.pending_intensity.is_some())
    }

    /// Finish every running fade with `outcome`.
    pub fn finish_fades(&self, outcome: AnimationOutcome) {
        let (dim, intensity) = {
            let mut log = lock(&self.log);
            (log.pending_dim.take(), log.pending_intensity.take())
        };
        for callback in [dim, intensity].into_iter().flatten() {
            callback(outcome);
        }
    }

    fn record(&self, call: OverlayCall) {
        lock(&self.log).calls.push(call);
    }

    fn replace_dim(&self, next: Option<FadeCallback>) {
        let previous = std::mem::replace(&mut lock(&self.log).pending_dim, next);
        if let Some(callback) = previous {
            callback(AnimationOutcome::Cancelled);
        }
    }

    fn replace_intensity(&self, next: Option<FadeCallback>) {
        let previous = std::mem::replace(&mut lock(&self.log).pending_intensity, next);
        if let Some(callback) = previous {
            callback(AnimationOutcome::Cancelled);
        }
    }
}

impl OverlayController for RecordingOverlay {
    fn open(&mut self, _layout: Layout) {
        self.record(OverlayCall::Open);
        lock(&self.log).open = true;
    }

    fn close(&mut self) {
        self.record(OverlayCall::Close);
        self.replace_dim(None);
        self.replace_intensity(None);
        lock(&self.log).open = false;
    }

    fn relayout(&mut self, _layout: Layout) {
        self.record(OverlayCall::Relayout);
    }

    fn set_dim(&mut self, level: u32) {
        self.record(OverlayCall::SetDim(level));
    }

    fn set_intensity(&mut self, level: u32) {
        self.record(OverlayCall::SetIntensity(level));
    }

    fn set_color(&mut self, temperature: u32) {
        self.record(OverlayCall::SetColor(temperature));
    }

    fn animate_dim(&mut self, level: u32, on_done: Option<FadeCallback>) {
        self.record(OverlayCall::AnimateDim {
            level,
            with_callback: on_done.is_some(),
        });
        self.replace_dim(on_done);
    }

    fn animate_intensity(&mut self, level: u32, on_done: Option<FadeCallback>) {
        self.record(OverlayCall::AnimateIntensity {
            level,
            with_callback: on_done.is_some(),
        });
        self.replace_intensity(on_done);
    }

    fn cancel_dim_animation(&mut self) {
        self.record(OverlayCall::CancelDim);
        self.replace_dim(None);
    }

    fn cancel_intensity_animation(&mut self) {
        self.record(OverlayCall::CancelIntensity);
        self.replace_intensity(None);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorCall {
    Start,
    Stop,
    ScreenOn,
    ScreenOff,
    UpdateSettings(MonitorSettings),
}

#[derive(Default)]
struct MonitorLog {
    calls: Vec<MonitorCall>,
    active: bool,
    screen_on: bool,
}

/// Monitor following the same start/stop/screen rules as the real one,
/// without threads.
#[derive(Clone)]
pub struct RecordingMonitor {
    log: Arc<Mutex<MonitorLog>>,
}

impl Default for RecordingMonitor {
    fn default() -> Self {
        Self {
            log: Arc::new(Mutex::new(MonitorLog {
                screen_on: true,
                ..MonitorLog::default()
            })),
        }
    }
}

impl RecordingMonitor {
    pub fn calls(&self) -> Vec<MonitorCall> {
        lock(&self.log).calls.clone()
    }

    pub fn count(&self, call: &MonitorCall) -> usize {
        lock(&self.log).calls.iter().filter(|c| *c == call).count()
    }

    /// Started by the filter, whether or not it is sampling.
    pub fn is_active(&self) -> bool {
        lock(&self.log).active
    }

    pub fn clear(&self) {
        lock(&self.log).calls.clear();
    }
}

impl Monitor for RecordingMonitor {
    fn start(&mut self) {
        let mut log = lock(&self.log);
        log.calls.push(MonitorCall::Start);
        log.active = true;
    }

    fn stop(&mut self) {
        let mut log = lock(&self.log);
        log.calls.push(MonitorCall::Stop);
        log.active = false;
    }

    fn screen_turned_on(&mut self) {
        let mut log = lock(&self.log);
        log.calls.push(MonitorCall::ScreenOn);
        log.screen_on = true;
    }

    fn screen_turned_off(&mut self) {
        let mut log = lock(&self.log);
        log.calls.push(MonitorCall::ScreenOff);
        log.screen_on = false;
    }

    fn is_running(&self) -> bool {
        let log = lock(&self.log);
        log.active && log.screen_on
    }

    fn update_settings(&mut self, settings: MonitorSettings) {
        lock(&self.log)
            .calls
            .push(MonitorCall::UpdateSettings(settings));
    }
}

/// Records `(filter_is_on, profile_name)` for every refresh.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    refreshes: Arc<Mutex<Vec<(bool, String)>>>,
}

impl RecordingPublisher {
    pub fn refreshes(&self) -> Vec<(bool, String)> {
        lock(&self.refreshes).clone()
    }

    pub fn last(&self) -> Option<(bool, String)> {
        lock(&self.refreshes).last().cloned()
    }

    pub fn clear(&self) {
        lock(&self.refreshes).clear();
    }
}

impl NotificationPublisher for RecordingPublisher {
    fn refresh(&mut self, filter_is_on: bool, profile_name: &str) {
        lock(&self.refreshes).push((filter_is_on, profile_name.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Broadcast {
    FilterToggled(bool),
    PermissionDenied,
    BrightnessDenied,
    StateChanged(FilterStatus),
}

#[derive(Clone, Default)]
pub struct RecordingBroadcaster {
    broadcasts: Arc<Mutex<Vec<Broadcast>>>,
}

impl RecordingBroadcaster {
    pub fn broadcasts(&self) -> Vec<Broadcast> {
        lock(&self.broadcasts).clone()
    }

    /// Every `FilterToggled` value, in order.
    pub fn toggles(&self) -> Vec<bool> {
        lock(&self.broadcasts)
            .iter()
            .filter_map(|b| match b {
                Broadcast::FilterToggled(on) => Some(*on),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, broadcast: &Broadcast) -> usize {
        lock(&self.broadcasts)
            .iter()
            .filter(|b| *b == broadcast)
            .count()
    }

    pub fn last_status(&self) -> Option<FilterStatus> {
        lock(&self.broadcasts).iter().rev().find_map(|b| match b {
            Broadcast::StateChanged(status) => Some(status.clone()),
            _ => None,
        })
    }

    pub fn clear(&self) {
        lock(&self.broadcasts).clear();
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn filter_toggled(&self, filter_is_on: bool) {
        lock(&self.broadcasts).push(Broadcast::FilterToggled(filter_is_on));
    }

    fn permission_denied(&self) {
        lock(&self.broadcasts).push(Broadcast::PermissionDenied);
    }

    fn brightness_denied(&self) {
        lock(&self.broadcasts).push(Broadcast::BrightnessDenied);
    }

    fn state_changed(&self, status: &FilterStatus) {
        lock(&self.broadcasts).push(Broadcast::StateChanged(status.clone()));
    }
}

#[derive(Debug)]
struct BrightnessLog {
    reading: Option<BrightnessReading>,
    writable: bool,
    writes: Vec<(i32, bool)>,
}

/// Brightness device whose writes are remembered and read back.
#[derive(Clone)]
pub struct FakeBrightness {
    log: Arc<Mutex<BrightnessLog>>,
}

impl FakeBrightness {
    pub fn new(reading: Option<BrightnessReading>, writable: bool) -> Self {
        Self {
            log: Arc::new(Mutex::new(BrightnessLog {
                reading,
                writable,
                writes: Vec::new(),
            })),
        }
    }

    pub fn writes(&self) -> Vec<(i32, bool)> {
        lock(&self.log).writes.clone()
    }

    pub fn reading(&self) -> Option<BrightnessReading> {
        lock(&self.log).reading
    }

    pub fn set_writable(&self, writable: bool) {
        lock(&self.log).writable = writable;
    }
}

impl Default for FakeBrightness {
    fn default() -> Self {
        Self::new(
            Some(BrightnessReading {
                value: 180,
                automatic: true,
            }),
            true,
        )
    }
}

impl BrightnessControl for FakeBrightness {
    fn read(&self) -> Option<BrightnessReading> {
        lock(&self.log).reading
    }

    fn set(&mut self, value: i32, automatic: bool) -> Result<()> {
        let mut log = lock(&self.log);
        log.writes.push((value, automatic));
        log.reading = Some(BrightnessReading { value, automatic });
        Ok(())
    }

    fn can_write(&self) -> bool {
        lock(&self.log).writable
    }
}

/// Permission guard flipped from the test.
#[derive(Clone)]
pub struct SwitchGuard {
    allowed: Arc<AtomicBool>,
}

impl SwitchGuard {
    pub fn new(allowed: bool) -> Self {
        Self {
            allowed: Arc::new(AtomicBool::new(allowed)),
        }
    }

    pub fn set_allowed(&self, allowed: bool) {
        self.allowed.store(allowed, Ordering::SeqCst);
    }
}

impl PermissionGuard for SwitchGuard {
    fn may_draw_overlay(&mut self) -> bool {
        self.allowed.load(Ordering::SeqCst)
    }
}

/// A [`ScreenFilter`] wired to recording fakes.
pub struct Harness {
    pub filter: ScreenFilter,
    pub overlay: RecordingOverlay,
    pub monitor: RecordingMonitor,
    pub publisher: RecordingPublisher,
    pub broadcaster: RecordingBroadcaster,
    pub brightness: FakeBrightness,
    pub guard: SwitchGuard,
    fades: Receiver<SignalMessage>,
}

pub struct HarnessBuilder {
    settings: Settings,
    brightness: FakeBrightness,
    guard: Option<Box<dyn PermissionGuard>>,
    brightness_override: Option<Box<dyn BrightnessControl>>,
}

impl HarnessBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn brightness(mut self, brightness: FakeBrightness) -> Self {
        self.brightness = brightness;
        self
    }

    /// Use `guard` instead of the [`SwitchGuard`].
    pub fn guard(mut self, guard: Box<dyn PermissionGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Use `control` instead of the [`FakeBrightness`].
    pub fn brightness_control(mut self, control: Box<dyn BrightnessControl>) -> Self {
        self.brightness_override = Some(control);
        self
    }

    pub fn build(self) -> Harness {
        let overlay = RecordingOverlay::default();
        let monitor = RecordingMonitor::default();
        let publisher = RecordingPublisher::default();
        let broadcaster = RecordingBroadcaster::default();
        let guard = SwitchGuard::new(true);
        let (fade_sender, fades) = mpsc::channel();

        let collaborators = Collaborators {
            store: Box::new(MemoryStore::new(self.settings)),
            overlay: Box::new(overlay.clone()),
            monitor: Box::new(monitor.clone()),
            publisher: Box::new(publisher.clone()),
            broadcaster: Box::new(broadcaster.clone()),
            brightness: self
                .brightness_override
                .unwrap_or_else(|| Box::new(self.brightness.clone())),
            guard: self.guard.unwrap_or_else(|| Box::new(guard.clone())),
        };

        Harness {
            filter: ScreenFilter::new(collaborators, fade_sender, false),
            overlay,
            monitor,
            publisher,
            broadcaster,
            brightness: self.brightness,
            guard,
            fades,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            settings: Settings::default(),
            brightness: FakeBrightness::default(),
            guard: None,
            brightness_override: None,
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self::builder().settings(settings).build()
    }

    pub fn dispatch(&mut self, command: Command) {
        self.filter.dispatch(command);
        self.drain_fades();
    }

    /// Hand queued fade completions to the filter, as the daemon loop would.
    pub fn drain_fades(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(message) = self.fades.try_recv() {
            if let SignalMessage::FadeFinished {
                generation,
                outcome,
            } = message
            {
                self.filter.fade_finished(generation, outcome);
                delivered += 1;
            }
        }
        delivered
    }

    /// Let every running fade complete and deliver the completions.
    pub fn complete_fades(&mut self) -> usize {
        self.overlay.finish_fades(AnimationOutcome::Completed);
        self.drain_fades()
    }

    pub fn settings(&self) -> Settings {
        self.filter.store().settings().clone()
    }

    /// Write to the store the way `set` does, then report `event`.
    pub fn change(
        &mut self,
        edit: impl FnOnce(&mut Settings),
        event: crate::filter::ReactiveEvent,
    ) {
        let mut edit = Some(edit);
        let _ = self.filter.store_mut().update(&mut |s| {
            if let Some(edit) = edit.take() {
                edit(s);
            }
        });
        self.filter.handle_event(event);
        self.drain_fades();
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.overlay.clear();
        self.monitor.clear();
        self.publisher.clear();
        self.broadcaster.clear();
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
