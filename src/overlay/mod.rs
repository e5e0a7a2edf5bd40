//! The tinted overlay surface.
//!
//! [`OverlayController`] is the narrow interface the screen filter drives.
//! [`Overlay`] implements it on top of an [`OverlaySink`], which turns the
//! overlay levels into something visible: the [`HyprsunsetSink`] expresses the
//! tint as a colour temperature and the dim as gamma, the [`LogSink`] only
//! prints frames.

pub mod animation;
pub mod hyprsunset;

use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub use animation::{AnimationOutcome, Channel, Fade, FadeCallback};
pub use hyprsunset::HyprsunsetSink;

use crate::constants::*;
use crate::filter::PermissionGuard;

/// Where the overlay is placed.
///
/// An empty output list covers every output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub outputs: Vec<String>,
}

impl Layout {
    pub fn full_screen() -> Self {
        Self::default()
    }

    pub fn describe(&self) -> String {
        if self.outputs.is_empty() {
            "all outputs".to_string()
        } else {
            self.outputs.join(", ")
        }
    }
}

/// Imperative control over the overlay surface.
pub trait OverlayController: Send {
    fn open(&mut self, layout: Layout);
    fn close(&mut self);
    fn relayout(&mut self, layout: Layout);

    fn set_dim(&mut self, level: u32);
    fn set_intensity(&mut self, level: u32);
    fn set_color(&mut self, temperature: u32);

    /// Fade the dim level. `on_done` runs once, on completion or cancellation.
    fn animate_dim(&mut self, level: u32, on_done: Option<FadeCallback>);
    fn animate_intensity(&mut self, level: u32, on_done: Option<FadeCallback>);

    fn cancel_dim_animation(&mut self);
    fn cancel_intensity_animation(&mut self);
}

/// Levels pushed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub color: u32,
    pub intensity: u32,
    pub dim: u32,
}

/// Renders overlay frames.
pub trait OverlaySink: Send {
    fn name(&self) -> &'static str;

    fn render(&mut self, frame: Frame, layout: &Layout) -> Result<()>;

    /// Remove every visible trace of the overlay.
    fn hide(&mut self) -> Result<()>;

    /// Whether the sink can currently draw over other windows.
    fn is_available(&mut self) -> bool;
}

/// Sink that only logs frames; used for `--dry-run`.
pub struct LogSink {
    debug_enabled: bool,
}

impl LogSink {
    pub fn new(debug_enabled: bool) -> Self {
        Self { debug_enabled }
    }
}

impl OverlaySink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn render(&mut self, frame: Frame, layout: &Layout) -> Result<()> {
        if self.debug_enabled {
            log_debug!(
                "Overlay frame: {}K, intensity {}%, dim {}% on {}",
                frame.color,
                frame.intensity,
                frame.dim,
                layout.describe()
            );
        }
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        if self.debug_enabled {
            log_debug!("Overlay hidden");
        }
        Ok(())
    }

    fn is_available(&mut self) -> bool {
        true
    }
}

/// State shared between the overlay and its fade threads.
pub(crate) struct Surface {
    sink: Box<dyn OverlaySink>,
    open: bool,
    layout: Layout,
    frame: Frame,
}

impl Surface {
    fn level(&self, channel: Channel) -> u32 {
        match channel {
            Channel::Dim => self.frame.dim,
            Channel::Intensity => self.frame.intensity,
        }
    }

    fn set_level(&mut self, channel: Channel, level: u32) {
        match channel {
            Channel::Dim => self.frame.dim = level,
            Channel::Intensity => self.frame.intensity = level,
        }
    }

    /// Push the current frame when open. Sink failures are logged, not raised.
    fn render(&mut self) {
        if !self.open {
            return;
        }
        if let Err(e) = self.sink.render(self.frame, &self.layout) {
            log_warning!("Failed to render overlay through {}: {e}", self.sink.name());
        }
    }
}

fn lock_surface(surface: &Mutex<Surface>) -> MutexGuard<'_, Surface> {
    // A panicking fade thread must not take the overlay down with it
    surface.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Overlay rendered through an [`OverlaySink`], with threaded fades.
pub struct Overlay {
    surface: Arc<Mutex<Surface>>,
    dim_fade: Option<Fade>,
    intensity_fade: Option<Fade>,
    fade_duration: Duration,
}

impl Overlay {
    pub fn new(sink: Box<dyn OverlaySink>, fade_duration: Duration) -> Self {
        Self {
            surface: Arc::new(Mutex::new(Surface {
                sink,
                open: false,
                layout: Layout::full_screen(),
                frame: Frame {
                    color: NEUTRAL_COLOR,
                    intensity: MIN_INTENSITY,
                    dim: MIN_DIM,
                },
            })),
            dim_fade: None,
            intensity_fade: None,
            fade_duration,
        }
    }

    pub fn is_open(&self) -> bool {
        lock_surface(&self.surface).open
    }

    pub fn frame(&self) -> Frame {
        lock_surface(&self.surface).frame
    }

    /// Permission guard that asks this overlay's sink.
    pub fn guard(&self) -> SinkGuard {
        SinkGuard {
            surface: Arc::clone(&self.surface),
        }
    }

    fn fade_slot(&mut self, channel: Channel) -> &mut Option<Fade> {
        match channel {
            Channel::Dim => &mut self.dim_fade,
            Channel::Intensity => &mut self.intensity_fade,
        }
    }

    fn cancel_fade(&mut self, channel: Channel) {
        if let Some(fade) = self.fade_slot(channel).take() {
            fade.cancel();
        }
    }

    fn animate(&mut self, channel: Channel, level: u32, on_done: Option<FadeCallback>) {
        self.cancel_fade(channel);

        if self.fade_duration.is_zero() {
            let mut surface = lock_surface(&self.surface);
            surface.set_level(channel, level);
            surface.render();
            drop(surface);
            if let Some(callback) = on_done {
                callback(AnimationOutcome::Completed);
            }
            return;
        }

        let fade = Fade::spawn(
            Arc::clone(&self.surface),
            channel,
            level,
            self.fade_duration,
            on_done,
        );
        *self.fade_slot(channel) = Some(fade);
    }

    fn set_level(&mut self, channel: Channel, level: u32) {
        let mut surface = lock_surface(&self.surface);
        surface.set_level(channel, level);
        surface.render();
    }
}

impl OverlayController for Overlay {
    fn open(&mut self, layout: Layout) {
        let mut surface = lock_surface(&self.surface);
        surface.open = true;
        surface.layout = layout;
        surface.render();
    }

    fn close(&mut self) {
        self.cancel_fade(Channel::Dim);
        self.cancel_fade(Channel::Intensity);

        let mut surface = lock_surface(&self.surface);
        if !surface.open {
            return;
        }
        surface.open = false;
        if let Err(e) = surface.sink.hide() {
            log_warning!("Failed to hide overlay through {}: {e}", surface.sink.name());
        }
    }

    fn relayout(&mut self, layout: Layout) {
        let mut surface = lock_surface(&self.surface);
        surface.layout = layout;
        surface.render();
    }

    fn set_dim(&mut self, level: u32) {
        self.set_level(Channel::Dim, level);
    }

    fn set_intensity(&mut self, level: u32) {
        self.set_level(Channel::Intensity, level);
    }

    fn set_color(&mut self, temperature: u32) {
        let mut surface = lock_surface(&self.surface);
        surface.frame.color = temperature;
        surface.render();
    }

    fn animate_dim(&mut self, level: u32, on_done: Option<FadeCallback>) {
        self.animate(Channel::Dim, level, on_done);
    }

    fn animate_intensity(&mut self, level: u32, on_done: Option<FadeCallback>) {
        self.animate(Channel::Intensity, level, on_done);
    }

    fn cancel_dim_animation(&mut self) {
        self.cancel_fade(Channel::Dim);
    }

    fn cancel_intensity_animation(&mut self) {
        self.cancel_fade(Channel::Intensity);
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        self.cancel_fade(Channel::Dim);
        self.cancel_fade(Channel::Intensity);
    }
}

/// Grants overlay transitions while the sink is reachable.
pub struct SinkGuard {
    surface: Arc<Mutex<Surface>>,
}

impl PermissionGuard for SinkGuard {
    fn may_draw_overlay(&mut self) -> bool {
        lock_surface(&self.surface).sink.is_available()
    }
}
