//! Linear fades of a single overlay level on a background thread.
//!
//! A fade steps from the current level to its target every
//! [`FADE_STEP_MS`](crate::constants::FADE_STEP_MS). Cancellation is cooperative:
//! the thread checks its flag before every step, and the caller joins it so no
//! step can land after `cancel` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{Surface, lock_surface};
use crate::constants::FADE_STEP_MS;

/// How a fade ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    Completed,
    Cancelled,
}

/// Runs exactly once when a fade ends, on whichever thread ended it.
pub type FadeCallback = Box<dyn FnOnce(AnimationOutcome) + Send + 'static>;

/// Which overlay level a fade drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Dim,
    Intensity,
}

/// Handle to a running fade.
pub struct Fade {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Fade {
    /// Start fading `channel` of `surface` to `target` over `duration`.
    pub(super) fn spawn(
        surface: Arc<Mutex<Surface>>,
        channel: Channel,
        target: u32,
        duration: Duration,
        on_done: Option<FadeCallback>,
    ) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancel);
        // Shared so the callback still runs when no thread could be spawned
        let on_done = Arc::new(Mutex::new(on_done));
        let thread_on_done = Arc::clone(&on_done);
        let thread_surface = Arc::clone(&surface);

        let handle = thread::Builder::new()
            .name("overlay-fade".to_string())
            .spawn(move || {
                let outcome = run(&thread_surface, channel, target, duration, &cancel_flag);
                finish(&thread_on_done, outcome);
            });

        match handle {
            Ok(handle) => Self {
                cancel,
                handle: Some(handle),
            },
            Err(e) => {
                // Without a thread the fade degrades to a jump
                log_warning!("Failed to spawn fade thread: {e}");
                Self::jump(surface, channel, target);
                finish(&on_done, AnimationOutcome::Completed);
                Self {
                    cancel,
                    handle: None,
                }
            }
        }
    }

    fn jump(surface: Arc<Mutex<Surface>>, channel: Channel, target: u32) {
        let mut surface = lock_surface(&surface);
        surface.set_level(channel, target);
        surface.render();
    }

    /// Stop the fade and wait for its thread, which reports `Cancelled`.
    pub fn cancel(mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn finish(on_done: &Mutex<Option<FadeCallback>>, outcome: AnimationOutcome) {
    let callback = on_done
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some(callback) = callback {
        callback(outcome);
    }
}

fn run(
    surface: &Mutex<Surface>,
    channel: Channel,
    target: u32,
    duration: Duration,
    cancel: &AtomicBool,
) -> AnimationOutcome {
    let start = lock_surface(surface).level(channel);
    let steps = (duration.as_millis() as u64 / FADE_STEP_MS).max(1);

    for step in 1..=steps {
        if cancel.load(Ordering::SeqCst) {
            return AnimationOutcome::Cancelled;
        }
        thread::sleep(Duration::from_millis(FADE_STEP_MS));
        if cancel.load(Ordering::SeqCst) {
            return AnimationOutcome::Cancelled;
        }

        let mut surface = lock_surface(surface);
        surface.set_level(channel, interpolate(start, target, step as f32 / steps as f32));
        surface.render();
    }

    AnimationOutcome::Completed
}

/// Linear interpolation between two levels.
pub fn interpolate(from: u32, to: u32, progress: f32) -> u32 {
    let progress = progress.clamp(0.0, 1.0);
    let value = from as f32 + (to as f32 - from as f32) * progress;
    value.round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate() {
        assert_eq!(interpolate(0, 100, 0.0), 0);
        assert_eq!(interpolate(0, 100, 0.5), 50);
        assert_eq!(interpolate(100, 0, 0.25), 75);
        assert_eq!(interpolate(40, 40, 0.7), 40);
        assert_eq!(interpolate(0, 10, 2.0), 10);
    }
}
