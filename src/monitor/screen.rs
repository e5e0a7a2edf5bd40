//! Screen on/off detection through `org.freedesktop.ScreenSaver`.
//!
//! An active screensaver counts as the screen being off. The watcher thread
//! forwards `ActiveChanged` as `ScreenTurnedOff`/`ScreenTurnedOn` events while
//! registered.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use zbus::blocking::Connection;

use crate::filter::ReactiveEvent;
use crate::signals::SignalMessage;

#[zbus::proxy(
    interface = "org.freedesktop.ScreenSaver",
    default_service = "org.freedesktop.ScreenSaver",
    default_path = "/org/freedesktop/ScreenSaver"
)]
trait ScreenSaver {
    fn get_active(&self) -> zbus::Result<bool>;

    #[zbus(signal)]
    fn active_changed(&self, active: bool) -> zbus::Result<()>;
}

/// Source of screen on/off events.
pub trait ScreenWatcher: Send {
    fn register(&mut self) -> Result<()>;

    /// Errors when not registered.
    fn unregister(&mut self) -> Result<()>;

    fn is_screen_on(&self) -> bool;
}

pub struct ScreenSaverWatcher {
    signal_sender: Sender<SignalMessage>,
    // Read by the listener thread; changes are dropped while cleared
    forwarding: Arc<AtomicBool>,
    // Set while a listener thread is running; one serves every registration
    listening: Arc<AtomicBool>,
    registered: bool,
    debug_enabled: bool,
}

impl ScreenSaverWatcher {
    pub fn new(signal_sender: Sender<SignalMessage>, debug_enabled: bool) -> Self {
        Self {
            signal_sender,
            forwarding: Arc::new(AtomicBool::new(false)),
            listening: Arc::new(AtomicBool::new(false)),
            registered: false,
            debug_enabled,
        }
    }

    fn proxy() -> Result<ScreenSaverProxyBlocking<'static>> {
        let connection = Connection::session().context("Failed to connect to session D-Bus")?;
        ScreenSaverProxyBlocking::new(&connection).context("Failed to create screensaver proxy")
    }

    fn spawn_listener(&self) -> Result<()> {
        let proxy = Self::proxy()?;
        let signals = proxy
            .receive_active_changed()
            .context("Failed to subscribe to ActiveChanged")?;

        let forwarding = Arc::clone(&self.forwarding);
        let listening = Arc::clone(&self.listening);
        let sender = self.signal_sender.clone();
        let debug_enabled = self.debug_enabled;

        listening.store(true, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name("screen-watcher".to_string())
            .spawn(move || {
                // Keep the proxy alive as long as the subscription
                let _proxy = proxy;
                let changes = signals.filter_map(|signal| signal.args().ok().map(|a| a.active));
                forward_changes(changes, &forwarding, &sender, debug_enabled);
                listening.store(false, Ordering::SeqCst);
            });

        if let Err(e) = spawned {
            self.listening.store(false, Ordering::SeqCst);
            return Err(e).context("Failed to spawn screen watcher");
        }
        Ok(())
    }
}

/// Forward screensaver changes while `forwarding` is set.
///
/// Returns when the change stream ends or the receiver is gone.
fn forward_changes(
    changes: impl Iterator<Item = bool>,
    forwarding: &AtomicBool,
    sender: &Sender<SignalMessage>,
    debug_enabled: bool,
) {
    for active in changes {
        if !forwarding.load(Ordering::SeqCst) {
            continue;
        }
        let event = if active {
            ReactiveEvent::ScreenTurnedOff
        } else {
            ReactiveEvent::ScreenTurnedOn
        };
        if debug_enabled {
            log_debug!("Screen state: {}", event.as_str());
        }
        if sender.send(SignalMessage::Event(event)).is_err() {
            break;
        }
    }
}

impl ScreenWatcher for ScreenSaverWatcher {
    fn register(&mut self) -> Result<()> {
        if self.registered {
            return Ok(());
        }
        if !self.listening.load(Ordering::SeqCst) {
            self.spawn_listener()?;
        }
        self.forwarding.store(true, Ordering::SeqCst);
        self.registered = true;
        Ok(())
    }

    fn unregister(&mut self) -> Result<()> {
        if !self.registered {
            anyhow::bail!("Screen watcher is not registered");
        }
        self.forwarding.store(false, Ordering::SeqCst);
        self.registered = false;
        Ok(())
    }

    fn is_screen_on(&self) -> bool {
        // Without a screensaver service the screen is assumed on
        Self::proxy()
            .and_then(|proxy| proxy.get_active().context("GetActive failed"))
            .map(|active| !active)
            .unwrap_or(true)
    }
}
