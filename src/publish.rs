//! Outbound notification and broadcast side effects of the screen filter.
//!
//! [`NotificationPublisher`] keeps a desktop notification in line with the
//! filter: while the filter is on the notification is resident and never
//! expires, otherwise it is an ordinary notification. Both carry a toggle
//! action and a "next profile" action, which come back into the daemon as
//! [`SignalMessage`]s.
//!
//! [`Broadcaster`] tells everything else (IPC subscribers, scripts) what
//! happened.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use zbus::blocking::Connection;
use zbus::zvariant::Value;

use crate::filter::{Command, FilterStatus};
use crate::signals::SignalMessage;

/// Builds and (re)presents the notification.
pub trait NotificationPublisher: Send {
    fn refresh(&mut self, filter_is_on: bool, profile_name: &str);
}

/// One-way signals for listeners outside the daemon.
pub trait Broadcaster: Send {
    /// The filter switched on or off.
    fn filter_toggled(&self, filter_is_on: bool);
    /// A transition was refused by the permission guard.
    fn permission_denied(&self);
    /// Brightness lowering was requested but brightness is not writable.
    fn brightness_denied(&self);
    fn state_changed(&self, status: &FilterStatus);
}

const ACTION_TOGGLE: &str = "toggle";
const ACTION_NEXT_PROFILE: &str = "next_profile";

#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: &HashMap<&str, &Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn close_notification(&self, id: u32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn action_invoked(&self, id: u32, action_key: String) -> zbus::Result<()>;
}

/// Notification posted through `org.freedesktop.Notifications`.
pub struct DesktopNotifier {
    proxy: NotificationsProxyBlocking<'static>,
    // Id of the posted notification, 0 before the first one
    notification_id: Arc<AtomicU32>,
    filter_is_on: Arc<AtomicBool>,
    debug_enabled: bool,
}

impl DesktopNotifier {
    /// Connect to the session bus and start listening for action clicks.
    pub fn connect(signal_sender: Sender<SignalMessage>, debug_enabled: bool) -> Result<Self> {
        let connection = Connection::session().context("Failed to connect to session D-Bus")?;
        let proxy = NotificationsProxyBlocking::new(&connection)
            .context("Failed to create notifications proxy")?;

        let notifier = Self {
            proxy,
            notification_id: Arc::new(AtomicU32::new(0)),
            filter_is_on: Arc::new(AtomicBool::new(false)),
            debug_enabled,
        };
        notifier.spawn_action_listener(signal_sender)?;
        Ok(notifier)
    }

    fn spawn_action_listener(&self, signal_sender: Sender<SignalMessage>) -> Result<()> {
        let proxy = self.proxy.clone();
        let notification_id = Arc::clone(&self.notification_id);
        let filter_is_on = Arc::clone(&self.filter_is_on);
        let debug_enabled = self.debug_enabled;

        thread::Builder::new()
            .name("notification-actions".to_string())
            .spawn(move || {
                let actions = match proxy.receive_action_invoked() {
                    Ok(actions) => actions,
                    Err(e) => {
                        log_warning!("Failed to subscribe to notification actions: {e}");
                        return;
                    }
                };

                for signal in actions {
                    let Ok(args) = signal.args() else {
                        continue;
                    };
                    if args.id != notification_id.load(Ordering::SeqCst) {
                        continue;
                    }

                    let is_on = filter_is_on.load(Ordering::SeqCst);
                    let Some(message) = action_message(&args.action_key, is_on) else {
                        continue;
                    };
                    if debug_enabled {
                        log_debug!("Notification action: {}", args.action_key);
                    }
                    if signal_sender.send(message).is_err() {
                        break;
                    }
                }
            })
            .context("Failed to spawn notification action listener")?;

        Ok(())
    }

    fn post(&self, filter_is_on: bool, profile_name: &str) -> Result<u32> {
        let content = NotificationContent::new(filter_is_on, profile_name);
        let resident = Value::from(content.resident);
        let mut hints = HashMap::new();
        hints.insert("resident", &resident);

        let actions: Vec<&str> = content
            .actions
            .iter()
            .flat_map(|(key, label)| [*key, label.as_str()])
            .collect();

        self.proxy
            .notify(
                "shadefilter",
                self.notification_id.load(Ordering::SeqCst),
                "weather-clear-night",
                &content.summary,
                &content.body,
                &actions,
                &hints,
                content.expire_timeout,
            )
            .context("Failed to post notification")
    }
}

impl NotificationPublisher for DesktopNotifier {
    fn refresh(&mut self, filter_is_on: bool, profile_name: &str) {
        self.filter_is_on.store(filter_is_on, Ordering::SeqCst);
        match self.post(filter_is_on, profile_name) {
            Ok(id) => self.notification_id.store(id, Ordering::SeqCst),
            Err(e) => log_warning!("{e:#}"),
        }
    }
}

impl Drop for DesktopNotifier {
    fn drop(&mut self) {
        let id = self.notification_id.load(Ordering::SeqCst);
        if id != 0 {
            let _ = self.proxy.close_notification(id);
        }
    }
}

/// Text and behaviour of the notification for one filter state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub summary: String,
    pub body: String,
    /// `(action key, label)` pairs.
    pub actions: Vec<(&'static str, String)>,
    pub resident: bool,
    pub expire_timeout: i32,
}

impl NotificationContent {
    pub fn new(filter_is_on: bool, profile_name: &str) -> Self {
        let (summary, toggle_label) = if filter_is_on {
            ("Screen filter is on", "Stop")
        } else {
            ("Screen filter is off", "Start")
        };
        Self {
            summary: summary.to_string(),
            body: format!("Profile: {profile_name}"),
            actions: vec![
                (ACTION_TOGGLE, toggle_label.to_string()),
                (ACTION_NEXT_PROFILE, "Next profile".to_string()),
            ],
            resident: filter_is_on,
            // Never expire while on; server default otherwise
            expire_timeout: if filter_is_on { 0 } else { -1 },
        }
    }
}

/// Message for a clicked notification action.
pub fn action_message(action_key: &str, filter_is_on: bool) -> Option<SignalMessage> {
    match action_key {
        ACTION_TOGGLE => Some(SignalMessage::Command(if filter_is_on {
            Command::Off
        } else {
            Command::On
        })),
        ACTION_NEXT_PROFILE => Some(SignalMessage::NextProfile),
        _ => None,
    }
}

/// Publisher used without a notification server; logs instead.
pub struct LogPublisher {
    debug_enabled: bool,
}

impl LogPublisher {
    pub fn new(debug_enabled: bool) -> Self {
        Self { debug_enabled }
    }
}

impl NotificationPublisher for LogPublisher {
    fn refresh(&mut self, filter_is_on: bool, profile_name: &str) {
        if self.debug_enabled {
            let content = NotificationContent::new(filter_is_on, profile_name);
            log_debug!("Notification: {} ({})", content.summary, content.body);
        }
    }
}
