//! IPC over a Unix socket.
//!
//! The server thread accepts clients, turns request lines into
//! [`SignalMessage::Request`]s for the daemon loop and writes back whatever the
//! daemon sends through an [`IpcNotifier`]: replies to one client and
//! broadcasts to every subscriber.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;

use crate::filter::FilterStatus;
use crate::publish::Broadcaster;
use crate::signals::SignalMessage;

pub mod client;
pub mod events;
mod server;

pub use client::IpcClient;
pub use events::{IpcEvent, IpcRequest};
pub use server::socket_path;

/// Server-assigned id of a connection.
pub type ClientId = u32;

/// What the daemon hands to the server thread.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Sent to every subscribed client
    Broadcast(IpcEvent),
    /// Sent to one client; a client that did not subscribe is closed afterwards
    Reply { client: ClientId, event: IpcEvent },
}

/// Daemon side of the server channel.
#[derive(Clone)]
pub struct IpcNotifier {
    sender: mpsc::Sender<ServerMessage>,
}

impl IpcNotifier {
    /// Create the notifier and the receiver for [`IpcServer::start`].
    pub fn new() -> (Self, mpsc::Receiver<ServerMessage>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }

    pub fn reply(&self, client: ClientId, event: IpcEvent) {
        let _ = self.sender.send(ServerMessage::Reply { client, event });
    }

    pub fn broadcast(&self, event: IpcEvent) {
        let _ = self.sender.send(ServerMessage::Broadcast(event));
    }
}

impl Broadcaster for IpcNotifier {
    fn filter_toggled(&self, filter_is_on: bool) {
        self.broadcast(IpcEvent::FilterToggled { filter_is_on });
    }

    fn permission_denied(&self) {
        self.broadcast(IpcEvent::PermissionDenied);
    }

    fn brightness_denied(&self) {
        self.broadcast(IpcEvent::BrightnessDenied);
    }

    fn state_changed(&self, status: &FilterStatus) {
        self.broadcast(IpcEvent::state_changed(status.clone()));
    }
}

/// Handle of the server thread.
pub struct IpcServer {
    thread_handle: Option<JoinHandle<()>>,
}

impl IpcServer {
    /// Bind the socket and serve it on a background thread until `running`
    /// is cleared.
    pub fn start(
        socket_path: PathBuf,
        outbound: mpsc::Receiver<ServerMessage>,
        signal_sender: mpsc::Sender<SignalMessage>,
        running: Arc<AtomicBool>,
        debug_enabled: bool,
    ) -> Result<Self> {
        // Bind before spawning so callers see bind errors
        let socket_server = server::IpcSocketServer::new(socket_path)
            .context("Failed to create IPC socket server")?;

        let thread_handle = std::thread::Builder::new()
            .name("ipc-server".to_string())
            .spawn(move || {
                if let Err(e) = socket_server.run(outbound, signal_sender, running, debug_enabled) {
                    log_warning!("IPC server stopped: {e:#}");
                }
            })
            .context("Failed to spawn IPC server thread")?;

        Ok(Self {
            thread_handle: Some(thread_handle),
        })
    }

    /// Wait for the server thread; the running flag must already be cleared.
    pub fn shutdown(mut self) -> Result<()> {
        if let Some(handle) = self.thread_handle.take() {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("IPC server thread panicked"))?;
        }
        Ok(())
    }
}
