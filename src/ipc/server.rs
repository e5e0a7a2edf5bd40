//! Unix socket server for the IPC protocol.
//!
//! Everything is non-blocking and polled from one loop: outbound messages from
//! the daemon, new connections, then request lines from connected clients.

use anyhow::{Context, Result};
use nix::unistd::getuid;
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use super::events::{IpcEvent, IpcRequest};
use super::{ClientId, ServerMessage};
use crate::constants::{IPC_SOCKET_NAME, SOCKET_BUFFER_SIZE};
use crate::signals::SignalMessage;

pub struct IpcSocketServer {
    socket_path: PathBuf,
    listener: UnixListener,
    clients: HashMap<ClientId, ClientConnection>,
    next_client_id: ClientId,
}

struct ClientConnection {
    stream: UnixStream,
    // Bytes received but not yet terminated by a newline
    pending: Vec<u8>,
    subscribed: bool,
    // Set once a one-shot client got its reply
    finished: bool,
    connected_at: Instant,
}

impl ClientConnection {
    fn send(&mut self, event: &IpcEvent) -> Result<()> {
        let json_line = serde_json::to_string(event).context("Failed to serialize IpcEvent")?;
        self.stream
            .write_all(format!("{json_line}\n").as_bytes())
            .context("Failed to write to IPC client")?;
        self.stream.flush().context("Failed to flush IPC client")
    }
}

impl IpcSocketServer {
    pub fn new(socket_path: PathBuf) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .with_context(|| format!("Failed to remove existing socket: {socket_path:?}"))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {parent:?}"))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {socket_path:?}"))?;
        listener
            .set_nonblocking(true)
            .context("Failed to set socket to non-blocking mode")?;

        Ok(Self {
            socket_path,
            listener,
            clients: HashMap::new(),
            next_client_id: 1,
        })
    }

    pub fn run(
        mut self,
        outbound: mpsc::Receiver<ServerMessage>,
        signal_sender: mpsc::Sender<SignalMessage>,
        running: Arc<AtomicBool>,
        debug_enabled: bool,
    ) -> Result<()> {
        if debug_enabled {
            log_debug!("IPC server listening on {:?}", self.socket_path);
        }

        while running.load(Ordering::SeqCst) {
            while let Ok(message) = outbound.try_recv() {
                self.deliver(message);
            }

            self.accept(debug_enabled);

            if !self.read_requests(&signal_sender) {
                // Daemon loop is gone
                break;
            }

            self.prune_clients(debug_enabled);

            thread::sleep(Duration::from_millis(10));
        }

        if debug_enabled {
            log_debug!("IPC server shutting down");
        }
        self.cleanup()
    }

    fn deliver(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Broadcast(event) => {
                for client in self.clients.values_mut().filter(|c| c.subscribed) {
                    if client.send(&event).is_err() {
                        client.finished = true;
                    }
                }
            }
            ServerMessage::Reply { client, event } => {
                if let Some(connection) = self.clients.get_mut(&client) {
                    let failed = connection.send(&event).is_err();
                    if failed || !connection.subscribed {
                        connection.finished = true;
                    }
                }
            }
        }
    }

    fn accept(&mut self, debug_enabled: bool) {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        if debug_enabled {
                            log_debug!("Dropping IPC client: {e}");
                        }
                        continue;
                    }

                    let client_id = self.next_client_id;
                    self.next_client_id = self.next_client_id.wrapping_add(1);
                    self.clients.insert(
                        client_id,
                        ClientConnection {
                            stream,
                            pending: Vec::new(),
                            subscribed: false,
                            finished: false,
                            connected_at: Instant::now(),
                        },
                    );
                    if debug_enabled {
                        log_debug!("IPC connections: {}", self.clients.len());
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    if debug_enabled {
                        log_debug!("Error accepting client connection: {e}");
                    }
                    break;
                }
            }
        }
    }

    /// Forward complete request lines. Returns false once the daemon hung up.
    fn read_requests(&mut self, signal_sender: &mpsc::Sender<SignalMessage>) -> bool {
        for (client_id, client) in &mut self.clients {
            if client.finished {
                continue;
            }

            let mut buffer = [0u8; SOCKET_BUFFER_SIZE];
            loop {
                match client.stream.read(&mut buffer) {
                    Ok(0) => {
                        client.finished = true;
                        break;
                    }
                    Ok(n) => client.pending.extend_from_slice(&buffer[..n]),
                    Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(_) => {
                        client.finished = true;
                        break;
                    }
                }
            }

            while let Some(end) = client.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = client.pending.drain(..=end).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_str::<IpcRequest>(line) {
                    Ok(request) => {
                        if request == IpcRequest::Subscribe {
                            client.subscribed = true;
                        }
                        let message = SignalMessage::Request {
                            client: *client_id,
                            request,
                        };
                        if signal_sender.send(message).is_err() {
                            return false;
                        }
                    }
                    Err(e) => {
                        let _ = client.send(&IpcEvent::rejected(format!("Invalid request: {e}")));
                        if !client.subscribed {
                            client.finished = true;
                        }
                    }
                }
            }
        }
        true
    }

    fn prune_clients(&mut self, debug_enabled: bool) {
        let finished: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.finished)
            .map(|(id, _)| *id)
            .collect();

        for client_id in finished {
            if let Some(client) = self.clients.remove(&client_id)
                && debug_enabled
            {
                let duration = client.connected_at.elapsed();
                if client.subscribed {
                    log_debug!(
                        "IPC subscriber disconnected after {}s - connections: {}",
                        duration.as_secs(),
                        self.clients.len()
                    );
                } else {
                    log_debug!(
                        "IPC one-shot client served ({}ms) - connections: {}",
                        duration.as_millis(),
                        self.clients.len()
                    );
                }
            }
        }
    }

    fn cleanup(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| format!("Failed to remove socket file: {:?}", self.socket_path))?;
        }
        Ok(())
    }
}

/// Socket path of the daemon.
///
/// - Primary: `$XDG_RUNTIME_DIR/shadefilter.sock`
/// - Fallback: `/run/user/{uid}/shadefilter.sock`
pub fn socket_path() -> PathBuf {
    let runtime_dir = match std::env::var("XDG_RUNTIME_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => PathBuf::from(format!("/run/user/{}", getuid())),
    };
    runtime_dir.join(IPC_SOCKET_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Command;
    use crate::ipc::IpcClient;

    #[test]
    fn test_socket_path() {
        assert!(socket_path().ends_with(IPC_SOCKET_NAME));
    }

    #[test]
    fn test_server_creation_and_cleanup() {
        let temp_dir = tempfile::tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server = IpcSocketServer::new(socket_path.clone()).unwrap();
        assert!(socket_path.exists());

        server.cleanup().unwrap();
        assert!(!socket_path.exists());
    }

    #[test]
    fn test_request_reply_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server = IpcSocketServer::new(socket_path.clone()).unwrap();
        let (out_tx, out_rx) = mpsc::channel();
        let (sig_tx, sig_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let server_running = Arc::clone(&running);
        let handle =
            thread::spawn(move || server.run(out_rx, sig_tx, server_running, false).unwrap());

        let client = thread::spawn({
            let socket_path = socket_path.clone();
            move || {
                let mut client = IpcClient::connect_to(&socket_path).unwrap();
                client
                    .request(&IpcRequest::Command {
                        command: Command::Toggle,
                    })
                    .unwrap()
            }
        });

        let message = sig_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let SignalMessage::Request { client: id, request } = message else {
            panic!("expected a request");
        };
        assert_eq!(
            request,
            IpcRequest::Command {
                command: Command::Toggle
            }
        );
        out_tx
            .send(ServerMessage::Reply {
                client: id,
                event: IpcEvent::Ack,
            })
            .unwrap();

        assert_eq!(client.join().unwrap(), IpcEvent::Ack);

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();
        assert!(!socket_path.exists());
    }

    #[test]
    fn test_invalid_request_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server = IpcSocketServer::new(socket_path.clone()).unwrap();
        let (_out_tx, out_rx) = mpsc::channel();
        let (sig_tx, _sig_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let server_running = Arc::clone(&running);
        let handle =
            thread::spawn(move || server.run(out_rx, sig_tx, server_running, false).unwrap());

        let mut stream = UnixStream::connect(&socket_path).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream.write_all(b"{\"request\":\"explode\"}\n").unwrap();

        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        let event: IpcEvent = serde_json::from_str(reply.trim()).unwrap();
        assert!(matches!(event, IpcEvent::Rejected { .. }));

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();
    }
}
