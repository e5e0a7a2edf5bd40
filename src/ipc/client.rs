//! Client side of the IPC socket, used by the CLI subcommands.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use super::events::{IpcEvent, IpcRequest};
use super::server::socket_path;

pub struct IpcClient {
    stream: UnixStream,
    reader: BufReader<UnixStream>,
}

impl IpcClient {
    /// Connect to the running daemon.
    pub fn connect() -> Result<Self> {
        let socket_path = socket_path();
        Self::connect_to(&socket_path).with_context(|| {
            format!("Failed to connect to shadefilter at {socket_path:?}. Is it running?")
        })
    }

    pub fn connect_to(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .with_context(|| format!("Failed to connect to {socket_path:?}"))?;

        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .context("Failed to set read timeout on IPC socket")?;

        let reader_stream = stream
            .try_clone()
            .context("Failed to clone stream for reader")?;

        Ok(Self {
            stream,
            reader: BufReader::new(reader_stream),
        })
    }

    /// Send one request and wait for its reply.
    pub fn request(&mut self, request: &IpcRequest) -> Result<IpcEvent> {
        self.send(request)?;
        self.receive()
    }

    /// Subscribe and return the current state; follow with [`IpcClient::receive`].
    ///
    /// With `follow` the read timeout is lifted so the connection can idle.
    pub fn subscribe(&mut self, follow: bool) -> Result<IpcEvent> {
        self.send(&IpcRequest::Subscribe)?;
        let current = self.receive()?;
        if follow {
            self.stream
                .set_read_timeout(None)
                .context("Failed to clear read timeout on IPC socket")?;
        }
        Ok(current)
    }

    /// Next event from the daemon.
    pub fn receive(&mut self) -> Result<IpcEvent> {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .context("Failed to read from IPC socket")?;

        if line.trim().is_empty() {
            anyhow::bail!("Connection closed by shadefilter");
        }

        serde_json::from_str(line.trim())
            .with_context(|| format!("Failed to parse IpcEvent JSON: {}", line.trim()))
    }

    fn send(&mut self, request: &IpcRequest) -> Result<()> {
        let json_line = serde_json::to_string(request).context("Failed to serialize request")?;
        self.stream
            .write_all(format!("{json_line}\n").as_bytes())
            .context("Failed to send request to shadefilter")
    }

    /// Whether a daemon answers on the socket.
    pub fn is_running() -> bool {
        let socket_path = socket_path();
        socket_path.exists() && UnixStream::connect(&socket_path).is_ok()
    }
}
