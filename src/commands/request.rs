//! One-shot requests: `on`, `off`, `toggle`, `preview`, `suspend`, `set`,
//! `notify` and `next-profile`.

use anyhow::{Context, Result};

use crate::ipc::{IpcClient, IpcEvent, IpcRequest};

/// Send `request` to the daemon and fail when it is rejected.
pub fn handle_request_command(request: IpcRequest) -> Result<()> {
    let mut client = IpcClient::connect()?;
    let reply = client
        .request(&request)
        .context("No reply from shadefilter")?;
    check_reply(reply)
}

fn check_reply(reply: IpcEvent) -> Result<()> {
    match reply {
        IpcEvent::Ack => Ok(()),
        IpcEvent::Rejected { message } => anyhow::bail!("Request rejected: {message}"),
        other => anyhow::bail!("Unexpected reply from shadefilter: {other:?}"),
    }
}
