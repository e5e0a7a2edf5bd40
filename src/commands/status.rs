//! `status`: print the daemon's current state, optionally following changes.

use anyhow::{Context, Result};

use crate::filter::FilterStatus;
use crate::ipc::{IpcClient, IpcEvent};

pub fn handle_status_command(follow: bool) -> Result<()> {
    let mut client = IpcClient::connect()?;

    let current = client
        .subscribe(follow)
        .context("Failed to receive current state from shadefilter")?;
    print_event(&current);

    if !follow {
        return Ok(());
    }

    println!("\nFollowing state changes (press Ctrl+C to stop)...");
    loop {
        match client.receive() {
            Ok(event) => print_event(&event),
            Err(e) if e.to_string().contains("Connection closed") => {
                eprintln!("shadefilter stopped. Exiting follow mode.");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

fn print_event(event: &IpcEvent) {
    if let Some(text) = describe_event(event) {
        println!("{text}");
    }
}

fn describe_event(event: &IpcEvent) -> Option<String> {
    match event {
        IpcEvent::StateChanged { status } => Some(describe_status(status)),
        IpcEvent::FilterToggled { filter_is_on } => Some(format!(
            "Filter turned {}",
            if *filter_is_on { "on" } else { "off" }
        )),
        IpcEvent::PermissionDenied => {
            Some("Permission to draw the overlay was denied".to_string())
        }
        IpcEvent::BrightnessDenied => Some("Brightness cannot be changed".to_string()),
        IpcEvent::Rejected { message } => Some(format!("Rejected: {message}")),
        IpcEvent::Ack => None,
    }
}

fn describe_status(status: &FilterStatus) -> String {
    let state = match (status.return_to, status.holds) {
        (Some(base), Some(holds)) => format!("{} (over {base}, {holds} hold(s))", status.state),
        (Some(base), None) => format!("{} (over {base})", status.state),
        _ => status.state.to_string(),
    };

    format!(
        "  State: {state}\n Filter: {}\nProfile: {}\n   Tint: {}K @ {}% intensity, {}% dim",
        if status.filter_is_on { "on" } else { "off" },
        status.profile,
        status.color,
        status.intensity,
        status.dim
    )
}
