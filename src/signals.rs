//! The daemon's single inbound channel and the Unix signal thread feeding it.
//!
//! Every producer (signal thread, config watcher, IPC server, screen watcher,
//! foreground sampler, notification actions, fade callbacks) sends a
//! [`SignalMessage`]; only the daemon loop receives them.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2},
    iterator::Signals,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use crate::filter::{Command, ReactiveEvent};
use crate::ipc::{ClientId, IpcRequest};
use crate::overlay::AnimationOutcome;

/// Unified message type for everything the daemon loop reacts to.
#[derive(Debug)]
pub enum SignalMessage {
    /// Filter command from the CLI, a notification action or the sampler
    Command(Command),
    /// Something changed outside the filter
    Event(ReactiveEvent),
    /// A fade started by an entry action ended
    FadeFinished {
        generation: u64,
        outcome: AnimationOutcome,
    },
    /// IPC request awaiting a reply to `client`
    Request {
        client: ClientId,
        request: IpcRequest,
    },
    /// Advance to the next configured profile
    NextProfile,
    /// Configuration reload (SIGUSR2 or file change)
    Reload,
    /// Shutdown (SIGTERM, SIGINT, SIGHUP)
    Shutdown,
}

/// Channel ends shared between the daemon loop and its producers.
pub struct SignalState {
    /// Cleared once a shutdown was requested
    pub running: Arc<AtomicBool>,
    pub signal_receiver: Receiver<SignalMessage>,
    pub signal_sender: Sender<SignalMessage>,
}

impl SignalState {
    /// Channel without a signal thread, for tests and embedding.
    pub fn detached() -> Self {
        let (signal_sender, signal_receiver) = mpsc::channel();
        Self {
            running: Arc::new(AtomicBool::new(true)),
            signal_receiver,
            signal_sender,
        }
    }
}

/// Message produced for a Unix signal.
pub fn message_for_signal(signal: i32) -> Option<SignalMessage> {
    match signal {
        SIGUSR2 => Some(SignalMessage::Reload),
        SIGINT | SIGTERM | SIGHUP => Some(SignalMessage::Shutdown),
        _ => None,
    }
}

/// Install the signal thread and return the channel it feeds.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let state = SignalState::detached();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running = Arc::clone(&state.running);
    let sender = state.signal_sender.clone();

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                let Some(message) = message_for_signal(sig) else {
                    continue;
                };

                match message {
                    SignalMessage::Reload => {
                        log_pipe!();
                        log_info!("Received configuration reload signal");
                    }
                    _ => {
                        if debug_enabled {
                            log_pipe!();
                            log_debug!("Received signal {sig}, shutting down");
                        }
                        running.store(false, Ordering::SeqCst);
                    }
                }

                if sender.send(message).is_err() {
                    // Daemon loop is gone
                    break;
                }
            }
        })
        .context("failed to spawn signal handler thread")?;

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_mapping() {
        assert!(matches!(
            message_for_signal(SIGUSR2),
            Some(SignalMessage::Reload)
        ));
        for sig in [SIGINT, SIGTERM, SIGHUP] {
            assert!(matches!(
                message_for_signal(sig),
                Some(SignalMessage::Shutdown)
            ));
        }
        assert!(message_for_signal(signal_hook::consts::signal::SIGUSR1).is_none());
    }

    #[test]
    fn test_detached_channel_delivers() {
        let state = SignalState::detached();
        state
            .signal_sender
            .send(SignalMessage::Command(Command::Toggle))
            .unwrap();
        assert!(matches!(
            state.signal_receiver.recv().unwrap(),
            SignalMessage::Command(Command::Toggle)
        ));
        assert!(state.running.load(Ordering::SeqCst));
    }
}
