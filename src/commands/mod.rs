//! Client-side subcommands.
//!
//! Each subcommand connects to the running daemon over the IPC socket, sends
//! one request and prints the outcome.

pub mod request;
pub mod status;
