//! # shadefilter
//!
//! Library behind the `shadefilter` binary. It keeps the CLI dispatch in
//! `main.rs` apart from the daemon so the state machine and its collaborators
//! can be tested directly.
//!
//! ## Architecture
//!
//! - **State machine**: `filter` owns the current state and every transition
//! - **Daemon**: `daemon` wires collaborators together and runs the message loop
//! - **Collaborators**: `overlay`, `brightness`, `monitor`, `publish` and `store`
//!   are driven by the filter through traits
//! - **Configuration**: `config` for TOML settings with hot reload
//! - **Commands**: `commands` and `ipc` for the client subcommands and the socket
//! - **Infrastructure**: signal handling, the instance lock and logging

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod brightness;
pub mod commands;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod filter;
pub mod ipc;
pub mod lock;
pub mod monitor;
pub mod overlay;
pub mod publish;
pub mod signals;
pub mod store;

#[cfg(any(test, feature = "testing-support"))]
pub mod testing;

pub use daemon::Daemon;
pub use filter::ScreenFilter;
