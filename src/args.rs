//! Command-line argument parsing.
//!
//! Without a subcommand (or with `run`) the daemon starts. Every other
//! subcommand talks to a running daemon over the IPC socket.

use crate::filter::{Command, ReactiveEvent};
use crate::ipc::IpcRequest;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon
    Run {
        debug_enabled: bool,
        /// Log overlay output instead of driving hyprsunset
        dry_run: bool,
        /// Turn the filter back on if it was on at last shutdown
        restore: bool,
        log_file: Option<String>,
        config_dir: Option<String>,
    },
    /// Send one request to the running daemon
    Request(IpcRequest),
    /// Print the current state, optionally following changes
    Status { follow: bool },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to invalid arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse `args`, whose first item is the program name.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        ParsedArgs {
            action: Self::action(&args_vec),
        }
    }

    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }

    fn action(args: &[String]) -> CliAction {
        if args
            .iter()
            .any(|arg| arg == "--version" || arg == "-V" || arg == "-v")
        {
            return CliAction::ShowVersion;
        }
        if args.iter().any(|arg| arg == "--help" || arg == "-h") {
            return CliAction::ShowHelp;
        }

        let mut debug_enabled = false;
        let mut dry_run = false;
        let mut restore = false;
        let mut follow = false;
        let mut log_file = None;
        let mut config_dir = None;
        let mut positional: Vec<&str> = Vec::new();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--debug" | "-d" => debug_enabled = true,
                "--dry-run" | "-n" => dry_run = true,
                "--restore" | "-r" => restore = true,
                "--follow" | "-f" => follow = true,
                "--log" | "-l" => match iter.next() {
                    Some(path) => log_file = Some(path.clone()),
                    None => {
                        log_warning!("Missing path for --log");
                        return CliAction::ShowHelpDueToError;
                    }
                },
                "--config" | "-c" => match iter.next() {
                    Some(dir) => config_dir = Some(dir.clone()),
                    None => {
                        log_warning!("Missing directory for --config");
                        return CliAction::ShowHelpDueToError;
                    }
                },
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    log_warning!("Unknown option: {flag}");
                    return CliAction::ShowHelpDueToError;
                }
                value => positional.push(value),
            }
        }

        let command = |command| Some(CliAction::Request(IpcRequest::Command { command }));

        let action = match positional.as_slice() {
            [] | ["run"] => Some(CliAction::Run {
                debug_enabled,
                dry_run,
                restore,
                log_file,
                config_dir,
            }),
            ["on"] => command(Command::On),
            ["off"] => command(Command::Off),
            ["toggle"] => command(Command::Toggle),
            ["preview", "show"] => command(Command::ShowPreview),
            ["preview", "hide"] => command(Command::HidePreview),
            ["suspend", "start"] => command(Command::StartSuspend),
            ["suspend", "stop"] => command(Command::StopSuspend),
            ["next-profile"] => Some(CliAction::Request(IpcRequest::NextProfile)),
            ["set", field, value] => Some(CliAction::Request(IpcRequest::Set {
                field: field.to_string(),
                value: value.to_string(),
            })),
            ["notify", event] => match ReactiveEvent::parse(event) {
                Some(event) => Some(CliAction::Request(IpcRequest::Notify { event })),
                None => {
                    log_warning!("Unknown event: {event}");
                    None
                }
            },
            ["status"] => Some(CliAction::Status { follow }),
            ["help"] => Some(CliAction::ShowHelp),
            other => {
                log_warning!("Invalid command: {}", other.join(" "));
                None
            }
        };

        action.unwrap_or(CliAction::ShowHelpDueToError)
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("shadefilter [COMMAND] [OPTIONS]");
    log_block_start!("Daemon options (run):");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-n, --dry-run          Log overlay frames instead of drawing them");
    log_indented!("-r, --restore          Turn the filter on if it was on at last exit");
    log_indented!("-l, --log <path>       Also write the log to a file");
    log_block_start!("Commands:");
    log_indented!("run                    Start the daemon (default)");
    log_indented!("on, off, toggle        Switch the filter");
    log_indented!("preview show|hide      Hold or release a live preview");
    log_indented!("suspend start|stop     Temporarily hide the filter");
    log_indented!("next-profile           Switch to the next profile");
    log_indented!("set <field> <value>    color, intensity, dim, lower_brightness, secure_suspend");
    log_indented!("notify <event>         Report an event, e.g. orientation_changed");
    log_indented!("status [-f, --follow]  Show the current state");
    log_block_start!("Other:");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_end!();
}
