//! Entry point: parse the command line and hand off to the daemon or to a
//! client subcommand.
//!
//! - `shadefilter [run]` starts the daemon through [`Daemon`]
//! - `status`, `on`, `off`, `preview`, `suspend`, `set`, ... talk to a running
//!   daemon over the IPC socket
//!
//! Errors are reported through the logger and turn into a non-zero exit code.

use anyhow::Result;

use shadefilter::args::{self, CliAction, ParsedArgs};
use shadefilter::commands;
use shadefilter::config;
use shadefilter::constants::EXIT_FAILURE;
use shadefilter::logger::Log;
use shadefilter::{Daemon, log_error_exit};

fn main() -> Result<()> {
    let parsed_args = ParsedArgs::from_env();

    match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Run {
            debug_enabled,
            dry_run,
            restore,
            log_file,
            config_dir,
        } => run_daemon(debug_enabled, dry_run, restore, log_file, config_dir),
        CliAction::Request(request) => {
            exit_on_error(commands::request::handle_request_command(request));
            Ok(())
        }
        CliAction::Status { follow } => {
            exit_on_error(commands::status::handle_status_command(follow));
            Ok(())
        }
    }
}

fn run_daemon(
    debug_enabled: bool,
    dry_run: bool,
    restore: bool,
    log_file: Option<String>,
    config_dir: Option<String>,
) -> Result<()> {
    config::set_config_dir(config_dir)?;

    // Keep the writer alive until the daemon returns
    let log_guard = match log_file {
        Some(path) => Some(Log::start_file_logging(path)?),
        None => None,
    };

    let result = Daemon::new(debug_enabled)
        .dry_run(dry_run)
        .restore(restore)
        .run();

    if let Err(e) = result {
        log_error_exit!("{e:#}");
        drop(log_guard);
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}

fn exit_on_error(result: Result<()>) {
    if let Err(e) = result {
        log_error_exit!("{e:#}");
        std::process::exit(EXIT_FAILURE);
    }
}
