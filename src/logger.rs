//! Structured logging with box-drawing output.
//!
//! Every line the daemon prints goes through the macros defined here so that
//! output keeps a single visual structure:
//!
//! ```text
//! ┏ shadefilter v0.3.0 ━━╸
//! ┃
//! ┣ Loaded configuration
//! ┃   Sink: hyprsunset
//! ┣[INFO] Filter turned on
//! ╹
//! ```
//!
//! ## Conventions
//!
//! - **`log_block_start!`** opens a new conceptual block (state transitions,
//!   startup phases). It prints a spacing pipe first, then `┣ message`.
//! - **`log_decorated!`** continues a block with `┣ message`.
//! - **`log_indented!`** prints details belonging to the previous line as
//!   `┃   message`.
//! - **`log_pipe!`** inserts an empty `┃` line. Use it before a level macro that
//!   starts a new block, never right before `log_block_start!` or `log_end!`.
//! - **`log_version!`** / **`log_end!`** frame the whole run.
//! - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`,
//!   `log_critical!`** carry a coloured `[LEVEL]` tag.
//!
//! Logging can be muted at runtime (tests do this) and redirected to a file
//! with [`Log::start_file_logging`], in which case ANSI colours are stripped.

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

// Present only while `--log <path>` is active
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Line shapes understood by [`emit`].
#[doc(hidden)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lead {
    Decorated,
    Indented,
    BlockStart,
    Info,
    Debug,
    Warning,
    Error,
    ErrorExit,
    Critical,
}

/// Runtime switches for the logger.
pub struct Log;

impl Log {
    /// Enable or disable all log output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Route all further output to `file_path` through a writer thread.
    ///
    /// The returned guard flushes and joins the writer when dropped.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                let mut file = std::fs::File::create(&file_path)?;
                loop {
                    match rx.recv() {
                        Ok(LogMessage::Formatted(text)) => file.write_all(text.as_bytes())?,
                        Ok(LogMessage::Shutdown) | Err(_) => {
                            file.flush()?;
                            break;
                        }
                    }
                }
                Ok::<(), anyhow::Error>(())
            })?;

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }
}

/// Keeps the file writer alive; flushes on drop.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Write an already formatted chunk to stdout or the log file.
pub fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

fn format_line(lead: Lead, message: &str) -> String {
    match lead {
        Lead::Decorated => format!("┣ {message}\n"),
        Lead::Indented => format!("┃   {message}\n"),
        Lead::BlockStart => format!("┃\n┣ {message}\n"),
        Lead::Info => format!("┣[\x1b[32mINFO\x1b[0m] {message}\n"),
        Lead::Debug => format!("┣[\x1b[36mDEBUG\x1b[0m] {message}\n"),
        Lead::Warning => format!("┣[\x1b[33mWARNING\x1b[0m] {message}\n"),
        Lead::Error => format!("┣[\x1b[31mERROR\x1b[0m] {message}\n"),
        Lead::ErrorExit => format!("┃\n┗[\x1b[31mERROR\x1b[0m] {message}\n"),
        Lead::Critical => format!("┣[\x1b[31mCRITICAL\x1b[0m] {message}\n"),
    }
}

#[doc(hidden)]
pub fn emit(lead: Lead, message: &str) {
    if Log::is_enabled() {
        write_output(&format_line(lead, message));
    }
}

// # Logging Macros

#[doc(hidden)]
#[macro_export]
macro_rules! __log_emit {
    ($lead:ident, $fmt:literal $($arg:tt)*) => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::emit($crate::logger::Lead::$lead, &format!($fmt $($arg)*));
        }
    }};
    ($lead:ident, $expr:expr) => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::emit($crate::logger::Lead::$lead, &format!("{}", $expr));
        }
    }};
}

/// Continue the current block: `┣ message`.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => { $crate::__log_emit!(Decorated, $($arg)+) };
}

/// Detail line under the previous message: `┃   message`.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => { $crate::__log_emit!(Indented, $($arg)+) };
}

/// Start a new block with a spacing pipe.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => { $crate::__log_emit!(BlockStart, $($arg)+) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::__log_emit!(Info, $($arg)+) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::__log_emit!(Debug, $($arg)+) };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => { $crate::__log_emit!(Warning, $($arg)+) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__log_emit!(Error, $($arg)+) };
}

/// Error that terminates the flow, drawn with a closing corner.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => { $crate::__log_emit!(ErrorExit, $($arg)+) };
}

#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => { $crate::__log_emit!(Critical, $($arg)+) };
}

/// Empty `┃` line for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::write_output("┃\n");
        }
    }};
}

/// Startup header.
#[macro_export]
macro_rules! log_version {
    () => {{
        if $crate::logger::Log::is_enabled() {
            let version = env!("CARGO_PKG_VERSION");
            $crate::logger::write_output(&format!("┏ shadefilter v{version} ━━╸\n"));
        }
    }};
}

/// Final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::write_output("╹\n");
        }
    }};
}
