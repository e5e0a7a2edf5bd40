//! Application-wide constants: defaults, validation ranges and file names.

// # Filter defaults

/// Colour temperature of the tint in Kelvin.
pub const DEFAULT_COLOR: u32 = 3400;
/// Strength of the tint, in percent.
pub const DEFAULT_INTENSITY: u32 = 50;
/// Dimming, in percent.
pub const DEFAULT_DIM: u32 = 30;
pub const DEFAULT_LOWER_BRIGHTNESS: bool = false;
pub const DEFAULT_SECURE_SUSPEND: bool = false;
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_FADE_DURATION_MS: u64 = 1000;

// # Validation ranges

pub const MINIMUM_COLOR: u32 = 1000;
pub const MAXIMUM_COLOR: u32 = 6500;
pub const MINIMUM_LEVEL: u32 = 0;
pub const MAXIMUM_LEVEL: u32 = 100;
pub const MINIMUM_MONITOR_INTERVAL_MS: u64 = 100;
pub const MAXIMUM_MONITOR_INTERVAL_MS: u64 = 60_000;
pub const MAXIMUM_FADE_DURATION_MS: u64 = 10_000;

// # Overlay

/// Levels the overlay fades to before it is closed.
pub const MIN_DIM: u32 = 0;
pub const MIN_INTENSITY: u32 = 0;
/// Colour temperature that leaves the screen untinted.
pub const NEUTRAL_COLOR: u32 = 6500;
/// Lowest gamma the hyprsunset sink will request at full dim.
pub const MINIMUM_SINK_GAMMA: u32 = 20;
/// Interval between two fade steps.
pub const FADE_STEP_MS: u64 = 16;

// # Brightness

/// Brightness forced while lowering is active.
pub const LOWERED_BRIGHTNESS: i32 = 0;
/// Saved brightness meaning "nothing to restore".
pub const NO_SAVED_BRIGHTNESS: i32 = -1;

// # Sockets and files

pub const CONFIG_FILE_NAME: &str = "shadefilter.toml";
pub const STATE_FILE_NAME: &str = "state.json";
pub const IPC_SOCKET_NAME: &str = "shadefilter.sock";
pub const LOCK_FILE_NAME: &str = "shadefilter.lock";
pub const SOCKET_TIMEOUT_MS: u64 = 1000;
pub const SOCKET_BUFFER_SIZE: usize = 4096;

/// Name shown in the notification when no profiles are configured.
pub const CUSTOM_PROFILE_NAME: &str = "Custom";

// # Exit codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
