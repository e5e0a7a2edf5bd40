//! Commands, reactive events and the filter states with their transition tables.

use serde::{Deserialize, Serialize};

/// Inbound intent. Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    On,
    Off,
    Toggle,
    ShowPreview,
    HidePreview,
    StartSuspend,
    StopSuspend,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::On,
        Command::Off,
        Command::Toggle,
        Command::ShowPreview,
        Command::HidePreview,
        Command::StartSuspend,
        Command::StopSuspend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::On => "on",
            Command::Off => "off",
            Command::Toggle => "toggle",
            Command::ShowPreview => "show_preview",
            Command::HidePreview => "hide_preview",
            Command::StartSuspend => "start_suspend",
            Command::StopSuspend => "stop_suspend",
        }
    }
}

/// A change that already happened elsewhere (store, screen, compositor).
///
/// Events only name what changed; handlers read the new value back from the
/// settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactiveEvent {
    ColorChanged,
    IntensityChanged,
    DimChanged,
    LowerBrightnessChanged,
    SecureSuspendChanged,
    ScreenTurnedOn,
    ScreenTurnedOff,
    OrientationChanged,
    ProfileChanged,
}

impl ReactiveEvent {
    pub const ALL: [ReactiveEvent; 9] = [
        ReactiveEvent::ColorChanged,
        ReactiveEvent::IntensityChanged,
        ReactiveEvent::DimChanged,
        ReactiveEvent::LowerBrightnessChanged,
        ReactiveEvent::SecureSuspendChanged,
        ReactiveEvent::ScreenTurnedOn,
        ReactiveEvent::ScreenTurnedOff,
        ReactiveEvent::OrientationChanged,
        ReactiveEvent::ProfileChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactiveEvent::ColorChanged => "color_changed",
            ReactiveEvent::IntensityChanged => "intensity_changed",
            ReactiveEvent::DimChanged => "dim_changed",
            ReactiveEvent::LowerBrightnessChanged => "lower_brightness_changed",
            ReactiveEvent::SecureSuspendChanged => "secure_suspend_changed",
            ReactiveEvent::ScreenTurnedOn => "screen_turned_on",
            ReactiveEvent::ScreenTurnedOff => "screen_turned_off",
            ReactiveEvent::OrientationChanged => "orientation_changed",
            ReactiveEvent::ProfileChanged => "profile_changed",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

/// Discriminant of [`State`], used as the result of a transition lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Init,
    On,
    Off,
    Preview,
    Suspend,
}

impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Init => "init",
            StateKind::On => "on",
            StateKind::Off => "off",
            StateKind::Preview => "preview",
            StateKind::Suspend => "suspend",
        }
    }

    /// The matching base state, or `None` for the wrapper kinds.
    pub fn as_base(self) -> Option<BaseState> {
        match self {
            StateKind::Init => Some(BaseState::Init),
            StateKind::On => Some(BaseState::On),
            StateKind::Off => Some(BaseState::Off),
            StateKind::Preview | StateKind::Suspend => None,
        }
    }
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state that can sit underneath Preview or Suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseState {
    Init,
    On,
    Off,
}

impl BaseState {
    pub fn filter_is_on(self) -> bool {
        matches!(self, BaseState::On)
    }

    pub fn kind(self) -> StateKind {
        match self {
            BaseState::Init => StateKind::Init,
            BaseState::On => StateKind::On,
            BaseState::Off => StateKind::Off,
        }
    }

    /// Transition table of the base states.
    pub fn next_state(self, command: Command) -> StateKind {
        match (self, command) {
            (_, Command::On) => StateKind::On,
            (_, Command::Off) => StateKind::Off,
            (_, Command::ShowPreview) => StateKind::Preview,
            (_, Command::StartSuspend) => StateKind::Suspend,
            (BaseState::On, Command::Toggle) => StateKind::Off,
            (BaseState::Off, Command::Toggle) => StateKind::On,
            (base, Command::Toggle | Command::HidePreview | Command::StopSuspend) => base.kind(),
        }
    }
}

/// The current state of the filter.
///
/// `Preview` and `Suspend` own the base state they were entered from, so a
/// wrapper can never wrap another wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    On,
    Off,
    Preview { return_to: BaseState, holds: u32 },
    Suspend { return_to: BaseState },
}

impl State {
    pub fn kind(&self) -> StateKind {
        match self {
            State::Init => StateKind::Init,
            State::On => StateKind::On,
            State::Off => StateKind::Off,
            State::Preview { .. } => StateKind::Preview,
            State::Suspend { .. } => StateKind::Suspend,
        }
    }

    /// The base state itself, or the one a wrapper returns to.
    pub fn base(&self) -> BaseState {
        match *self {
            State::Init => BaseState::Init,
            State::On => BaseState::On,
            State::Off => BaseState::Off,
            State::Preview { return_to, .. } | State::Suspend { return_to } => return_to,
        }
    }

    /// Wrappers report the filter state they will return to.
    pub fn filter_is_on(&self) -> bool {
        self.base().filter_is_on()
    }

    /// The state `command` leads to when the permission guard holds.
    ///
    /// Commands a wrapper defers resolve to the wrapper itself.
    pub fn next_state(&self, command: Command) -> StateKind {
        match *self {
            State::Init => BaseState::Init.next_state(command),
            State::On => BaseState::On.next_state(command),
            State::Off => BaseState::Off.next_state(command),
            State::Preview { return_to, holds } => match command {
                Command::HidePreview if holds <= 1 => return_to.kind(),
                _ => StateKind::Preview,
            },
            State::Suspend { return_to } => match command {
                Command::StopSuspend => return_to.kind(),
                _ => StateKind::Suspend,
            },
        }
    }
}

impl From<BaseState> for State {
    fn from(base: BaseState) -> Self {
        match base {
            BaseState::Init => State::Init,
            BaseState::On => State::On,
            BaseState::Off => State::Off,
        }
    }
}
