use proptest::prelude::*;
use shadefilter::filter::{BaseState, Command, State};
use shadefilter::logger::Log;
use shadefilter::testing::{Broadcast, Harness};

fn command_strategy() -> impl Strategy<Value = Command> {
    prop::sample::select(Command::ALL.to_vec())
}

/// Steps of `(command, guard allows)`; the guard mostly allows.
fn steps_strategy() -> impl Strategy<Value = Vec<(Command, bool)>> {
    prop::collection::vec((command_strategy(), prop::bool::weighted(0.8)), 0..40)
}

fn defer(base: BaseState, command: Command) -> BaseState {
    base.next_state(command).as_base().unwrap_or(base)
}

/// Reference model of one dispatch.
fn expected(before: State, command: Command, allowed: bool) -> State {
    match before {
        State::Preview { return_to, holds } => match command {
            Command::ShowPreview => State::Preview {
                return_to,
                holds: holds + 1,
            },
            Command::HidePreview if holds > 1 => State::Preview {
                return_to,
                holds: holds - 1,
            },
            Command::HidePreview if allowed => return_to.into(),
            Command::HidePreview => State::Preview {
                return_to,
                holds: 0,
            },
            other => State::Preview {
                return_to: defer(return_to, other),
                holds,
            },
        },
        State::Suspend { return_to } => match command {
            Command::StopSuspend if allowed => return_to.into(),
            Command::StopSuspend | Command::StartSuspend => before,
            other => State::Suspend {
                return_to: defer(return_to, other),
            },
        },
        state => {
            let base = state.base();
            let target = base.next_state(command);
            if target == state.kind() || !allowed {
                return state;
            }
            match target.as_base() {
                Some(next) => next.into(),
                None if command == Command::ShowPreview => State::Preview {
                    return_to: base,
                    holds: 1,
                },
                None => State::Suspend { return_to: base },
            }
        }
    }
}

proptest! {
    #[test]
    fn dispatch_follows_the_tables(steps in steps_strategy()) {
        Log::set_enabled(false);
        let mut harness = Harness::new();

        for (command, allowed) in steps {
            harness.guard.set_allowed(allowed);
            let before = harness.filter.state();
            let denied = harness.broadcaster.count(&Broadcast::PermissionDenied);

            harness.dispatch(command);

            let after = harness.filter.state();
            prop_assert_eq!(after, expected(before, command, allowed));

            let newly_denied = harness.broadcaster.count(&Broadcast::PermissionDenied) - denied;
            if newly_denied > 0 {
                prop_assert_eq!(newly_denied, 1);
                prop_assert_eq!(after.kind(), before.kind());
                prop_assert_eq!(after.base(), before.base());
            }
        }
    }

    #[test]
    fn wrappers_report_their_base(steps in steps_strategy()) {
        Log::set_enabled(false);
        let mut harness = Harness::new();

        for (command, allowed) in steps {
            harness.guard.set_allowed(allowed);
            harness.dispatch(command);

            let state = harness.filter.state();
            prop_assert_eq!(harness.filter.filter_is_on(), state.base() == BaseState::On);
            prop_assert_eq!(harness.filter.status().filter_is_on, harness.filter.filter_is_on());
        }
    }

    #[test]
    fn overlay_visible_only_when_drawn(steps in steps_strategy()) {
        Log::set_enabled(false);
        let mut harness = Harness::new();

        for (command, allowed) in steps {
            harness.guard.set_allowed(allowed);
            harness.dispatch(command);
            harness.complete_fades();

            let drawn = matches!(harness.filter.state(), State::On | State::Preview { .. });
            prop_assert_eq!(harness.overlay.is_open(), drawn);
        }
    }

    #[test]
    fn preview_round_trip(holds in 1u32..6) {
        Log::set_enabled(false);
        let mut harness = Harness::new();

        for _ in 0..holds {
            harness.dispatch(Command::ShowPreview);
        }
        prop_assert_eq!(
            harness.filter.state(),
            State::Preview { return_to: BaseState::Off, holds }
        );

        for _ in 0..holds {
            harness.dispatch(Command::HidePreview);
        }
        prop_assert_eq!(harness.filter.state(), State::Off);
    }
}
