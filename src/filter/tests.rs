use super::*;
use crate::brightness::BrightnessReading;
use crate::store::Settings;
use crate::testing::{Broadcast, FakeBrightness, Harness, MonitorCall, OverlayCall};

fn lowering() -> Settings {
    Settings {
        lower_brightness: true,
        ..Settings::default()
    }
}

#[test]
fn test_construction_settles_in_off() {
    let mut harness = Harness::new();

    assert_eq!(harness.filter.state(), State::Off);
    assert_eq!(
        harness.overlay.calls(),
        vec![
            OverlayCall::AnimateIntensity {
                level: MIN_INTENSITY,
                with_callback: false
            },
            OverlayCall::AnimateDim {
                level: MIN_DIM,
                with_callback: true
            },
        ]
    );
    assert_eq!(harness.publisher.last(), Some((false, "Custom".to_string())));
    assert!(harness.monitor.calls().contains(&MonitorCall::Stop));
    // Stored flag was already false
    assert!(harness.broadcaster.toggles().is_empty());

    assert_eq!(harness.complete_fades(), 1);
    assert_eq!(harness.overlay.count(&OverlayCall::Close), 1);
}

#[test]
fn test_on_opens_and_fades_in() {
    let mut harness = Harness::new();
    harness.complete_fades();
    harness.clear();

    harness.dispatch(Command::On);

    assert_eq!(harness.filter.state(), State::On);
    assert_eq!(
        harness.overlay.calls(),
        vec![
            OverlayCall::SetColor(DEFAULT_COLOR),
            OverlayCall::Open,
            OverlayCall::AnimateDim {
                level: DEFAULT_DIM,
                with_callback: false
            },
            OverlayCall::AnimateIntensity {
                level: DEFAULT_INTENSITY,
                with_callback: false
            },
        ]
    );
    assert!(harness.settings().filter_is_on);
    assert_eq!(harness.broadcaster.toggles(), vec![true]);
    assert_eq!(harness.publisher.last(), Some((true, "Custom".to_string())));
    assert_eq!(
        harness.broadcaster.last_status().map(|s| s.state),
        Some(StateKind::On)
    );
}

#[test]
fn test_redundant_on_does_nothing() {
    let mut harness = Harness::new();
    harness.dispatch(Command::On);
    harness.clear();

    harness.dispatch(Command::On);
    harness.dispatch(Command::HidePreview);
    harness.dispatch(Command::StopSuspend);

    assert_eq!(harness.filter.state(), State::On);
    assert!(harness.overlay.calls().is_empty());
    assert!(harness.publisher.refreshes().is_empty());
}

#[test]
fn test_toggle_flips_between_on_and_off() {
    let mut harness = Harness::new();

    harness.dispatch(Command::Toggle);
    assert_eq!(harness.filter.state(), State::On);
    harness.dispatch(Command::Toggle);
    assert_eq!(harness.filter.state(), State::Off);
    assert_eq!(harness.broadcaster.toggles(), vec![true, false]);
}

#[test]
fn test_off_closes_overlay_once_after_fade() {
    let mut harness = Harness::new();
    harness.complete_fades();
    harness.dispatch(Command::On);
    harness.clear();

    harness.dispatch(Command::Off);
    assert!(harness.overlay.is_open());
    assert_eq!(harness.overlay.count(&OverlayCall::Close), 0);

    assert_eq!(harness.complete_fades(), 1);
    assert_eq!(harness.overlay.count(&OverlayCall::Close), 1);
    assert!(!harness.overlay.is_open());

    assert_eq!(harness.complete_fades(), 0);
    assert_eq!(harness.overlay.count(&OverlayCall::Close), 1);
}

#[test]
fn test_cancelled_fade_still_closes() {
    let mut harness = Harness::new();
    harness.dispatch(Command::On);
    harness.dispatch(Command::Off);
    harness.clear();

    harness
        .overlay
        .finish_fades(crate::overlay::AnimationOutcome::Cancelled);
    assert_eq!(harness.drain_fades(), 1);
    assert_eq!(harness.overlay.count(&OverlayCall::Close), 1);
}

#[test]
fn test_superseded_fade_does_not_close() {
    let mut harness = Harness::new();
    harness.dispatch(Command::On);
    harness.dispatch(Command::Off);
    harness.clear();

    // The new fade-in cancels the fade-out, whose callback reports late
    harness.dispatch(Command::On);

    assert_eq!(harness.filter.state(), State::On);
    assert_eq!(harness.overlay.count(&OverlayCall::Close), 0);
    assert!(harness.overlay.is_open());
}

#[test]
fn test_preview_round_trip_from_off() {
    let mut harness = Harness::new();
    harness.complete_fades();
    harness.clear();

    harness.dispatch(Command::ShowPreview);
    assert_eq!(
        harness.filter.state(),
        State::Preview {
            return_to: BaseState::Off,
            holds: 1
        }
    );
    assert_eq!(
        harness.overlay.calls(),
        vec![
            OverlayCall::CancelDim,
            OverlayCall::CancelIntensity,
            OverlayCall::Open,
            OverlayCall::SetDim(DEFAULT_DIM),
            OverlayCall::SetIntensity(DEFAULT_INTENSITY),
            OverlayCall::SetColor(DEFAULT_COLOR),
        ]
    );
    assert!(!harness.filter.filter_is_on());
    harness.clear();

    harness.dispatch(Command::HidePreview);
    assert_eq!(harness.filter.state(), State::Off);
    // Leaving a preview closes at once instead of fading
    assert_eq!(harness.overlay.calls(), vec![OverlayCall::Close]);
}

#[test]
fn test_preview_nesting() {
    let mut harness = Harness::new();

    harness.dispatch(Command::ShowPreview);
    harness.dispatch(Command::ShowPreview);
    harness.dispatch(Command::HidePreview);
    assert_eq!(
        harness.filter.state(),
        State::Preview {
            return_to: BaseState::Off,
            holds: 1
        }
    );
    assert!(harness.overlay.is_open());

    harness.dispatch(Command::HidePreview);
    assert_eq!(harness.filter.state(), State::Off);
}

#[test]
fn test_on_during_preview_is_deferred() {
    let mut harness = Harness::new();
    harness.dispatch(Command::ShowPreview);
    harness.clear();

    harness.dispatch(Command::On);

    assert_eq!(
        harness.filter.state(),
        State::Preview {
            return_to: BaseState::On,
            holds: 1
        }
    );
    assert!(harness.filter.filter_is_on());
    assert!(!harness.overlay.calls().contains(&OverlayCall::Close));
    assert!(!harness.overlay.calls().contains(&OverlayCall::Open));
    assert!(harness.broadcaster.toggles().is_empty());

    harness.dispatch(Command::HidePreview);
    assert_eq!(harness.filter.state(), State::On);
    assert_eq!(harness.broadcaster.toggles(), vec![true]);
    assert!(harness.overlay.is_open());
}

#[test]
fn test_on_deferred_in_preview_lowers_brightness() {
    let mut harness = Harness::with_settings(lowering());
    harness.dispatch(Command::ShowPreview);
    harness.dispatch(Command::On);
    assert!(harness.brightness.writes().is_empty());

    harness.dispatch(Command::HidePreview);

    assert_eq!(harness.filter.state(), State::On);
    assert_eq!(harness.brightness.writes(), vec![(LOWERED_BRIGHTNESS, false)]);
    assert_eq!(harness.filter.saved_brightness(), (180, true));

    harness.dispatch(Command::Off);
    assert_eq!(harness.brightness.writes().last(), Some(&(180, true)));
}

#[test]
fn test_on_deferred_in_suspend_lowers_brightness() {
    let mut harness = Harness::with_settings(lowering());
    harness.dispatch(Command::StartSuspend);
    harness.dispatch(Command::On);

    harness.dispatch(Command::StopSuspend);

    assert_eq!(harness.filter.state(), State::On);
    assert_eq!(harness.brightness.writes(), vec![(LOWERED_BRIGHTNESS, false)]);
}

#[test]
fn test_lowering_enabled_during_preview_applies_on_return() {
    let mut harness = Harness::new();
    harness.dispatch(Command::On);
    harness.dispatch(Command::ShowPreview);

    harness.change(|s| s.lower_brightness = true, ReactiveEvent::LowerBrightnessChanged);
    assert!(harness.brightness.writes().is_empty());

    harness.dispatch(Command::HidePreview);
    assert_eq!(harness.filter.state(), State::On);
    assert_eq!(harness.brightness.writes(), vec![(LOWERED_BRIGHTNESS, false)]);
    assert_eq!(harness.settings().saved_brightness, 180);
}

#[test]
fn test_lowering_disabled_during_suspend_restores_on_return() {
    let mut harness = Harness::with_settings(lowering());
    harness.dispatch(Command::On);
    harness.dispatch(Command::StartSuspend);

    harness.change(|s| s.lower_brightness = false, ReactiveEvent::LowerBrightnessChanged);
    assert_eq!(harness.brightness.writes(), vec![(LOWERED_BRIGHTNESS, false)]);

    harness.dispatch(Command::StopSuspend);
    assert_eq!(harness.filter.state(), State::On);
    assert_eq!(
        harness.brightness.writes(),
        vec![(LOWERED_BRIGHTNESS, false), (180, true)]
    );
    assert_eq!(harness.filter.saved_brightness(), (NO_SAVED_BRIGHTNESS, false));
}

#[test]
fn test_denied_hide_is_retried_by_the_next_hide() {
    let mut harness = Harness::new();
    harness.dispatch(Command::ShowPreview);

    harness.guard.set_allowed(false);
    harness.dispatch(Command::HidePreview);
    harness.dispatch(Command::ShowPreview);
    harness.dispatch(Command::HidePreview);
    assert_eq!(
        harness.filter.state(),
        State::Preview {
            return_to: BaseState::Off,
            holds: 0
        }
    );
    assert_eq!(harness.broadcaster.count(&Broadcast::PermissionDenied), 2);

    harness.guard.set_allowed(true);
    harness.dispatch(Command::HidePreview);
    assert_eq!(harness.filter.state(), State::Off);
}

#[test]
fn test_wrapper_commands_are_not_deferred() {
    let mut harness = Harness::new();

    harness.dispatch(Command::ShowPreview);
    harness.dispatch(Command::StartSuspend);
    assert_eq!(
        harness.filter.state(),
        State::Preview {
            return_to: BaseState::Off,
            holds: 1
        }
    );

    harness.dispatch(Command::HidePreview);
    harness.dispatch(Command::StartSuspend);
    harness.dispatch(Command::ShowPreview);
    harness.dispatch(Command::StartSuspend);
    assert_eq!(
        harness.filter.state(),
        State::Suspend {
            return_to: BaseState::Off
        }
    );
}

#[test]
fn test_toggle_during_suspend_changes_return_state() {
    let mut harness = Harness::new();
    harness.dispatch(Command::On);
    harness.dispatch(Command::StartSuspend);

    harness.dispatch(Command::Toggle);
    assert_eq!(
        harness.filter.state(),
        State::Suspend {
            return_to: BaseState::Off
        }
    );
    assert!(!harness.filter.filter_is_on());

    harness.dispatch(Command::StopSuspend);
    assert_eq!(harness.filter.state(), State::Off);
}

#[test]
fn test_suspend_detour_leaves_brightness_alone() {
    let mut harness = Harness::with_settings(lowering());

    harness.dispatch(Command::On);
    assert_eq!(harness.brightness.writes(), vec![(LOWERED_BRIGHTNESS, false)]);
    assert_eq!(harness.filter.saved_brightness(), (180, true));

    harness.dispatch(Command::StartSuspend);
    assert!(harness.overlay.calls().contains(&OverlayCall::Close));
    assert!(!harness.overlay.is_open());
    assert!(harness.filter.filter_is_on());

    harness.dispatch(Command::StopSuspend);
    assert_eq!(harness.filter.state(), State::On);
    assert!(harness.overlay.is_open());
    assert_eq!(harness.brightness.writes(), vec![(LOWERED_BRIGHTNESS, false)]);

    let refreshes = harness.publisher.refreshes();
    assert!(refreshes[1..].iter().all(|(on, _)| *on));
}

#[test]
fn test_guard_failure_keeps_state() {
    let mut harness = Harness::new();
    harness.guard.set_allowed(false);

    harness.dispatch(Command::On);

    assert_eq!(harness.filter.state(), State::Off);
    assert_eq!(harness.broadcaster.count(&Broadcast::PermissionDenied), 1);
    assert!(!harness.settings().filter_is_on);
    assert!(!harness.overlay.calls().contains(&OverlayCall::Open));
}

#[test]
fn test_guard_consulted_once_per_transition() {
    let mut guard = MockPermissionGuard::new();
    // Init → Off at construction, then Off → On
    guard.expect_may_draw_overlay().times(2).returning(|| true);

    let mut harness = Harness::builder().guard(Box::new(guard)).build();
    harness.dispatch(Command::On);
    harness.dispatch(Command::On);

    assert_eq!(harness.filter.state(), State::On);
}

#[test]
fn test_live_intensity_in_on() {
    let mut harness = Harness::new();
    harness.dispatch(Command::On);
    harness.clear();

    harness.change(|s| s.intensity = 65, ReactiveEvent::IntensityChanged);

    assert_eq!(
        harness.overlay.calls(),
        vec![OverlayCall::CancelIntensity, OverlayCall::SetIntensity(65)]
    );
    assert_eq!(harness.broadcaster.last_status().map(|s| s.intensity), Some(65));
}

#[test]
fn test_live_dim_and_color_in_preview() {
    let mut harness = Harness::new();
    harness.dispatch(Command::ShowPreview);
    harness.clear();

    harness.change(|s| s.dim = 70, ReactiveEvent::DimChanged);
    harness.change(|s| s.color = 2500, ReactiveEvent::ColorChanged);

    assert_eq!(
        harness.overlay.calls(),
        vec![
            OverlayCall::CancelDim,
            OverlayCall::SetDim(70),
            OverlayCall::SetColor(2500),
        ]
    );
}

#[test]
fn test_parameter_events_do_not_draw_while_off() {
    let mut harness = Harness::new();
    harness.complete_fades();
    harness.clear();

    harness.change(|s| s.color = 2000, ReactiveEvent::ColorChanged);
    harness.change(|s| s.dim = 90, ReactiveEvent::DimChanged);

    assert!(harness.overlay.calls().is_empty());
    // Subscribers still learn the new values
    assert_eq!(harness.broadcaster.last_status().map(|s| s.dim), Some(90));
}

#[test]
fn test_lower_brightness_toggled_while_on() {
    let mut harness = Harness::new();
    harness.dispatch(Command::On);
    assert!(harness.brightness.writes().is_empty());

    harness.change(|s| s.lower_brightness = true, ReactiveEvent::LowerBrightnessChanged);
    assert_eq!(harness.brightness.writes(), vec![(LOWERED_BRIGHTNESS, false)]);
    assert_eq!(harness.settings().saved_brightness, 180);

    harness.change(|s| s.lower_brightness = false, ReactiveEvent::LowerBrightnessChanged);
    assert_eq!(
        harness.brightness.writes(),
        vec![(LOWERED_BRIGHTNESS, false), (180, true)]
    );
    assert_eq!(harness.filter.saved_brightness(), (NO_SAVED_BRIGHTNESS, false));
    assert_eq!(harness.settings().saved_brightness, NO_SAVED_BRIGHTNESS);
}

#[test]
fn test_repeated_lowering_keeps_the_first_snapshot() {
    let mut harness = Harness::with_settings(lowering());
    harness.dispatch(Command::On);

    harness.change(|s| s.lower_brightness = true, ReactiveEvent::LowerBrightnessChanged);
    harness.change(|s| s.lower_brightness = true, ReactiveEvent::LowerBrightnessChanged);
    assert_eq!(harness.filter.saved_brightness(), (180, true));
    assert_eq!(harness.settings().saved_brightness, 180);

    harness.dispatch(Command::Off);
    assert_eq!(
        harness.brightness.writes(),
        vec![(LOWERED_BRIGHTNESS, false), (180, true)]
    );
}

#[test]
fn test_lower_brightness_denied_without_write_access() {
    let brightness = FakeBrightness::default();
    brightness.set_writable(false);
    let mut harness = Harness::builder().brightness(brightness).build();
    harness.dispatch(Command::On);

    harness.change(|s| s.lower_brightness = true, ReactiveEvent::LowerBrightnessChanged);

    assert_eq!(harness.broadcaster.count(&Broadcast::BrightnessDenied), 1);
    assert!(harness.brightness.writes().is_empty());
}

#[test]
fn test_off_restores_brightness() {
    let mut harness = Harness::with_settings(lowering());
    harness.dispatch(Command::On);
    harness.dispatch(Command::Off);

    assert_eq!(
        harness.brightness.writes(),
        vec![(LOWERED_BRIGHTNESS, false), (180, true)]
    );
    assert_eq!(harness.filter.saved_brightness(), (NO_SAVED_BRIGHTNESS, false));
}

#[test]
fn test_unreadable_brightness_is_not_restored() {
    let brightness = FakeBrightness::new(None, true);
    let mut harness = Harness::builder()
        .settings(lowering())
        .brightness(brightness)
        .build();

    harness.dispatch(Command::On);
    assert_eq!(harness.filter.saved_brightness(), (NO_SAVED_BRIGHTNESS, false));
    harness.dispatch(Command::Off);

    assert_eq!(harness.brightness.writes(), vec![(LOWERED_BRIGHTNESS, false)]);
}

#[test]
fn test_brightness_saved_before_restart_is_restored() {
    let settings = Settings {
        saved_brightness: 120,
        saved_auto_brightness: false,
        ..Settings::default()
    };
    let harness = Harness::with_settings(settings);

    assert_eq!(harness.brightness.writes(), vec![(120, false)]);
    assert_eq!(harness.settings().saved_brightness, NO_SAVED_BRIGHTNESS);
    assert_eq!(
        harness.brightness.reading(),
        Some(BrightnessReading {
            value: 120,
            automatic: false
        })
    );
}

#[test]
fn test_secure_suspend_runs_monitor_while_on() {
    let settings = Settings {
        secure_suspend: true,
        ..Settings::default()
    };
    let mut harness = Harness::with_settings(settings);
    assert!(!harness.monitor.is_active());

    harness.dispatch(Command::On);
    assert!(harness.monitor.is_active());

    harness.dispatch(Command::Off);
    assert!(!harness.monitor.is_active());
}

#[test]
fn test_secure_suspend_event_while_on() {
    let mut harness = Harness::new();
    harness.dispatch(Command::On);
    harness.monitor.clear();

    harness.change(|s| s.secure_suspend = true, ReactiveEvent::SecureSuspendChanged);
    assert!(harness.monitor.is_active());

    harness.change(|s| s.secure_suspend = false, ReactiveEvent::SecureSuspendChanged);
    assert!(!harness.monitor.is_active());
    assert_eq!(harness.monitor.calls(), vec![MonitorCall::Start, MonitorCall::Stop]);
}

#[test]
fn test_screen_and_orientation_events_in_any_state() {
    let mut harness = Harness::new();
    harness.clear();

    harness.filter.handle_event(ReactiveEvent::ScreenTurnedOff);
    harness.filter.handle_event(ReactiveEvent::ScreenTurnedOn);
    harness.filter.handle_event(ReactiveEvent::OrientationChanged);

    assert_eq!(
        harness.monitor.calls(),
        vec![MonitorCall::ScreenOff, MonitorCall::ScreenOn]
    );
    assert_eq!(harness.overlay.calls(), vec![OverlayCall::Relayout]);
    assert_eq!(harness.filter.state(), State::Off);
}

#[test]
fn test_profile_change_refreshes_notification() {
    let mut harness = Harness::new();
    harness.dispatch(Command::On);
    harness.clear();

    harness.change(
        |s| s.profile_name = "Night".to_string(),
        ReactiveEvent::ProfileChanged,
    );

    assert_eq!(harness.publisher.refreshes(), vec![(true, "Night".to_string())]);
    assert_eq!(
        harness.broadcaster.last_status().map(|s| s.profile),
        Some("Night".to_string())
    );
}

#[test]
fn test_status_describes_wrappers() {
    let mut harness = Harness::new();
    harness.dispatch(Command::ShowPreview);
    harness.dispatch(Command::ShowPreview);

    let status = harness.filter.status();
    assert_eq!(status.state, StateKind::Preview);
    assert_eq!(status.return_to, Some(StateKind::Off));
    assert_eq!(status.holds, Some(2));
    assert!(!status.filter_is_on);
}

#[test]
fn test_shutdown_hides_and_restores() {
    let mut harness = Harness::with_settings(lowering());
    harness.dispatch(Command::On);
    harness.clear();

    harness.filter.shutdown();

    assert!(harness.overlay.calls().contains(&OverlayCall::Close));
    assert!(!harness.overlay.is_open());
    assert_eq!(harness.brightness.writes().last(), Some(&(180, true)));
    assert_eq!(harness.monitor.calls(), vec![MonitorCall::Stop]);
    // Remembered for `run --restore`
    assert!(harness.settings().filter_is_on);
}
