use std::time::Duration;

use super::*;
use shared::domain::WalletAddress;

fn machine() -> OnboardingMachine {
    OnboardingMachine::new(DwellTimings::default(), SessionStatus::Disconnected)
}

fn wallet() -> WalletAddress {
    WalletAddress::from_bytes(&[9u8; 32])
}

fn dwell(machine: &OnboardingMachine) -> OnboardingEvent {
    OnboardingEvent::DwellElapsed {
        ticket: machine.ticket(),
    }
}

fn established(machine: &OnboardingMachine, result: Result<WalletAddress, WalletError>) -> OnboardingEvent {
    OnboardingEvent::EstablishCompleted {
        ticket: machine.ticket(),
        result,
    }
}

/// Drives a fresh machine into the given phase along the happy path.
fn machine_in(phase: OnboardingPhase) -> OnboardingMachine {
    let mut machine = machine();
    if phase == OnboardingPhase::Intro {
        return machine;
    }
    machine.handle(OnboardingEvent::StartRequested);
    if phase == OnboardingPhase::BiometricPrompt {
        return machine;
    }
    machine.handle(dwell(&machine));
    machine.handle(OnboardingEvent::SessionStatusChanged(SessionStatus::Connecting));
    if phase == OnboardingPhase::Provisioning {
        return machine;
    }
    machine.handle(OnboardingEvent::SessionStatusChanged(SessionStatus::Connected));
    machine.handle(established(&machine, Ok(wallet())));
    machine.handle(dwell(&machine));
    if phase == OnboardingPhase::Success {
        return machine;
    }
    machine.handle(dwell(&machine));
    assert_eq!(machine.phase(), OnboardingPhase::Dashboard);
    machine
}

#[test]
fn happy_path_walks_every_phase_in_order() {
    let mut machine = machine();

    let effects = machine.handle(OnboardingEvent::StartRequested);
    assert_eq!(machine.phase(), OnboardingPhase::BiometricPrompt);
    assert_eq!(
        effects,
        vec![
            OnboardingEffect::Notify(OnboardingNotice::PhaseChanged(
                OnboardingPhase::BiometricPrompt
            )),
            OnboardingEffect::ScheduleDwell {
                ticket: 1,
                after: Duration::from_millis(2000),
            },
        ]
    );

    let effects = machine.handle(dwell(&machine));
    assert_eq!(machine.phase(), OnboardingPhase::Provisioning);
    assert!(effects.contains(&OnboardingEffect::EstablishSession { ticket: 1 }));

    machine.handle(OnboardingEvent::SessionStatusChanged(SessionStatus::Connecting));
    machine.handle(OnboardingEvent::SessionStatusChanged(SessionStatus::Connected));
    machine.handle(established(&machine, Ok(wallet())));
    assert_eq!(machine.phase(), OnboardingPhase::Provisioning, "floor not elapsed yet");

    let effects = machine.handle(dwell(&machine));
    assert_eq!(machine.phase(), OnboardingPhase::Success);
    assert!(effects.contains(&OnboardingEffect::ScheduleDwell {
        ticket: 1,
        after: Duration::from_millis(1500),
    }));

    machine.handle(dwell(&machine));
    assert_eq!(machine.phase(), OnboardingPhase::Dashboard);
    assert!(machine.last_error().is_none());
}

#[test]
fn establish_is_issued_exactly_once_per_run() {
    let mut machine = machine();
    let mut effects = machine.handle(OnboardingEvent::StartRequested);
    effects.extend(machine.handle(dwell(&machine)));
    effects.extend(machine.handle(dwell(&machine)));
    effects.extend(machine.handle(OnboardingEvent::StartRequested));

    let issued = effects
        .iter()
        .filter(|effect| matches!(effect, OnboardingEffect::EstablishSession { .. }))
        .count();
    assert_eq!(issued, 1);
}

#[test]
fn slower_establish_gates_the_success_transition() {
    let mut machine = machine_in(OnboardingPhase::Provisioning);

    machine.handle(dwell(&machine));
    assert_eq!(machine.phase(), OnboardingPhase::Provisioning);

    machine.handle(OnboardingEvent::SessionStatusChanged(SessionStatus::Connected));
    machine.handle(established(&machine, Ok(wallet())));
    assert_eq!(machine.phase(), OnboardingPhase::Success);
}

#[test]
fn denied_establish_returns_to_intro_with_error() {
    let mut machine = machine_in(OnboardingPhase::Provisioning);

    // The store flips back to Disconnected before the result arrives.
    let effects = machine.handle(OnboardingEvent::SessionStatusChanged(
        SessionStatus::Disconnected,
    ));
    assert!(effects.is_empty());
    assert_eq!(machine.phase(), OnboardingPhase::Provisioning);

    let effects = machine.handle(established(&machine, Err(WalletError::AuthenticationDenied)));
    assert_eq!(machine.phase(), OnboardingPhase::Intro);
    assert_eq!(machine.last_error(), Some(&WalletError::AuthenticationDenied));
    assert!(effects.contains(&OnboardingEffect::CancelScheduled));
    assert!(effects.contains(&OnboardingEffect::Notify(OnboardingNotice::Failed(
        WalletError::AuthenticationDenied
    ))));

    let view = machine.view();
    assert_eq!(view.phase, OnboardingPhase::Intro);
    assert_eq!(
        view.last_error.map(|notice| notice.code),
        Some(shared::error::ErrorCode::AuthenticationDenied)
    );
}

#[test]
fn superseded_establish_resets_without_error() {
    let mut machine = machine_in(OnboardingPhase::Provisioning);
    let effects = machine.handle(established(&machine, Err(WalletError::Superseded)));

    assert_eq!(machine.phase(), OnboardingPhase::Intro);
    assert!(machine.last_error().is_none());
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, OnboardingEffect::Notify(OnboardingNotice::Failed(_)))));
}

#[test]
fn dashboard_waits_for_connected_status_even_after_dwell() {
    let mut machine = machine();
    machine.handle(OnboardingEvent::StartRequested);
    machine.handle(dwell(&machine));
    machine.handle(OnboardingEvent::SessionStatusChanged(SessionStatus::Connecting));
    machine.handle(established(&machine, Ok(wallet())));
    machine.handle(dwell(&machine));
    assert_eq!(machine.phase(), OnboardingPhase::Success);

    machine.handle(dwell(&machine));
    assert_eq!(
        machine.phase(),
        OnboardingPhase::Success,
        "status has not been observed as connected"
    );

    machine.handle(OnboardingEvent::SessionStatusChanged(SessionStatus::Connected));
    assert_eq!(machine.phase(), OnboardingPhase::Dashboard);
}

#[test]
fn connected_status_alone_does_not_skip_the_success_floor() {
    let mut machine = machine_in(OnboardingPhase::Success);
    machine.handle(OnboardingEvent::SessionStatusChanged(SessionStatus::Connected));
    assert_eq!(machine.phase(), OnboardingPhase::Success);
}

#[test]
fn disconnect_resets_every_non_intro_phase() {
    for phase in [
        OnboardingPhase::BiometricPrompt,
        OnboardingPhase::Success,
        OnboardingPhase::Dashboard,
    ] {
        let mut machine = machine_in(phase);
        if phase == OnboardingPhase::BiometricPrompt {
            machine.handle(OnboardingEvent::SessionStatusChanged(SessionStatus::Connected));
        }
        if phase == OnboardingPhase::Dashboard {
            machine.handle(OnboardingEvent::OpenOverlay(Overlay::Send));
            assert_eq!(machine.overlay(), Some(Overlay::Send));
        }

        let effects = machine.handle(OnboardingEvent::SessionStatusChanged(
            SessionStatus::Disconnected,
        ));

        assert_eq!(machine.phase(), OnboardingPhase::Intro, "from {phase:?}");
        assert_eq!(machine.overlay(), None);
        assert!(effects.contains(&OnboardingEffect::CancelScheduled));
    }
}

#[test]
fn leaving_connected_resets_even_if_disconnected_was_never_seen() {
    for status in [SessionStatus::Connecting, SessionStatus::Disconnected] {
        let mut machine = machine_in(OnboardingPhase::Dashboard);
        machine.handle(OnboardingEvent::OpenOverlay(Overlay::Send));

        let effects = machine.handle(OnboardingEvent::SessionStatusChanged(status));

        assert_eq!(machine.phase(), OnboardingPhase::Intro, "to {status:?}");
        assert_eq!(machine.overlay(), None);
        assert!(effects.contains(&OnboardingEffect::CancelScheduled));
    }
}

#[test]
fn session_cleared_resets_while_status_still_reads_connected() {
    let mut machine = machine_in(OnboardingPhase::Dashboard);
    machine.handle(OnboardingEvent::OpenOverlay(Overlay::Receive));

    machine.handle(OnboardingEvent::SessionCleared);
    assert_eq!(machine.phase(), OnboardingPhase::Intro);
    assert_eq!(machine.overlay(), None);

    // A later Connected for some other session must not resurrect the dashboard.
    machine.handle(OnboardingEvent::SessionStatusChanged(SessionStatus::Connected));
    assert_eq!(machine.phase(), OnboardingPhase::Intro);
}

#[test]
fn teardown_request_resets_even_while_provisioning() {
    let mut machine = machine_in(OnboardingPhase::Provisioning);
    let stale_ticket = machine.ticket();

    machine.handle(OnboardingEvent::TeardownRequested);
    assert_eq!(machine.phase(), OnboardingPhase::Intro);

    machine.handle(OnboardingEvent::EstablishCompleted {
        ticket: stale_ticket,
        result: Ok(wallet()),
    });
    machine.handle(OnboardingEvent::DwellElapsed {
        ticket: stale_ticket,
    });
    assert_eq!(machine.phase(), OnboardingPhase::Intro);
}

#[test]
fn stale_timers_from_a_previous_run_are_ignored() {
    let mut machine = machine_in(OnboardingPhase::BiometricPrompt);
    let stale_ticket = machine.ticket();
    machine.handle(OnboardingEvent::TeardownRequested);
    machine.handle(OnboardingEvent::StartRequested);

    machine.handle(OnboardingEvent::DwellElapsed {
        ticket: stale_ticket,
    });
    assert_eq!(machine.phase(), OnboardingPhase::BiometricPrompt);
}

#[test]
fn overlays_only_open_on_the_dashboard() {
    let mut machine = machine_in(OnboardingPhase::Success);
    machine.handle(OnboardingEvent::OpenOverlay(Overlay::Receive));
    assert_eq!(machine.overlay(), None);

    let mut machine = machine_in(OnboardingPhase::Dashboard);
    machine.handle(OnboardingEvent::OpenOverlay(Overlay::Receive));
    assert_eq!(machine.overlay(), Some(Overlay::Receive));
    machine.handle(OnboardingEvent::CloseOverlay);
    assert_eq!(machine.overlay(), None);
}

#[test]
fn restart_after_failure_clears_the_error() {
    let mut machine = machine_in(OnboardingPhase::Provisioning);
    machine.handle(established(&machine, Err(WalletError::AuthenticationUnsupported)));
    assert!(machine.last_error().is_some());

    machine.handle(OnboardingEvent::StartRequested);
    assert_eq!(machine.phase(), OnboardingPhase::BiometricPrompt);
    assert!(machine.last_error().is_none());
}
