//! Inputs, effects, and notices of the onboarding state machine.

use std::time::Duration;

use shared::{
    domain::{OnboardingPhase, Overlay, SessionStatus, WalletAddress},
    error::WalletError,
};

/// Identifies one run of the flow; anything tagged with an older ticket is stale.
pub type FlowTicket = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingEvent {
    StartRequested,
    DwellElapsed {
        ticket: FlowTicket,
    },
    EstablishCompleted {
        ticket: FlowTicket,
        result: Result<WalletAddress, WalletError>,
    },
    SessionStatusChanged(SessionStatus),
    /// The store dropped the active session, whatever the status reads now.
    SessionCleared,
    /// The user asked to disconnect from this controller.
    TeardownRequested,
    OpenOverlay(Overlay),
    CloseOverlay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingEffect {
    ScheduleDwell {
        ticket: FlowTicket,
        after: Duration,
    },
    /// Drop every outstanding dwell timer.
    CancelScheduled,
    EstablishSession {
        ticket: FlowTicket,
    },
    Notify(OnboardingNotice),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingNotice {
    PhaseChanged(OnboardingPhase),
    Failed(WalletError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwellTimings {
    /// Time the biometric prompt animation stays up before provisioning starts.
    pub prompt: Duration,
    /// Minimum time the provisioning animation stays up.
    pub provisioning: Duration,
    /// Minimum time the success animation stays up.
    pub success: Duration,
}

impl Default for DwellTimings {
    fn default() -> Self {
        Self {
            prompt: Duration::from_millis(2000),
            provisioning: Duration::from_millis(2000),
            success: Duration::from_millis(1500),
        }
    }
}
