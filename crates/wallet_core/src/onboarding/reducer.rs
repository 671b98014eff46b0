//! Synchronous transition function for the onboarding sequence.
//!
//! The machine never touches the session itself. It consumes events and returns the
//! effects the driver must run. The session status it has last been told about is the
//! authority on whether the dashboard may be shown; dwell timers only set floors.

use shared::{
    domain::{OnboardingPhase, Overlay, SessionStatus},
    error::{ErrorNotice, WalletError},
    protocol::OnboardingView,
};
use tracing::{debug, info, warn};

use super::events::{DwellTimings, FlowTicket, OnboardingEffect, OnboardingEvent, OnboardingNotice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EstablishProgress {
    NotIssued,
    Pending,
    Succeeded,
}

#[derive(Debug, Clone)]
pub struct OnboardingMachine {
    timings: DwellTimings,
    phase: OnboardingPhase,
    overlay: Option<Overlay>,
    last_error: Option<WalletError>,
    ticket: FlowTicket,
    session_status: SessionStatus,
    establish: EstablishProgress,
    /// Whether the dwell floor of the current phase has elapsed.
    floor_elapsed: bool,
}

impl OnboardingMachine {
    pub fn new(timings: DwellTimings, session_status: SessionStatus) -> Self {
        Self {
            timings,
            phase: OnboardingPhase::Intro,
            overlay: None,
            last_error: None,
            ticket: 0,
            session_status,
            establish: EstablishProgress::NotIssued,
            floor_elapsed: false,
        }
    }

    pub fn phase(&self) -> OnboardingPhase {
        self.phase
    }

    pub fn overlay(&self) -> Option<Overlay> {
        self.overlay
    }

    pub fn last_error(&self) -> Option<&WalletError> {
        self.last_error.as_ref()
    }

    pub fn ticket(&self) -> FlowTicket {
        self.ticket
    }

    pub fn view(&self) -> OnboardingView {
        OnboardingView {
            phase: self.phase,
            overlay: self.overlay,
            last_error: self.last_error.as_ref().map(ErrorNotice::from),
        }
    }

    pub fn handle(&mut self, event: OnboardingEvent) -> Vec<OnboardingEffect> {
        match event {
            OnboardingEvent::StartRequested => self.start(),
            OnboardingEvent::DwellElapsed { ticket } => {
                if ticket != self.ticket {
                    debug!(ticket, current = self.ticket, "onboarding: stale dwell ignored");
                    return Vec::new();
                }
                self.dwell_elapsed()
            }
            OnboardingEvent::EstablishCompleted { ticket, result } => {
                if ticket != self.ticket || self.phase != OnboardingPhase::Provisioning {
                    debug!(ticket, current = self.ticket, "onboarding: stale establish result ignored");
                    return Vec::new();
                }
                match result {
                    Ok(wallet) => {
                        info!(wallet = %wallet.short(), "onboarding: wallet provisioned");
                        self.establish = EstablishProgress::Succeeded;
                        if self.floor_elapsed {
                            self.enter_success()
                        } else {
                            Vec::new()
                        }
                    }
                    Err(WalletError::Superseded) => self.reset(),
                    Err(err) => {
                        warn!(error = %err, "onboarding: provisioning failed");
                        let mut effects = self.reset();
                        self.last_error = Some(err.clone());
                        effects.push(OnboardingEffect::Notify(OnboardingNotice::Failed(err)));
                        effects
                    }
                }
            }
            OnboardingEvent::SessionStatusChanged(status) => self.status_changed(status),
            OnboardingEvent::TeardownRequested | OnboardingEvent::SessionCleared => {
                if self.phase == OnboardingPhase::Intro {
                    Vec::new()
                } else {
                    info!(phase = ?self.phase, "onboarding: session cleared, resetting");
                    self.reset()
                }
            }
            OnboardingEvent::OpenOverlay(overlay) => {
                if self.phase == OnboardingPhase::Dashboard {
                    self.overlay = Some(overlay);
                } else {
                    debug!(?overlay, phase = ?self.phase, "onboarding: overlay needs the dashboard");
                }
                Vec::new()
            }
            OnboardingEvent::CloseOverlay => {
                self.overlay = None;
                Vec::new()
            }
        }
    }

    fn start(&mut self) -> Vec<OnboardingEffect> {
        if self.phase != OnboardingPhase::Intro {
            debug!(phase = ?self.phase, "onboarding: start ignored, flow already running");
            return Vec::new();
        }
        self.ticket += 1;
        self.last_error = None;
        self.establish = EstablishProgress::NotIssued;
        self.floor_elapsed = false;
        self.phase = OnboardingPhase::BiometricPrompt;
        vec![
            OnboardingEffect::Notify(OnboardingNotice::PhaseChanged(self.phase)),
            OnboardingEffect::ScheduleDwell {
                ticket: self.ticket,
                after: self.timings.prompt,
            },
        ]
    }

    fn dwell_elapsed(&mut self) -> Vec<OnboardingEffect> {
        match self.phase {
            OnboardingPhase::BiometricPrompt => {
                self.phase = OnboardingPhase::Provisioning;
                self.establish = EstablishProgress::Pending;
                self.floor_elapsed = false;
                vec![
                    OnboardingEffect::Notify(OnboardingNotice::PhaseChanged(self.phase)),
                    OnboardingEffect::EstablishSession {
                        ticket: self.ticket,
                    },
                    OnboardingEffect::ScheduleDwell {
                        ticket: self.ticket,
                        after: self.timings.provisioning,
                    },
                ]
            }
            OnboardingPhase::Provisioning => {
                self.floor_elapsed = true;
                if self.establish == EstablishProgress::Succeeded {
                    self.enter_success()
                } else {
                    Vec::new()
                }
            }
            OnboardingPhase::Success => {
                self.floor_elapsed = true;
                self.try_enter_dashboard()
            }
            OnboardingPhase::Intro | OnboardingPhase::Dashboard => Vec::new(),
        }
    }

    fn status_changed(&mut self, status: SessionStatus) -> Vec<OnboardingEffect> {
        let previous = std::mem::replace(&mut self.session_status, status);
        if self.phase == OnboardingPhase::Intro {
            return Vec::new();
        }
        // Intermediate values may be coalesced away, so leaving Connected counts as a loss
        // even when Disconnected itself was never observed.
        if previous == SessionStatus::Connected && status != SessionStatus::Connected {
            info!(phase = ?self.phase, ?status, "onboarding: connected session lost, resetting");
            return self.reset();
        }
        match status {
            SessionStatus::Disconnected if previous != SessionStatus::Disconnected => {
                // A failed establish also lands here; its own result carries the error.
                if self.phase == OnboardingPhase::Provisioning
                    && self.establish == EstablishProgress::Pending
                {
                    return Vec::new();
                }
                info!(phase = ?self.phase, "onboarding: session disconnected, resetting");
                self.reset()
            }
            SessionStatus::Connected if self.phase == OnboardingPhase::Success && self.floor_elapsed => {
                self.try_enter_dashboard()
            }
            _ => Vec::new(),
        }
    }

    fn enter_success(&mut self) -> Vec<OnboardingEffect> {
        self.phase = OnboardingPhase::Success;
        self.floor_elapsed = false;
        vec![
            OnboardingEffect::Notify(OnboardingNotice::PhaseChanged(self.phase)),
            OnboardingEffect::ScheduleDwell {
                ticket: self.ticket,
                after: self.timings.success,
            },
        ]
    }

    fn try_enter_dashboard(&mut self) -> Vec<OnboardingEffect> {
        if self.session_status != SessionStatus::Connected {
            return Vec::new();
        }
        self.phase = OnboardingPhase::Dashboard;
        vec![OnboardingEffect::Notify(OnboardingNotice::PhaseChanged(
            self.phase,
        ))]
    }

    fn reset(&mut self) -> Vec<OnboardingEffect> {
        self.ticket += 1;
        self.phase = OnboardingPhase::Intro;
        self.overlay = None;
        self.establish = EstablishProgress::NotIssued;
        self.floor_elapsed = false;
        vec![
            OnboardingEffect::CancelScheduled,
            OnboardingEffect::Notify(OnboardingNotice::PhaseChanged(self.phase)),
        ]
    }
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
