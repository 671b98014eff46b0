//! Async driver that runs the onboarding machine against a live session store.

use std::{future::Future, sync::Arc, time::Duration};

use shared::{
    domain::{OnboardingPhase, Overlay, SessionStatus},
    protocol::{OnboardingView, SessionEvent},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info};

use super::{
    events::{DwellTimings, FlowTicket, OnboardingEffect, OnboardingEvent, OnboardingNotice},
    reducer::OnboardingMachine,
};
use crate::session_store::{EstablishOptions, SessionStore};

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("onboarding controller is no longer running")]
    ControllerStopped,
}

/// Dwell timers of the current flow. Aborted together on reset and on drop.
#[derive(Default)]
struct ScheduledTasks {
    handles: Vec<JoinHandle<()>>,
}

impl ScheduledTasks {
    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|handle| !handle.is_finished());
        self.handles.push(tokio::spawn(task));
    }

    fn cancel_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for ScheduledTasks {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

struct Driver {
    machine: OnboardingMachine,
    store: Arc<SessionStore>,
    options: EstablishOptions,
    inbox: mpsc::UnboundedSender<OnboardingEvent>,
    scheduled: ScheduledTasks,
    view: watch::Sender<OnboardingView>,
    notices: broadcast::Sender<OnboardingNotice>,
}

impl Driver {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<OnboardingEvent>,
        mut status: watch::Receiver<SessionStatus>,
        mut session_events: broadcast::Receiver<SessionEvent>,
    ) {
        loop {
            // Store notifications first: anything the store published before a command
            // was sent must be applied before that command.
            let event = tokio::select! {
                biased;
                published = session_events.recv() => match published {
                    Ok(SessionEvent::SessionCleared) => OnboardingEvent::SessionCleared,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "onboarding: session events lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = status.changed() => match changed {
                    Ok(()) => OnboardingEvent::SessionStatusChanged(*status.borrow_and_update()),
                    Err(_) => break,
                },
                Some(event) = events.recv() => event,
                else => break,
            };
            self.dispatch(event);
        }
        debug!("onboarding: driver stopped");
    }

    fn dispatch(&mut self, event: OnboardingEvent) {
        let before = self.machine.phase();
        for effect in self.machine.handle(event) {
            self.run_effect(effect);
        }
        let after = self.machine.phase();
        if before != after {
            info!(from = ?before, to = ?after, "onboarding: phase changed");
        }
        let view = self.machine.view();
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    fn run_effect(&mut self, effect: OnboardingEffect) {
        match effect {
            OnboardingEffect::ScheduleDwell { ticket, after } => self.schedule_dwell(ticket, after),
            OnboardingEffect::CancelScheduled => self.scheduled.cancel_all(),
            OnboardingEffect::EstablishSession { ticket } => self.establish(ticket),
            OnboardingEffect::Notify(notice) => {
                let _ = self.notices.send(notice);
            }
        }
    }

    fn schedule_dwell(&mut self, ticket: FlowTicket, after: Duration) {
        let inbox = self.inbox.clone();
        self.scheduled.spawn(async move {
            tokio::time::sleep(after).await;
            let _ = inbox.send(OnboardingEvent::DwellElapsed { ticket });
        });
    }

    /// Not tracked with the timers: the store must see the call through, and a stale
    /// result is dropped by the machine.
    fn establish(&mut self, ticket: FlowTicket) {
        let inbox = self.inbox.clone();
        let store = Arc::clone(&self.store);
        let options = self.options;
        tokio::spawn(async move {
            let result = store.establish_session(options).await;
            let _ = inbox.send(OnboardingEvent::EstablishCompleted { ticket, result });
        });
    }
}

pub struct OnboardingController {
    store: Arc<SessionStore>,
    inbox: mpsc::UnboundedSender<OnboardingEvent>,
    view: watch::Receiver<OnboardingView>,
    notices: broadcast::Sender<OnboardingNotice>,
    driver: JoinHandle<()>,
}

impl OnboardingController {
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        store: Arc<SessionStore>,
        timings: DwellTimings,
        options: EstablishOptions,
    ) -> Self {
        let (inbox, events) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(64);
        let session_events = store.subscribe_events();
        let mut status = store.subscribe_status();
        let initial_status = *status.borrow_and_update();
        let machine = OnboardingMachine::new(timings, initial_status);
        let (view_tx, view) = watch::channel(machine.view());

        let driver = Driver {
            machine,
            store: Arc::clone(&store),
            options,
            inbox: inbox.clone(),
            scheduled: ScheduledTasks::default(),
            view: view_tx,
            notices: notices.clone(),
        };
        let driver = tokio::spawn(driver.run(events, status, session_events));

        Self {
            store,
            inbox,
            view,
            notices,
            driver,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn start(&self) -> Result<(), OnboardingError> {
        self.send(OnboardingEvent::StartRequested)
    }

    pub fn open_overlay(&self, overlay: Overlay) -> Result<(), OnboardingError> {
        self.send(OnboardingEvent::OpenOverlay(overlay))
    }

    pub fn close_overlay(&self) -> Result<(), OnboardingError> {
        self.send(OnboardingEvent::CloseOverlay)
    }

    /// Tears the session down and returns the sequence to the intro.
    pub fn disconnect(&self) -> Result<(), OnboardingError> {
        self.send(OnboardingEvent::TeardownRequested)?;
        self.store.teardown_session();
        Ok(())
    }

    pub fn view(&self) -> OnboardingView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OnboardingView> {
        self.view.clone()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<OnboardingNotice> {
        self.notices.subscribe()
    }

    pub async fn wait_for_phase(
        &self,
        phase: OnboardingPhase,
    ) -> Result<OnboardingView, OnboardingError> {
        let mut view = self.view.clone();
        let reached = view
            .wait_for(|current| current.phase == phase)
            .await
            .map_err(|_| OnboardingError::ControllerStopped)?;
        Ok(reached.clone())
    }

    fn send(&self, event: OnboardingEvent) -> Result<(), OnboardingError> {
        self.inbox
            .send(event)
            .map_err(|_| OnboardingError::ControllerStopped)
    }
}

impl Drop for OnboardingController {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[cfg(test)]
#[path = "tests/orchestration_tests.rs"]
mod tests;
