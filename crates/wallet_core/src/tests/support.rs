//! Scripted capability fakes shared by the store and onboarding tests.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use crate::capabilities::{
    Assertion, AssertionRequest, BiometricAuthenticator, BiometricError, Credential,
    CredentialCreationRequest, TransferRequest, TransferSubmitter,
};

pub const RECIPIENT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const SENDER: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

const OPEN_GATE_PERMITS: usize = Semaphore::MAX_PERMITS / 2;

pub struct ScriptedAuthenticator {
    creation_results: Mutex<VecDeque<Result<Credential, BiometricError>>>,
    assertion_results: Mutex<VecDeque<Result<Assertion, BiometricError>>>,
    assertion_requests: Mutex<Vec<AssertionRequest>>,
    creation_gate: Semaphore,
    latency: Duration,
    creation_calls: AtomicUsize,
    assertion_calls: AtomicUsize,
}

impl ScriptedAuthenticator {
    pub fn approving() -> Self {
        Self {
            creation_results: Mutex::new(VecDeque::new()),
            assertion_results: Mutex::new(VecDeque::new()),
            assertion_requests: Mutex::new(Vec::new()),
            creation_gate: Semaphore::new(OPEN_GATE_PERMITS),
            latency: Duration::ZERO,
            creation_calls: AtomicUsize::new(0),
            assertion_calls: AtomicUsize::new(0),
        }
    }

    /// Credential creation blocks until [`Self::release_creation`] is called.
    pub fn gated() -> Self {
        Self {
            creation_gate: Semaphore::new(0),
            ..Self::approving()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn fail_next_creation(&self, err: BiometricError) {
        self.creation_results.lock().await.push_back(Err(err));
    }

    pub async fn fail_next_assertion(&self, err: BiometricError) {
        self.assertion_results.lock().await.push_back(Err(err));
    }

    pub fn release_creation(&self) {
        self.creation_gate.add_permits(1);
    }

    pub fn creation_calls(&self) -> usize {
        self.creation_calls.load(Ordering::SeqCst)
    }

    pub fn assertion_calls(&self) -> usize {
        self.assertion_calls.load(Ordering::SeqCst)
    }

    pub async fn assertion_requests(&self) -> Vec<AssertionRequest> {
        self.assertion_requests.lock().await.clone()
    }
}

#[async_trait]
impl BiometricAuthenticator for ScriptedAuthenticator {
    async fn create_credential(
        &self,
        request: CredentialCreationRequest,
    ) -> std::result::Result<Credential, BiometricError> {
        let call = self.creation_calls.fetch_add(1, Ordering::SeqCst) + 1;
        assert_eq!(request.challenge.len(), 32);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let permit = self.creation_gate.acquire().await.expect("gate open");
        permit.forget();

        match self.creation_results.lock().await.pop_front() {
            Some(scripted) => scripted,
            None => Ok(Credential {
                id: format!("cred-{call}"),
                raw_id: vec![call as u8; 16],
            }),
        }
    }

    async fn get_assertion(
        &self,
        request: AssertionRequest,
    ) -> std::result::Result<Assertion, BiometricError> {
        self.assertion_calls.fetch_add(1, Ordering::SeqCst);
        self.assertion_requests.lock().await.push(request.clone());
        let scripted = self.assertion_results.lock().await.pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(Assertion {
                credential_id: request.allowed_credentials[0].credential_id.clone(),
                signature: b"signature".to_vec(),
            }),
        }
    }
}

pub struct ScriptedSubmitter {
    fail_with: Option<String>,
    gate: Semaphore,
    requests: Mutex<Vec<TransferRequest>>,
}

impl ScriptedSubmitter {
    pub fn confirming() -> Self {
        Self {
            fail_with: None,
            gate: Semaphore::new(OPEN_GATE_PERMITS),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: impl Into<String>) -> Self {
        Self {
            fail_with: Some(err.into()),
            ..Self::confirming()
        }
    }

    /// Submissions block until [`Self::release`] is called.
    pub fn gated() -> Self {
        Self {
            gate: Semaphore::new(0),
            ..Self::confirming()
        }
    }

    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub async fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn wait_for_pending(&self, count: usize) {
        while self.requests.lock().await.len() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl TransferSubmitter for ScriptedSubmitter {
    async fn submit_transfer(&self, request: TransferRequest) -> Result<String> {
        let index = {
            let mut requests = self.requests.lock().await;
            requests.push(request);
            requests.len()
        };
        let permit = self.gate.acquire().await.expect("gate open");
        permit.forget();

        if let Some(err) = &self.fail_with {
            return Err(anyhow!(err.clone()));
        }
        Ok(format!("confirmed-{index}"))
    }
}
