use std::{
    io::{self, BufRead, Write},
    time::Duration,
};

use async_trait::async_trait;
use rand::RngCore;
use tracing::{debug, warn};
use wallet_core::{
    capabilities::{Assertion, AssertionRequest, Credential, CredentialCreationRequest},
    BiometricAuthenticator, BiometricError,
};

const CREDENTIAL_ID_LEN: usize = 16;
const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPolicy {
    AutoApprove,
    /// Every prompt is dismissed, as if the user cancelled it.
    Deny,
    /// Asks on the terminal.
    Interactive,
}

/// Stands in for the platform authenticator of the device.
pub struct SimulatedBiometricAuthenticator {
    policy: ApprovalPolicy,
    latency: Duration,
}

impl SimulatedBiometricAuthenticator {
    pub fn new(policy: ApprovalPolicy, latency: Duration) -> Self {
        Self { policy, latency }
    }

    async fn confirm(&self, prompt: String, timeout: Duration) -> Result<(), BiometricError> {
        match self.policy {
            ApprovalPolicy::AutoApprove => {
                tokio::time::sleep(self.latency).await;
                Ok(())
            }
            ApprovalPolicy::Deny => {
                tokio::time::sleep(self.latency).await;
                Err(BiometricError::UserCancelled)
            }
            ApprovalPolicy::Interactive => {
                let answer = tokio::task::spawn_blocking(move || ask(&prompt));
                match tokio::time::timeout(timeout, answer).await {
                    Err(_) => Err(BiometricError::Timeout),
                    Ok(Ok(Ok(true))) => Ok(()),
                    Ok(Ok(Ok(false))) => Err(BiometricError::UserCancelled),
                    Ok(Ok(Err(err))) => {
                        warn!(error = %err, "biometrics: terminal prompt unavailable");
                        Err(BiometricError::Unsupported)
                    }
                    Ok(Err(err)) => {
                        warn!(error = %err, "biometrics: prompt task failed");
                        Err(BiometricError::Unsupported)
                    }
                }
            }
        }
    }
}

fn ask(prompt: &str) -> io::Result<bool> {
    let mut stdout = io::stdout();
    write!(stdout, "{prompt} [y/N] ")?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(is_approval(&line))
}

fn is_approval(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[async_trait]
impl BiometricAuthenticator for SimulatedBiometricAuthenticator {
    async fn create_credential(
        &self,
        request: CredentialCreationRequest,
    ) -> Result<Credential, BiometricError> {
        let prompt = format!(
            "Create a passkey for {} on {}?",
            request.user.display_name, request.relying_party.id
        );
        self.confirm(prompt, request.timeout).await?;

        let raw_id = random_bytes(CREDENTIAL_ID_LEN);
        let id = hex(&raw_id);
        debug!(credential = %id, "biometrics: credential created");
        Ok(Credential { id, raw_id })
    }

    async fn get_assertion(&self, request: AssertionRequest) -> Result<Assertion, BiometricError> {
        let Some(handle) = request.allowed_credentials.first() else {
            return Err(BiometricError::Unsupported);
        };
        let credential_id = handle.credential_id.clone();
        self.confirm(
            "Confirm this transfer with your biometrics?".to_string(),
            request.timeout,
        )
        .await?;

        Ok(Assertion {
            credential_id,
            signature: random_bytes(SIGNATURE_LEN),
        })
    }
}
