//! Boundary capabilities the wallet core consumes but does not implement.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::RngCore;
use shared::domain::{BiometricHandle, FeeSponsorship, WalletAddress};
use thiserror::Error;

pub const CHALLENGE_LEN: usize = 32;
pub const USER_HANDLE_LEN: usize = 16;
pub const DEFAULT_CREDENTIAL_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_TRANSFER_LATENCY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BiometricError {
    #[error("user cancelled the biometric prompt")]
    UserCancelled,
    #[error("platform authenticator unavailable")]
    Unsupported,
    #[error("biometric prompt timed out")]
    Timeout,
}

/// COSE algorithm identifiers offered at credential creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoseAlgorithm {
    Es256,
    Rs256,
}

impl CoseAlgorithm {
    pub fn id(self) -> i32 {
        match self {
            Self::Es256 => -7,
            Self::Rs256 => -257,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserVerification {
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidentKey {
    Preferred,
}

#[derive(Debug, Clone)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CredentialUser {
    pub id: [u8; USER_HANDLE_LEN],
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct CredentialCreationRequest {
    pub challenge: [u8; CHALLENGE_LEN],
    pub relying_party: RelyingParty,
    pub user: CredentialUser,
    pub algorithms: Vec<CoseAlgorithm>,
    pub user_verification: UserVerification,
    pub resident_key: ResidentKey,
    pub timeout: Duration,
}

impl CredentialCreationRequest {
    /// Fresh random challenge and user handle, ES256 then RS256, verification required.
    pub fn new(relying_party: RelyingParty, name: &str, display_name: &str, timeout: Duration) -> Self {
        let mut user_id = [0u8; USER_HANDLE_LEN];
        rand::thread_rng().fill_bytes(&mut user_id);
        Self {
            challenge: random_challenge(),
            relying_party,
            user: CredentialUser {
                id: user_id,
                name: name.to_string(),
                display_name: display_name.to_string(),
            },
            algorithms: vec![CoseAlgorithm::Es256, CoseAlgorithm::Rs256],
            user_verification: UserVerification::Required,
            resident_key: ResidentKey::Preferred,
            timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssertionRequest {
    pub challenge: [u8; CHALLENGE_LEN],
    pub allowed_credentials: Vec<BiometricHandle>,
    pub user_verification: UserVerification,
    pub timeout: Duration,
}

impl AssertionRequest {
    pub fn for_handle(handle: &BiometricHandle, timeout: Duration) -> Self {
        Self {
            challenge: random_challenge(),
            allowed_credentials: vec![handle.clone()],
            user_verification: UserVerification::Required,
            timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub raw_id: Vec<u8>,
}

impl From<Credential> for BiometricHandle {
    fn from(value: Credential) -> Self {
        Self {
            credential_id: value.id,
            raw_id: value.raw_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub credential_id: String,
    pub signature: Vec<u8>,
}

fn random_challenge() -> [u8; CHALLENGE_LEN] {
    let mut challenge = [0u8; CHALLENGE_LEN];
    rand::thread_rng().fill_bytes(&mut challenge);
    challenge
}

#[async_trait]
pub trait BiometricAuthenticator: Send + Sync {
    async fn create_credential(
        &self,
        request: CredentialCreationRequest,
    ) -> std::result::Result<Credential, BiometricError>;
    async fn get_assertion(
        &self,
        request: AssertionRequest,
    ) -> std::result::Result<Assertion, BiometricError>;
}

pub struct MissingBiometricAuthenticator;

#[async_trait]
impl BiometricAuthenticator for MissingBiometricAuthenticator {
    async fn create_credential(
        &self,
        _request: CredentialCreationRequest,
    ) -> std::result::Result<Credential, BiometricError> {
        Err(BiometricError::Unsupported)
    }

    async fn get_assertion(
        &self,
        _request: AssertionRequest,
    ) -> std::result::Result<Assertion, BiometricError> {
        Err(BiometricError::Unsupported)
    }
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender: WalletAddress,
    pub recipient: WalletAddress,
    /// Token mint, opaque to the core.
    pub mint: String,
    /// Integer minor units of the token.
    pub amount: u64,
    pub fee_sponsorship: FeeSponsorship,
}

#[async_trait]
pub trait TransferSubmitter: Send + Sync {
    /// Returns the confirmation reference of the submitted transfer.
    async fn submit_transfer(&self, request: TransferRequest) -> Result<String>;
}

pub struct MissingTransferSubmitter;

#[async_trait]
impl TransferSubmitter for MissingTransferSubmitter {
    async fn submit_transfer(&self, _request: TransferRequest) -> Result<String> {
        Err(anyhow!("transfer backend is unavailable"))
    }
}

/// Pretends to relay a sponsored transfer and hands back a mock signature.
pub struct SimulatedTransferSubmitter {
    latency: Duration,
}

impl SimulatedTransferSubmitter {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedTransferSubmitter {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSFER_LATENCY)
    }
}

#[async_trait]
impl TransferSubmitter for SimulatedTransferSubmitter {
    async fn submit_transfer(&self, request: TransferRequest) -> Result<String> {
        if request.amount == 0 {
            return Err(anyhow!("transfer amount must be non-zero"));
        }
        tokio::time::sleep(self.latency).await;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        tracing::debug!(
            sender = %request.sender,
            recipient = %request.recipient,
            amount = request.amount,
            sponsored = request.fee_sponsorship == FeeSponsorship::Sponsored,
            "simulated transfer relayed"
        );
        Ok(format!("5xKqXiGaslessTx_{millis}_WebAuthn"))
    }
}
