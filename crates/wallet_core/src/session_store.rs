use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use sha2::{Digest, Sha256};
use shared::{
    domain::{
        Amount, BiometricHandle, Direction, FeeSponsorship, SessionStatus, Transaction,
        WalletAddress, USDC_DEVNET_MINT,
    },
    error::WalletError,
    protocol::{SessionEvent, SessionSnapshot, TransferPreview, TransferReceipt},
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::capabilities::{
    AssertionRequest, BiometricAuthenticator, BiometricError, CredentialCreationRequest,
    MissingBiometricAuthenticator, MissingTransferSubmitter, RelyingParty, TransferRequest,
    TransferSubmitter, DEFAULT_CREDENTIAL_TIMEOUT,
};

const SMART_WALLET_DERIVATION_TAG: &[u8] = b"passpay/smart-wallet/v1";
/// 150.75 USDC.
const DEFAULT_SEED_BALANCE: Amount = Amount::from_minor_units(150_750_000);

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub relying_party_id: String,
    pub relying_party_name: String,
    pub user_name: String,
    pub user_display_name: String,
    pub seed_balance: Amount,
    pub token_mint: String,
    pub credential_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            relying_party_id: "localhost".into(),
            relying_party_name: "PassPay".into(),
            user_name: "demo@passpay.local".into(),
            user_display_name: "Demo User".into(),
            seed_balance: DEFAULT_SEED_BALANCE,
            token_mint: USDC_DEVNET_MINT.into(),
            credential_timeout: DEFAULT_CREDENTIAL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EstablishOptions {
    pub fee_sponsorship: FeeSponsorship,
}

struct ActiveSession {
    wallet: WalletAddress,
    handle: BiometricHandle,
    fee_sponsorship: FeeSponsorship,
    balance: Amount,
    transactions: VecDeque<Transaction>,
}

impl ActiveSession {
    /// Checks recipient, then amount, against the current balance.
    fn preview_outgoing(&self, recipient: &str, amount: &str) -> Result<TransferPreview, WalletError> {
        let recipient = WalletAddress::parse(recipient)?;
        let amount = Amount::parse(amount)?;
        if amount.is_zero() {
            return Err(WalletError::InvalidAmount(
                "amount must be greater than zero".into(),
            ));
        }
        let balance_after = self.balance.checked_sub(amount).ok_or_else(|| {
            WalletError::InvalidAmount(format!("{amount} exceeds balance {}", self.balance))
        })?;
        Ok(TransferPreview {
            recipient,
            amount,
            fee_sponsorship: self.fee_sponsorship,
            balance_after,
        })
    }

    /// Computes the new balance before touching anything, then applies balance and
    /// history together.
    fn record(&mut self, transaction: Transaction) -> Result<Amount, WalletError> {
        let balance = match transaction.direction {
            Direction::Outgoing => self.balance.checked_sub(transaction.amount).ok_or_else(|| {
                WalletError::InvalidAmount(format!(
                    "{} exceeds balance {}",
                    transaction.amount, self.balance
                ))
            })?,
            Direction::Incoming => self
                .balance
                .checked_add(transaction.amount)
                .ok_or_else(|| WalletError::InvalidAmount("balance overflow".into()))?,
        };
        self.transactions.push_front(transaction);
        self.balance = balance;
        Ok(balance)
    }
}

#[derive(Default)]
struct SessionState {
    status: SessionStatus,
    /// Bumped on every teardown; pending work started under an older value is discarded.
    generation: u64,
    active: Option<ActiveSession>,
}

pub struct SessionStore {
    authenticator: Arc<dyn BiometricAuthenticator>,
    submitter: Arc<dyn TransferSubmitter>,
    settings: SessionSettings,
    inner: Mutex<SessionState>,
    status: watch::Sender<SessionStatus>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(settings: SessionSettings) -> Arc<Self> {
        Self::new_with_dependencies(
            settings,
            Arc::new(MissingBiometricAuthenticator),
            Arc::new(MissingTransferSubmitter),
        )
    }

    pub fn new_with_dependencies(
        settings: SessionSettings,
        authenticator: Arc<dyn BiometricAuthenticator>,
        submitter: Arc<dyn TransferSubmitter>,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(SessionStatus::Disconnected);
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            authenticator,
            submitter,
            settings,
            inner: Mutex::new(SessionState::default()),
            status,
            events,
        })
    }

    pub fn status(&self) -> SessionStatus {
        self.lock_state().status
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        match &state.active {
            Some(active) => SessionSnapshot {
                status: state.status,
                wallet_identity: Some(active.wallet.clone()),
                biometric_handle: Some(active.handle.clone()),
                fee_sponsorship: Some(active.fee_sponsorship),
                balance: active.balance,
                transactions: active.transactions.iter().cloned().collect(),
            },
            None => SessionSnapshot {
                status: state.status,
                ..SessionSnapshot::default()
            },
        }
    }

    pub async fn establish_session(
        &self,
        options: EstablishOptions,
    ) -> Result<WalletAddress, WalletError> {
        let generation = {
            let mut state = self.lock_state();
            match (state.status, state.active.as_ref()) {
                (SessionStatus::Connecting, _) => {
                    warn!("session: establish rejected, another attempt is in flight");
                    return Err(WalletError::SessionBusy);
                }
                (SessionStatus::Connected, Some(active)) => {
                    debug!(wallet = %active.wallet, "session: already connected");
                    return Ok(active.wallet.clone());
                }
                _ => {}
            }
            self.set_status(&mut state, SessionStatus::Connecting);
            state.generation
        };

        let mut guard = EstablishGuard {
            store: self,
            generation,
            armed: true,
        };
        info!(
            rp_id = %self.settings.relying_party_id,
            fee_sponsorship = ?options.fee_sponsorship,
            "session: requesting platform credential"
        );
        let request = CredentialCreationRequest::new(
            RelyingParty {
                id: self.settings.relying_party_id.clone(),
                name: self.settings.relying_party_name.clone(),
            },
            &self.settings.user_name,
            &self.settings.user_display_name,
            self.settings.credential_timeout,
        );
        let outcome = self.authenticator.create_credential(request).await;
        guard.armed = false;

        let mut state = self.lock_state();
        if state.generation != generation {
            info!("session: discarding credential result, session was torn down meanwhile");
            return Err(WalletError::Superseded);
        }

        match outcome {
            Ok(credential) => {
                let wallet = derive_smart_wallet_address(&credential.raw_id);
                info!(wallet = %wallet, credential = %credential.id, "session: connected");
                state.active = Some(ActiveSession {
                    wallet: wallet.clone(),
                    handle: credential.into(),
                    fee_sponsorship: options.fee_sponsorship,
                    balance: self.settings.seed_balance,
                    transactions: VecDeque::new(),
                });
                self.set_status(&mut state, SessionStatus::Connected);
                Ok(wallet)
            }
            Err(err) => {
                warn!(error = %err, "session: biometric credential creation failed");
                self.set_status(&mut state, SessionStatus::Disconnected);
                Err(map_biometric_error(err))
            }
        }
    }

    pub fn teardown_session(&self) {
        let mut state = self.lock_state();
        state.generation += 1;
        let had_session = state.active.take().is_some();
        if state.status != SessionStatus::Disconnected {
            self.set_status(&mut state, SessionStatus::Disconnected);
        }
        if had_session {
            info!("session: wallet disconnected");
            let _ = self.events.send(SessionEvent::SessionCleared);
        }
    }

    /// Validates a transfer exactly as [`Self::submit_transfer`] would, without
    /// prompting or changing anything.
    pub fn preview_transfer(
        &self,
        recipient: &str,
        amount: &str,
    ) -> Result<TransferPreview, WalletError> {
        let state = self.lock_state();
        let active = state.active.as_ref().ok_or(WalletError::NotConnected)?;
        active.preview_outgoing(recipient, amount)
    }

    pub async fn submit_transfer(
        &self,
        recipient: &str,
        amount: &str,
    ) -> Result<TransferReceipt, WalletError> {
        let (generation, sender, handle, fee_sponsorship, recipient, amount) = {
            let state = self.lock_state();
            let active = state.active.as_ref().ok_or(WalletError::NotConnected)?;
            let preview = active.preview_outgoing(recipient, amount)?;
            (
                state.generation,
                active.wallet.clone(),
                active.handle.clone(),
                active.fee_sponsorship,
                preview.recipient,
                preview.amount,
            )
        };

        info!(recipient = %recipient, amount = %amount, "session: requesting transfer authorization");
        let assertion = self
            .authenticator
            .get_assertion(AssertionRequest::for_handle(
                &handle,
                self.settings.credential_timeout,
            ))
            .await
            .map_err(|err| {
                warn!(error = %err, "session: transfer authorization failed");
                map_biometric_error(err)
            })?;
        debug!(credential = %assertion.credential_id, "session: transfer authorized");
        self.ensure_generation(generation)?;

        let reference = self
            .submitter
            .submit_transfer(TransferRequest {
                sender,
                recipient: recipient.clone(),
                mint: self.settings.token_mint.clone(),
                amount: amount.minor_units(),
                fee_sponsorship,
            })
            .await
            .map_err(|err| {
                warn!(error = %err, "session: transfer submission failed");
                WalletError::TransferRejected(err.to_string())
            })?;

        let transaction =
            Transaction::confirmed(Direction::Outgoing, amount, recipient, reference.clone());
        let balance = self.record(generation, transaction.clone()).map_err(|err| {
            if err == WalletError::Superseded {
                warn!(reference = %reference, "session: transfer confirmed after teardown, result discarded");
            }
            err
        })?;
        info!(reference = %reference, balance = %balance, "session: transfer confirmed");

        Ok(TransferReceipt {
            confirmation_reference: reference,
            transaction,
        })
    }

    /// Records funds received from `sender`.
    pub fn credit_incoming(
        &self,
        sender: &str,
        amount: &str,
        confirmation_reference: impl Into<String>,
    ) -> Result<Transaction, WalletError> {
        let generation = {
            let state = self.lock_state();
            if state.active.is_none() {
                return Err(WalletError::NotConnected);
            }
            state.generation
        };
        let sender = WalletAddress::parse(sender)?;
        let amount = Amount::parse(amount)?;
        if amount.is_zero() {
            return Err(WalletError::InvalidAmount(
                "amount must be greater than zero".into(),
            ));
        }

        let transaction =
            Transaction::confirmed(Direction::Incoming, amount, sender, confirmation_reference);
        let balance = self.record(generation, transaction.clone())?;
        info!(amount = %amount, balance = %balance, "session: incoming transfer recorded");
        Ok(transaction)
    }

    fn record(&self, generation: u64, transaction: Transaction) -> Result<Amount, WalletError> {
        let mut state = self.lock_state();
        if state.generation != generation {
            return Err(WalletError::Superseded);
        }
        let active = state.active.as_mut().ok_or(WalletError::Superseded)?;
        let balance = active.record(transaction.clone())?;
        let _ = self
            .events
            .send(SessionEvent::TransactionRecorded { transaction, balance });
        Ok(balance)
    }

    fn ensure_generation(&self, generation: u64) -> Result<(), WalletError> {
        if self.lock_state().generation == generation {
            Ok(())
        } else {
            Err(WalletError::Superseded)
        }
    }

    fn set_status(&self, state: &mut SessionState, status: SessionStatus) {
        state.status = status;
        self.status.send_replace(status);
        let _ = self.events.send(SessionEvent::StatusChanged { status });
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the store to `Disconnected` if an establish future is dropped mid-prompt.
struct EstablishGuard<'a> {
    store: &'a SessionStore,
    generation: u64,
    armed: bool,
}

impl Drop for EstablishGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.store.lock_state();
        if state.generation == self.generation && state.status == SessionStatus::Connecting {
            warn!("session: establish abandoned before the credential resolved");
            self.store
                .set_status(&mut state, SessionStatus::Disconnected);
        }
    }
}

fn map_biometric_error(err: BiometricError) -> WalletError {
    match err {
        BiometricError::UserCancelled | BiometricError::Timeout => {
            WalletError::AuthenticationDenied
        }
        BiometricError::Unsupported => WalletError::AuthenticationUnsupported,
    }
}

fn derive_smart_wallet_address(raw_credential_id: &[u8]) -> WalletAddress {
    let mut hasher = Sha256::new();
    hasher.update(SMART_WALLET_DERIVATION_TAG);
    hasher.update(raw_credential_id);
    let digest: [u8; 32] = hasher.finalize().into();
    WalletAddress::from_bytes(&digest)
}

#[cfg(test)]
#[path = "tests/session_store_tests.rs"]
mod tests;
