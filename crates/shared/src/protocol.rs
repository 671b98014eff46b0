use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        Amount, BiometricHandle, FeeSponsorship, OnboardingPhase, Overlay, SessionStatus,
        Transaction, WalletAddress,
    },
    error::ErrorNotice,
};

/// Read-only projection of the session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_identity: Option<WalletAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biometric_handle: Option<BiometricHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_sponsorship: Option<FeeSponsorship>,
    pub balance: Amount,
    /// Newest first.
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub confirmation_reference: String,
    pub transaction: Transaction,
}

/// What a transfer would do, shown before the user is asked to authorize it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPreview {
    pub recipient: WalletAddress,
    pub amount: Amount,
    pub fee_sponsorship: FeeSponsorship,
    pub balance_after: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    StatusChanged { status: SessionStatus },
    TransactionRecorded { transaction: Transaction, balance: Amount },
    SessionCleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OnboardingView {
    pub phase: OnboardingPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<Overlay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorNotice>,
}
