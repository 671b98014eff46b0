use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AuthenticationDenied,
    AuthenticationUnsupported,
    SessionBusy,
    InvalidRecipient,
    InvalidAmount,
    NotConnected,
    TransferRejected,
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("biometric authentication was cancelled or declined")]
    AuthenticationDenied,
    #[error("biometric authentication is not supported on this platform")]
    AuthenticationUnsupported,
    #[error("a session is already being established")]
    SessionBusy,
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("no active wallet session")]
    NotConnected,
    #[error("transfer was rejected: {0}")]
    TransferRejected(String),
    /// The session was torn down while the operation was pending.
    #[error("session was torn down before the operation completed")]
    Superseded,
}

impl WalletError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthenticationDenied => ErrorCode::AuthenticationDenied,
            Self::AuthenticationUnsupported => ErrorCode::AuthenticationUnsupported,
            Self::SessionBusy => ErrorCode::SessionBusy,
            Self::InvalidRecipient(_) => ErrorCode::InvalidRecipient,
            Self::InvalidAmount(_) => ErrorCode::InvalidAmount,
            Self::NotConnected => ErrorCode::NotConnected,
            Self::TransferRejected(_) => ErrorCode::TransferRejected,
            Self::Superseded => ErrorCode::Superseded,
        }
    }

    /// The caller should offer a non-biometric path.
    pub fn suggests_alternative(&self) -> bool {
        matches!(self, Self::AuthenticationUnsupported)
    }

    /// `NotConnected` is a caller bug; everything else can be shown and retried.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::NotConnected)
    }
}

/// Serializable form handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&WalletError> for ErrorNotice {
    fn from(value: &WalletError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}
