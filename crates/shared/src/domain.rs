use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WalletError;

/// Number of fractional digits carried by the tracked stablecoin (USDC).
pub const USDC_DECIMALS: u32 = 6;
pub const USDC_SYMBOL: &str = "USDC";
/// USDC mint on devnet.
pub const USDC_DEVNET_MINT: &str = "4zMMC9srt5Ri5X14Gr934z2uirKHXoTqmbMWj5gJsYx";

const ADDRESS_LEN: usize = 32;
const MINOR_PER_UNIT: u64 = 10u64.pow(USDC_DECIMALS);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSponsorship {
    None,
    /// Network fees are paid by the paymaster.
    #[default]
    Sponsored,
}

impl FromStr for FeeSponsorship {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" | "self" => Ok(Self::None),
            "sponsored" | "paymaster" => Ok(Self::Sponsored),
            other => Err(format!("unknown fee sponsorship mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Confirmed,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingPhase {
    #[default]
    Intro,
    BiometricPrompt,
    Provisioning,
    Success,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overlay {
    Send,
    Receive,
}

/// Base58 text of a 32-byte public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn parse(raw: &str) -> Result<Self, WalletError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(WalletError::InvalidRecipient("address is empty".into()));
        }
        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|err| WalletError::InvalidRecipient(format!("{trimmed}: {err}")))?;
        if bytes.len() != ADDRESS_LEN {
            return Err(WalletError::InvalidRecipient(format!(
                "{trimmed}: expected {ADDRESS_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn from_bytes(bytes: &[u8; ADDRESS_LEN]) -> Self {
        Self(bs58::encode(bytes).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `XXXX...YYYY` form used in headers.
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return self.0.clone();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = WalletError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

/// Stablecoin amount held as integer minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor_units(minor: u64) -> Self {
        Self(minor)
    }

    pub fn minor_units(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn parse(raw: &str) -> Result<Self, WalletError> {
        let trimmed = raw.trim();
        let invalid = |reason: &str| WalletError::InvalidAmount(format!("'{trimmed}': {reason}"));

        if trimmed.is_empty() {
            return Err(invalid("amount is empty"));
        }
        if trimmed.starts_with('-') {
            return Err(invalid("amount must be positive"));
        }
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let (whole, fraction) = match unsigned.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (unsigned, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("not a number"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("not a number"));
        }
        if fraction.len() > USDC_DECIMALS as usize {
            return Err(invalid("too many decimal places"));
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u64>().map_err(|_| invalid("amount too large"))?
        };
        let padded = format!("{fraction:0<width$}", width = USDC_DECIMALS as usize);
        let fraction_units = padded.parse::<u64>().map_err(|_| invalid("not a number"))?;

        whole_units
            .checked_mul(MINOR_PER_UNIT)
            .and_then(|minor| minor.checked_add(fraction_units))
            .map(Amount)
            .ok_or_else(|| invalid("amount too large"))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MINOR_PER_UNIT;
        let fraction = format!(
            "{:0width$}",
            self.0 % MINOR_PER_UNIT,
            width = USDC_DECIMALS as usize
        );
        let trimmed = fraction.trim_end_matches('0');
        let shown = if trimmed.len() < 2 { &fraction[..2] } else { trimmed };
        write!(f, "{whole}.{shown}")
    }
}

impl FromStr for Amount {
    type Err = WalletError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl TryFrom<String> for Amount {
    type Error = WalletError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.to_string()
    }
}

/// Opaque reference to the platform credential a session was established with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricHandle {
    pub credential_id: String,
    #[serde(skip)]
    pub raw_id: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub direction: Direction,
    pub amount: Amount,
    pub token: String,
    pub counterparty_address: WalletAddress,
    pub confirmation_reference: String,
    pub created_at: DateTime<Utc>,
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn confirmed(
        direction: Direction,
        amount: Amount,
        counterparty_address: WalletAddress,
        confirmation_reference: impl Into<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            direction,
            amount,
            token: USDC_SYMBOL.to_string(),
            counterparty_address,
            confirmation_reference: confirmation_reference.into(),
            created_at: Utc::now(),
            status: TransactionStatus::Confirmed,
        }
    }
}
