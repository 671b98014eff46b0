use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use shared::domain::{Amount, FeeSponsorship};
use wallet_core::{DwellTimings, SessionSettings};

pub const DEFAULT_CONFIG_PATH: &str = "passpay.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rp_id: String,
    pub rp_name: String,
    pub user_name: String,
    pub user_display_name: String,
    /// Decimal USDC amount credited on connect.
    pub seed_balance: String,
    /// `sponsored`/`paymaster` or `none`/`self`.
    pub fee_mode: String,
    pub prompt_dwell_ms: u64,
    pub provisioning_dwell_ms: u64,
    pub success_dwell_ms: u64,
    pub transfer_latency_ms: u64,
    pub biometric_latency_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        let session = SessionSettings::default();
        let timings = DwellTimings::default();
        Self {
            rp_id: session.relying_party_id,
            rp_name: session.relying_party_name,
            user_name: session.user_name,
            user_display_name: session.user_display_name,
            seed_balance: session.seed_balance.to_string(),
            fee_mode: "sponsored".into(),
            prompt_dwell_ms: duration_ms(timings.prompt),
            provisioning_dwell_ms: duration_ms(timings.provisioning),
            success_dwell_ms: duration_ms(timings.success),
            transfer_latency_ms: 1500,
            biometric_latency_ms: 400,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn seed_balance(&self) -> Result<Amount> {
        Amount::parse(&self.seed_balance)
            .with_context(|| format!("invalid seed_balance '{}'", self.seed_balance))
    }

    pub fn fee_sponsorship(&self) -> Result<FeeSponsorship> {
        self.fee_mode
            .parse()
            .map_err(|err: String| anyhow!(err))
            .with_context(|| format!("invalid fee_mode '{}'", self.fee_mode))
    }

    pub fn session_settings(&self) -> Result<SessionSettings> {
        Ok(SessionSettings {
            relying_party_id: self.rp_id.clone(),
            relying_party_name: self.rp_name.clone(),
            user_name: self.user_name.clone(),
            user_display_name: self.user_display_name.clone(),
            seed_balance: self.seed_balance()?,
            ..SessionSettings::default()
        })
    }

    pub fn dwell_timings(&self) -> DwellTimings {
        DwellTimings {
            prompt: Duration::from_millis(self.prompt_dwell_ms),
            provisioning: Duration::from_millis(self.provisioning_dwell_ms),
            success: Duration::from_millis(self.success_dwell_ms),
        }
    }

    pub fn transfer_latency(&self) -> Duration {
        Duration::from_millis(self.transfer_latency_ms)
    }

    pub fn biometric_latency(&self) -> Duration {
        Duration::from_millis(self.biometric_latency_ms)
    }
}

/// Reads `path` (or `passpay.toml` when present), then applies `PASSPAY__*` overrides.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

fn load_settings_with(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                read_settings_file(&default_path)?
            } else {
                Settings::default()
            }
        }
    };

    apply_env_overrides(&mut settings, env)?;

    settings.seed_balance()?;
    settings.fee_sponsorship()?;
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse config file '{}'", path.display()))
}

fn apply_env_overrides(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(v) = env("PASSPAY__RP_ID") {
        settings.rp_id = v;
    }
    if let Some(v) = env("PASSPAY__SEED_BALANCE") {
        settings.seed_balance = v;
    }
    if let Some(v) = env("PASSPAY__FEE_MODE") {
        settings.fee_mode = v;
    }
    if let Some(v) = env("PASSPAY__LOG_FILTER") {
        settings.log_filter = v;
    }

    for (key, target) in [
        ("PASSPAY__PROMPT_DWELL_MS", &mut settings.prompt_dwell_ms),
        ("PASSPAY__PROVISIONING_DWELL_MS", &mut settings.provisioning_dwell_ms),
        ("PASSPAY__SUCCESS_DWELL_MS", &mut settings.success_dwell_ms),
        ("PASSPAY__TRANSFER_LATENCY_MS", &mut settings.transfer_latency_ms),
    ] {
        if let Some(v) = env(key) {
            *target = v
                .trim()
                .parse()
                .with_context(|| format!("{key} must be a whole number of milliseconds"))?;
        }
    }

    Ok(())
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
