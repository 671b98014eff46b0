use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use shared::{
    domain::{FeeSponsorship, OnboardingPhase, Overlay, USDC_SYMBOL},
    error::WalletError,
    protocol::{SessionSnapshot, TransferPreview},
};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wallet_core::{
    EstablishOptions, OnboardingController, OnboardingNotice, SessionStore,
    SimulatedTransferSubmitter,
};

mod biometrics;
mod config;

use biometrics::{ApprovalPolicy, SimulatedBiometricAuthenticator};
use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "passpay", about = "Gasless USDC wallet with biometric sign-in")]
struct Args {
    /// Settings file; defaults to ./passpay.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ask on the terminal before every biometric prompt.
    #[arg(long, conflicts_with = "deny_biometrics")]
    interactive: bool,
    /// Behave as if the user dismissed every biometric prompt.
    #[arg(long)]
    deny_biometrics: bool,
    #[arg(long, requires = "amount")]
    send_to: Option<String>,
    #[arg(long, requires = "send_to")]
    amount: Option<String>,
    #[arg(long, requires = "receive_amount")]
    receive_from: Option<String>,
    #[arg(long, requires = "receive_from")]
    receive_amount: Option<String>,
    /// Disconnect the wallet before exiting.
    #[arg(long)]
    disconnect: bool,
}

impl Args {
    fn approval_policy(&self) -> ApprovalPolicy {
        if self.deny_biometrics {
            ApprovalPolicy::Deny
        } else if self.interactive {
            ApprovalPolicy::Interactive
        } else {
            ApprovalPolicy::AutoApprove
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let fee_sponsorship = settings.fee_sponsorship()?;
    let store = SessionStore::new_with_dependencies(
        settings.session_settings()?,
        Arc::new(SimulatedBiometricAuthenticator::new(
            args.approval_policy(),
            settings.biometric_latency(),
        )),
        Arc::new(SimulatedTransferSubmitter::new(settings.transfer_latency())),
    );
    let controller = OnboardingController::spawn(
        Arc::clone(&store),
        settings.dwell_timings(),
        EstablishOptions { fee_sponsorship },
    );

    let mut notices = controller.subscribe_notices();
    controller.start()?;
    if let Err(err) = follow_onboarding(&mut notices).await? {
        println!("Sign-in failed: {err}");
        if err.suggests_alternative() {
            println!("This device has no platform authenticator; try another device or browser.");
        }
        return Err(err).context("onboarding did not complete");
    }
    controller
        .wait_for_phase(OnboardingPhase::Dashboard)
        .await?;
    print_header(&store.snapshot());

    if let (Some(recipient), Some(amount)) = (&args.send_to, &args.amount) {
        controller.open_overlay(Overlay::Send)?;
        let sent = match store.preview_transfer(recipient, amount) {
            Ok(preview) => {
                print_preview(&preview);
                store.submit_transfer(recipient, amount).await
            }
            Err(err) => Err(err),
        };
        controller.close_overlay()?;
        match sent {
            Ok(receipt) => println!(
                "Sent {} {USDC_SYMBOL} to {}, signature {}",
                receipt.transaction.amount,
                receipt.transaction.counterparty_address.short(),
                receipt.confirmation_reference
            ),
            Err(err) => report_transfer_error("send", &err),
        }
    }

    if let (Some(sender), Some(amount)) = (&args.receive_from, &args.receive_amount) {
        controller.open_overlay(Overlay::Receive)?;
        let reference = format!("incoming_{}", shared::domain::TransactionId::new());
        let received = store.credit_incoming(sender, amount, reference);
        controller.close_overlay()?;
        match received {
            Ok(transaction) => println!(
                "Received {} {USDC_SYMBOL} from {}",
                transaction.amount,
                transaction.counterparty_address.short()
            ),
            Err(err) => report_transfer_error("receive", &err),
        }
    }

    println!("{}", serde_json::to_string_pretty(&store.snapshot())?);

    if args.disconnect {
        controller.disconnect()?;
        controller.wait_for_phase(OnboardingPhase::Intro).await?;
        println!("Wallet disconnected");
    }

    Ok(())
}

/// Prints phases as they are entered until the dashboard is reached or onboarding fails.
async fn follow_onboarding(
    notices: &mut broadcast::Receiver<OnboardingNotice>,
) -> Result<Result<(), WalletError>> {
    loop {
        match notices.recv().await {
            Ok(OnboardingNotice::PhaseChanged(phase)) => {
                println!("{}", describe_phase(phase));
                if phase == OnboardingPhase::Dashboard {
                    return Ok(Ok(()));
                }
            }
            Ok(OnboardingNotice::Failed(err)) => return Ok(Err(err)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "onboarding notices lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                anyhow::bail!("onboarding controller stopped unexpectedly")
            }
        }
    }
}

fn describe_phase(phase: OnboardingPhase) -> &'static str {
    match phase {
        OnboardingPhase::Intro => "Welcome to PassPay",
        OnboardingPhase::BiometricPrompt => "Touch the sensor to create your passkey...",
        OnboardingPhase::Provisioning => "Provisioning your smart wallet...",
        OnboardingPhase::Success => "Wallet ready",
        OnboardingPhase::Dashboard => "Dashboard",
    }
}

fn print_header(snapshot: &SessionSnapshot) {
    let Some(wallet) = &snapshot.wallet_identity else {
        return;
    };
    let gas = match snapshot.fee_sponsorship {
        Some(FeeSponsorship::Sponsored) => "sponsored",
        _ => "paid by wallet",
    };
    info!(wallet = %wallet, "wallet connected");
    println!(
        "{} | {} {USDC_SYMBOL} | gas {gas}",
        wallet.short(),
        snapshot.balance
    );
}

fn print_preview(preview: &TransferPreview) {
    println!("To:      {}", preview.recipient);
    println!("Amount:  {} {USDC_SYMBOL}", preview.amount);
    match preview.fee_sponsorship {
        FeeSponsorship::Sponsored => println!("Network fee: 0 (paymaster sponsors all transaction fees)"),
        FeeSponsorship::None => println!("Network fee: paid by this wallet"),
    }
    println!("Balance after: {} {USDC_SYMBOL}", preview.balance_after);
}

fn report_transfer_error(action: &str, err: &WalletError) {
    warn!(action, error = %err, code = ?err.code(), "transfer failed");
    println!("Could not {action}: {err}");
}
