pub mod capabilities;
pub mod onboarding;
pub mod session_store;

pub use capabilities::{
    BiometricAuthenticator, BiometricError, MissingBiometricAuthenticator,
    MissingTransferSubmitter, SimulatedTransferSubmitter, TransferRequest, TransferSubmitter,
};
pub use onboarding::{DwellTimings, OnboardingController, OnboardingError, OnboardingNotice};
pub use session_store::{EstablishOptions, SessionSettings, SessionStore};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
