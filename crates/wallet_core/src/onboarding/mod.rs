//! Onboarding sequence: events, reducer-like state transitions, and the async driver.

pub mod events;
pub mod orchestration;
pub mod reducer;

pub use events::{DwellTimings, OnboardingEvent, OnboardingNotice};
pub use orchestration::{OnboardingController, OnboardingError};
pub use reducer::OnboardingMachine;
