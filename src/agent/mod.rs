//! Registration coordination and retry scheduling

pub mod registration;
pub mod retry;

pub use registration::{RegistrationOutcome, RegistrationService};
pub use retry::{RetryAction, RetryScheduler};
