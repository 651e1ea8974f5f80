pub mod guard;
pub mod service;
pub mod source;

pub use guard::AccessGuard;
pub use service::AccessGuardService;
pub use source::{OnboardingStatusSource, RestOnboardingStatusSource};
