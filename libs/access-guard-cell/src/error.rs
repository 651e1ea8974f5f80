// libs/access-guard-cell/src/error.rs
use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("Not authorized for this area")]
    Unauthorized,

    #[error("Onboarding status unavailable: {0}")]
    StatusUnavailable(String),
}

impl GuardError {
    pub fn user_message(&self) -> &'static str {
        match self {
            GuardError::Unauthorized => "You are not authorized to access this page.",
            GuardError::StatusUnavailable(_) => "We could not check your account status. Please try again.",
        }
    }
}

impl From<GuardError> for AppError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Unauthorized => AppError::Forbidden(err.user_message().to_string()),
            GuardError::StatusUnavailable(_) => AppError::ExternalService(err.user_message().to_string()),
        }
    }
}
