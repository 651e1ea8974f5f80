// libs/consultation-session-cell/src/error.rs
use thiserror::Error;

use shared_models::error::AppError;
use shared_models::toast::Toast;
use video_conferencing_cell::MediaError;

use crate::models::ConsultationStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No consultation session is active")]
    NoActiveSession,

    #[error("Consultation {consultation_id} is already in progress")]
    AlreadyActive { consultation_id: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session belongs to another user")]
    NotSessionOwner,

    #[error("Access denied, redirect to {redirect_to}")]
    GuardRejected { redirect_to: String },

    #[error("Consultation room is not ready")]
    RoomNotReady,

    #[error("Media join failed: {0}")]
    MediaJoinFailed(MediaError),

    #[error("Failed to save clinical notes: {0}")]
    PersistenceFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid status transition from {from:?} to {to:?}")]
    InvalidTransition { from: ConsultationStatus, to: ConsultationStatus },

    #[error("Consultation is {status:?}")]
    ConsultationClosed { status: ConsultationStatus },

    #[error("Operation not allowed while {0}")]
    InvalidState(String),
}

impl SessionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::NoActiveSession => "There is no active consultation.",
            SessionError::AlreadyActive { .. } => "Finish the current consultation first.",
            SessionError::NotFound(_) => "Consultation not found.",
            SessionError::NotSessionOwner => "This consultation is run by another doctor.",
            SessionError::GuardRejected { .. } => "You cannot open this consultation.",
            SessionError::RoomNotReady => "The consultation room is not ready yet. Try again in a moment.",
            SessionError::MediaJoinFailed(_) => "Could not connect to the call. Please retry.",
            SessionError::PersistenceFailed(_) => "Your notes could not be saved. Please try again.",
            SessionError::NetworkError(_) => "Network problem. Please try again.",
            SessionError::InvalidTransition { .. } => "This consultation cannot change to that status.",
            SessionError::ConsultationClosed { .. } => "This consultation is already closed.",
            SessionError::InvalidState(_) => "That action is not available right now.",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::RoomNotReady
                | SessionError::MediaJoinFailed(_)
                | SessionError::PersistenceFailed(_)
                | SessionError::NetworkError(_)
        )
    }

    pub fn toast(&self) -> Toast {
        if self.is_retryable() {
            Toast::retryable_error(self.user_message())
        } else {
            Toast::error(self.user_message())
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let message = err.user_message().to_string();
        match err {
            SessionError::NoActiveSession | SessionError::NotFound(_) => AppError::NotFound(message),
            SessionError::GuardRejected { .. } | SessionError::NotSessionOwner => AppError::Forbidden(message),
            SessionError::RoomNotReady => AppError::Unavailable(message),
            SessionError::AlreadyActive { .. }
            | SessionError::InvalidTransition { .. }
            | SessionError::ConsultationClosed { .. }
            | SessionError::InvalidState(_) => AppError::Conflict(message),
            SessionError::MediaJoinFailed(_)
            | SessionError::PersistenceFailed(_)
            | SessionError::NetworkError(_) => AppError::ExternalService(message),
        }
    }
}
