// libs/video-conferencing-cell/src/error.rs
use serde::Serialize;
use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaError {
    #[error("No room descriptor to join")]
    MissingRoom,

    #[error("Failed to join the call: {message}")]
    JoinFailed { message: String },

    #[error("Timed out after {timeout_seconds}s waiting to join")]
    JoinTimeout { timeout_seconds: u64 },

    #[error("Media provider error: {message}")]
    Provider { message: String },

    #[error("Not connected to a call")]
    NotConnected,

    #[error("The meeting has ended")]
    MeetingEnded,

    #[error("No media client attached")]
    ClientDetached,
}

impl MediaError {
    pub fn user_message(&self) -> &'static str {
        match self {
            MediaError::MissingRoom => "The consultation room is not ready yet.",
            MediaError::JoinFailed { .. } | MediaError::JoinTimeout { .. } => {
                "Could not connect to the call. Please retry."
            }
            MediaError::Provider { .. } => "Something went wrong with your audio or video.",
            MediaError::NotConnected => "You are not connected to the call.",
            MediaError::MeetingEnded => "The consultation has ended.",
            MediaError::ClientDetached => "The video window is not open.",
        }
    }

    /// Failures the user may retry by hand. Nothing is retried automatically.
    pub fn is_join_failure(&self) -> bool {
        matches!(
            self,
            MediaError::JoinFailed { .. } | MediaError::JoinTimeout { .. } | MediaError::ClientDetached
        )
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        let message = err.user_message().to_string();
        match err {
            MediaError::MissingRoom | MediaError::ClientDetached => AppError::Unavailable(message),
            MediaError::NotConnected | MediaError::MeetingEnded => AppError::Conflict(message),
            MediaError::JoinFailed { .. } | MediaError::JoinTimeout { .. } | MediaError::Provider { .. } => {
                AppError::ExternalService(message)
            }
        }
    }
}
