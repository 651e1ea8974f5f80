// libs/consultation-request-cell/src/error.rs
use thiserror::Error;

use realtime_channel_cell::ChannelError;
use shared_models::error::AppError;
use shared_models::toast::Toast;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OfferError {
    #[error("Consultation request has expired")]
    Expired,

    #[error("Consultation request was taken by another doctor")]
    LostRace,

    #[error("Consultation request was cancelled")]
    Cancelled,

    #[error("A response to this request is already in flight")]
    ResolutionInFlight,

    #[error("Consultation request was already resolved")]
    AlreadyResolved,

    #[error("Consultation request not found")]
    NotFound,

    #[error("Invalid consultation request: {0}")]
    InvalidOffer(String),

    #[error("Malformed acknowledgment: {0}")]
    MalformedAck(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl OfferError {
    pub fn user_message(&self) -> &'static str {
        match self {
            OfferError::Expired => "This consultation request has expired.",
            OfferError::LostRace => "Another doctor has already accepted this request.",
            OfferError::Cancelled => "The patient cancelled this request.",
            OfferError::ResolutionInFlight => "Your response is being processed.",
            OfferError::AlreadyResolved => "This request has already been handled.",
            OfferError::NotFound => "This consultation request is no longer available.",
            OfferError::InvalidOffer(_) | OfferError::MalformedAck(_) => {
                "Something went wrong while handling this request."
            }
            OfferError::NetworkError(_) => "Could not reach the server. Please try again.",
        }
    }

    /// Only network failures leave the offer open for another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OfferError::NetworkError(_))
    }

    pub fn toast(&self) -> Toast {
        match self {
            OfferError::NetworkError(_) => Toast::retryable_error(self.user_message()),
            OfferError::InvalidOffer(_) | OfferError::MalformedAck(_) => Toast::error(self.user_message()),
            _ => Toast::info(self.user_message()),
        }
    }
}

impl From<ChannelError> for OfferError {
    fn from(err: ChannelError) -> Self {
        OfferError::NetworkError(err.to_string())
    }
}

impl From<OfferError> for AppError {
    fn from(err: OfferError) -> Self {
        let message = err.user_message().to_string();
        match err {
            OfferError::Expired
            | OfferError::LostRace
            | OfferError::Cancelled
            | OfferError::AlreadyResolved
            | OfferError::ResolutionInFlight => AppError::Conflict(message),
            OfferError::NotFound => AppError::NotFound(message),
            OfferError::InvalidOffer(_) => AppError::BadRequest(message),
            OfferError::MalformedAck(_) | OfferError::NetworkError(_) => {
                AppError::ExternalService(message)
            }
        }
    }
}
