// libs/consultation-request-cell/src/models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use realtime_channel_cell::ConsultationRequestPayload;

use crate::error::OfferError;

/// Offers without an explicit `expiresAt` live this long after `createdAt`.
pub const DEFAULT_OFFER_WINDOW_SECS: i64 = 60;

// ==============================================================================
// OFFERS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRequest {
    pub request_id: String,
    pub patient_name: String,
    pub patient_avatar: Option<String>,
    pub patient_id: Option<String>,
    pub reason: Option<String>,
    pub symptoms: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ConsultationRequest {
    /// Builds an offer from the wire payload. `window` applies only when the
    /// server did not send its own `expiresAt`.
    pub fn from_payload(payload: ConsultationRequestPayload, window: Duration) -> Result<Self, OfferError> {
        if payload.request_id.trim().is_empty() {
            return Err(OfferError::InvalidOffer("missing requestId".to_string()));
        }

        let expires_at = payload.expires_at.unwrap_or(payload.created_at + window);
        if expires_at <= payload.created_at {
            return Err(OfferError::InvalidOffer(format!(
                "request {} expires before it was created",
                payload.request_id
            )));
        }

        Ok(Self {
            request_id: payload.request_id,
            patient_name: payload.patient.name,
            patient_avatar: payload.patient.avatar,
            patient_id: payload.patient.id,
            reason: payload.reason,
            symptoms: payload.symptoms,
            created_at: payload.created_at,
            expires_at,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry, never negative.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        let remaining = self.expires_at - now;
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }

    /// Whole seconds left, rounded up so a live offer never shows zero.
    pub fn remaining_seconds_at(&self, now: DateTime<Utc>) -> i64 {
        let millis = self.remaining_at(now).num_milliseconds();
        (millis + 999) / 1000
    }
}

/// Per-offer lifecycle. `Visible` and `Resolving` are live; the rest are
/// terminal and the offer is no longer held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferState {
    Visible,
    Resolving,
    Won,
    Declined,
    Lost,
    Expired,
    Cancelled,
    Dismissed,
}

impl OfferState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferState::Visible | OfferState::Resolving)
    }

    /// Maps a terminal state to the error a late `respond()` should see.
    pub fn as_offer_error(&self) -> OfferError {
        match self {
            OfferState::Expired => OfferError::Expired,
            OfferState::Lost => OfferError::LostRace,
            OfferState::Cancelled => OfferError::Cancelled,
            OfferState::Resolving => OfferError::ResolutionInFlight,
            _ => OfferError::AlreadyResolved,
        }
    }
}

/// What the realtime dispatcher feeds into the store.
#[derive(Debug, Clone, PartialEq)]
pub enum OfferUpdate {
    Offer(ConsultationRequest),
    Cancelled { request_id: String },
}

// ==============================================================================
// NOTIFICATIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ConsultationRequest,
    ConsultationAccepted,
    ConsultationEnded,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<ConsultationRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_state: Option<OfferState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
}

impl Notification {
    pub fn for_offer(request: ConsultationRequest, now: DateTime<Utc>) -> Self {
        let remaining = request.remaining_seconds_at(now);
        Self {
            id: Uuid::new_v4(),
            notification_type: NotificationType::ConsultationRequest,
            title: "New consultation request".to_string(),
            message: offer_message(&request),
            timestamp: request.created_at,
            read: false,
            offer_state: Some(OfferState::Visible),
            remaining_seconds: Some(remaining),
            request: Some(request),
        }
    }

    pub fn informational(
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            notification_type,
            title: title.into(),
            message: message.into(),
            timestamp: now,
            read: false,
            request: None,
            offer_state: None,
            remaining_seconds: None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request.as_ref().map(|r| r.request_id.as_str())
    }

    pub fn is_offer(&self) -> bool {
        self.request.is_some()
    }

    /// Refreshes the request fields of a redelivered offer. Identity, read flag
    /// and resolution state are kept.
    pub(crate) fn refresh_offer(&mut self, request: ConsultationRequest, now: DateTime<Utc>) {
        self.message = offer_message(&request);
        self.remaining_seconds = Some(request.remaining_seconds_at(now));
        self.request = Some(request);
    }
}

fn offer_message(request: &ConsultationRequest) -> String {
    match request.reason.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(reason) => format!("{} is requesting a consultation: {}", request.patient_name, reason),
        None => format!("{} is requesting a consultation", request.patient_name),
    }
}

// ==============================================================================
// SIGNALS AND STORE RESULTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum NotificationSignal {
    Inserted { notification_id: Uuid, request_id: Option<String> },
    Expired { notification_id: Uuid, request_id: String },
    Removed { notification_id: Uuid, request_id: Option<String>, state: Option<OfferState> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    Inserted(Uuid),
    Updated(Uuid),
    Removed(Notification),
    /// Redelivery of an offer that already reached a terminal state, or a
    /// cancellation for something the store never held.
    Ignored { request_id: String, state: Option<OfferState> },
}

/// Result of settling an in-flight resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Applied(Notification),
    /// Another path already resolved the offer; the caller's result is stale.
    Superseded(OfferState),
}

// ==============================================================================
// RESOLUTION
// ==============================================================================

/// Acknowledgment payload for `respond_to_request`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RespondAck {
    pub success: bool,
    pub appointment_id: Option<String>,
    pub error: Option<String>,
    pub code: Option<String>,
}

impl RespondAck {
    pub fn parse(payload: Value) -> Result<Self, OfferError> {
        serde_json::from_value(payload).map_err(|e| OfferError::MalformedAck(e.to_string()))
    }

    pub fn reports_expired(&self) -> bool {
        let by_code = self
            .code
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case("expired"));
        let by_message = self
            .error
            .as_deref()
            .is_some_and(|e| e.to_ascii_lowercase().contains("expired"));
        by_code || by_message
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RespondOutcome {
    Accepted {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "appointmentId")]
        appointment_id: String,
    },
    Declined {
        #[serde(rename = "requestId")]
        request_id: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RespondRequest {
    pub accept: bool,
}
