// libs/realtime-channel-cell/src/models.rs
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shared_config::AppConfig;

use crate::error::ChannelError;

// ==============================================================================
// CONNECTION
// ==============================================================================

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
    pub access_token: Option<String>,
    pub connect_timeout: Duration,
    pub ack_timeout: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub ping_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            access_token: None,
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(10),
            reconnect_base_delay: Duration::from_millis(500),
            reconnect_max_delay: Duration::from_secs(30),
            ping_interval: Duration::from_secs(25),
        }
    }
}

impl ChannelConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            url: config.realtime_url.clone(),
            access_token: Some(config.access_token.clone()).filter(|t| !t.is_empty()),
            connect_timeout: Duration::from_secs(config.realtime_connect_timeout_secs),
            ack_timeout: Duration::from_secs(config.realtime_ack_timeout_secs),
            reconnect_base_delay: Duration::from_millis(config.realtime_reconnect_base_ms),
            reconnect_max_delay: Duration::from_millis(config.realtime_reconnect_max_ms),
            ..Self::default()
        }
    }

    /// Exponential backoff: `base * 2^(attempt - 1)`, capped at the max delay.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.reconnect_base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.reconnect_max_delay)
    }
}

/// Anything other than `Connected` is shown to the user as the persistent
/// offline indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Offline,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn is_offline(&self) -> bool {
        !self.is_connected()
    }
}

// ==============================================================================
// INBOUND EVENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConsultationRequest,
    ConsultationRequestCancelled,
    ConsultationAccepted,
    ConsultationRejected,
    ParticipantJoined,
    ParticipantLeft,
    ConsultationEnded,
    ConsultationStatus,
    TypingIndicator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InboundEvent {
    ConsultationRequest(ConsultationRequestPayload),
    ConsultationRequestCancelled(RequestReference),
    ConsultationAccepted(RequestOutcomePayload),
    ConsultationRejected(RequestOutcomePayload),
    ParticipantJoined(ParticipantPresencePayload),
    ParticipantLeft(ParticipantPresencePayload),
    ConsultationEnded(ConsultationEndedPayload),
    ConsultationStatus(ConsultationStatusPayload),
    TypingIndicator(TypingIndicatorPayload),
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::ConsultationRequest(_) => EventKind::ConsultationRequest,
            InboundEvent::ConsultationRequestCancelled(_) => EventKind::ConsultationRequestCancelled,
            InboundEvent::ConsultationAccepted(_) => EventKind::ConsultationAccepted,
            InboundEvent::ConsultationRejected(_) => EventKind::ConsultationRejected,
            InboundEvent::ParticipantJoined(_) => EventKind::ParticipantJoined,
            InboundEvent::ParticipantLeft(_) => EventKind::ParticipantLeft,
            InboundEvent::ConsultationEnded(_) => EventKind::ConsultationEnded,
            InboundEvent::ConsultationStatus(_) => EventKind::ConsultationStatus,
            InboundEvent::TypingIndicator(_) => EventKind::TypingIndicator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRequestPayload {
    pub request_id: String,
    pub patient: PatientSummary,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub symptoms: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Servers that omit this rely on the client's default offer window.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReference {
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOutcomePayload {
    pub request_id: String,
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub appointment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPresencePayload {
    pub consultation_id: String,
    pub user_id: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationEndedPayload {
    pub consultation_id: String,
    #[serde(default)]
    pub ended_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationStatusPayload {
    pub consultation_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicatorPayload {
    pub consultation_id: String,
    pub user_id: String,
    pub is_typing: bool,
}

// ==============================================================================
// OUTBOUND EVENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OutboundEvent {
    RespondToRequest(RespondToRequestPayload),
    EndConsultation(EndConsultationPayload),
    NotifyNotesUpdated(NotesUpdatedPayload),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::RespondToRequest(_) => "respond_to_request",
            OutboundEvent::EndConsultation(_) => "end_consultation",
            OutboundEvent::NotifyNotesUpdated(_) => "notify_notes_updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondToRequestPayload {
    pub request_id: String,
    pub accept: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndConsultationPayload {
    pub consultation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesUpdatedPayload {
    pub consultation_id: String,
    pub notes: Option<String>,
    pub prescription: Option<String>,
    pub follow_up_date: Option<String>,
}

// ==============================================================================
// WIRE FRAMES
// ==============================================================================

/// A decoded text frame from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Ack { ack_id: u64, payload: Value },
    Event(InboundEvent),
    Unknown(String),
}

pub fn encode_outbound(ack_id: u64, event: &OutboundEvent) -> Result<String, ChannelError> {
    let mut frame = serde_json::to_value(event)?;
    if let Some(map) = frame.as_object_mut() {
        map.insert("ackId".to_string(), Value::from(ack_id));
    }
    Ok(frame.to_string())
}

pub fn decode_inbound(text: &str) -> Result<InboundFrame, ChannelError> {
    let value: Value = serde_json::from_str(text)?;

    let frame_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| ChannelError::Serialization("frame without type".to_string()))?
        .to_string();

    if frame_type == "ack" {
        let ack_id = value
            .get("ackId")
            .and_then(|id| id.as_u64())
            .ok_or_else(|| ChannelError::Serialization("ack without ackId".to_string()))?;
        let payload = value.get("payload").cloned().unwrap_or(Value::Null);
        return Ok(InboundFrame::Ack { ack_id, payload });
    }

    match serde_json::from_value::<InboundEvent>(value) {
        Ok(event) => Ok(InboundFrame::Event(event)),
        Err(_) => Ok(InboundFrame::Unknown(frame_type)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_consultation_request_event() {
        let text = json!({
            "type": "consultation_request",
            "payload": {
                "requestId": "req-1",
                "patient": { "name": "Ada Obi" },
                "symptoms": "fever",
                "createdAt": "2026-01-01T10:00:00Z"
            }
        })
        .to_string();

        let frame = decode_inbound(&text).unwrap();
        match frame {
            InboundFrame::Event(InboundEvent::ConsultationRequest(payload)) => {
                assert_eq!(payload.request_id, "req-1");
                assert_eq!(payload.patient.name, "Ada Obi");
                assert!(payload.expires_at.is_none());
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn decodes_ack_and_unknown_frames() {
        let ack = decode_inbound(r#"{"type":"ack","ackId":7,"payload":{"success":true}}"#).unwrap();
        assert_eq!(ack, InboundFrame::Ack { ack_id: 7, payload: json!({"success": true}) });

        let unknown = decode_inbound(r#"{"type":"doctor_status","payload":{}}"#).unwrap();
        assert_eq!(unknown, InboundFrame::Unknown("doctor_status".to_string()));
    }

    #[test]
    fn outbound_frame_carries_ack_id() {
        let event = OutboundEvent::RespondToRequest(RespondToRequestPayload {
            request_id: "req-9".to_string(),
            accept: true,
        });
        let frame: Value = serde_json::from_str(&encode_outbound(3, &event).unwrap()).unwrap();
        assert_eq!(frame["type"], "respond_to_request");
        assert_eq!(frame["ackId"], 3);
        assert_eq!(frame["payload"]["requestId"], "req-9");
        assert_eq!(frame["payload"]["accept"], true);
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let config = ChannelConfig {
            reconnect_base_delay: Duration::from_millis(500),
            reconnect_max_delay: Duration::from_secs(3),
            ..ChannelConfig::default()
        };
        assert_eq!(config.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(4), Duration::from_secs(3));
        assert_eq!(config.backoff_delay(40), Duration::from_secs(3));
    }
}
