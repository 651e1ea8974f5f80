// libs/video-conferencing-cell/src/models.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use shared_config::AppConfig;

use crate::error::MediaError;

// ==============================================================================
// ROOM AND PARTICIPANTS
// ==============================================================================

/// Opaque credentials for the media-channel provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDescriptor {
    pub room_url: String,
    pub token: Option<String>,
}

impl RoomDescriptor {
    /// `None` when the room URL is missing, i.e. the room cannot be joined.
    pub fn from_parts(room_url: Option<String>, token: Option<String>) -> Option<Self> {
        room_url
            .filter(|url| !url.trim().is_empty())
            .map(|room_url| Self { room_url, token })
    }
}

/// Participant properties as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub video: bool,
    #[serde(default)]
    pub screen: bool,
}

// ==============================================================================
// PROVIDER PROTOCOL
// ==============================================================================

/// Events raised by the media-channel provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    Joined { local: ParticipantInfo },
    JoinFailed { message: String },
    ParticipantJoined { participant: ParticipantInfo },
    ParticipantUpdated { participant: ParticipantInfo },
    ParticipantLeft {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    MeetingEnded,
    Error { message: String },
}

/// Commands forwarded to a bridged provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MediaCommand {
    Join {
        #[serde(rename = "roomUrl")]
        room_url: String,
        token: Option<String>,
    },
    Leave,
    SetLocalAudio { enabled: bool },
    SetLocalVideo { enabled: bool },
    StartScreenShare,
    StopScreenShare,
    Destroy,
}

// ==============================================================================
// CONTROLLER STATE
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    Leaving,
    /// The remote party terminated the room. Terminal for this session.
    Ended,
}

/// Observable controller state. Device flags come from provider-reported
/// properties of the local participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaState {
    pub phase: MediaPhase,
    pub is_connecting: bool,
    pub is_connected: bool,
    pub local_participant_id: Option<String>,
    pub remote_participant_id: Option<String>,
    pub call_duration_seconds: u64,
    pub is_screen_sharing: bool,
    pub is_mic_on: bool,
    pub is_camera_on: bool,
    pub error: Option<MediaError>,
    pub ended_by_other: bool,
    #[serde(skip)]
    pub connected_at: Option<Instant>,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            phase: MediaPhase::Idle,
            is_connecting: false,
            is_connected: false,
            local_participant_id: None,
            remote_participant_id: None,
            call_duration_seconds: 0,
            is_screen_sharing: false,
            is_mic_on: false,
            is_camera_on: false,
            error: None,
            ended_by_other: false,
            connected_at: None,
        }
    }
}

impl MediaState {
    /// Fills in the duration counter for the current instant.
    pub fn at_now(mut self) -> Self {
        if let Some(connected_at) = self.connected_at {
            self.call_duration_seconds = connected_at.elapsed().as_secs();
        }
        self
    }
}

/// Session-level notifications for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSignal {
    Connected,
    RemoteJoined { session_id: String, user_id: Option<String> },
    RemoteLeft { session_id: String },
    MeetingEndedByOther,
    Failed(MediaError),
}

// ==============================================================================
// CONFIGURATION
// ==============================================================================

#[derive(Debug, Clone)]
pub struct MediaBridgeConfig {
    pub join_timeout: Duration,
    pub command_buffer: usize,
}

impl Default for MediaBridgeConfig {
    fn default() -> Self {
        Self { join_timeout: Duration::from_secs(30), command_buffer: 32 }
    }
}

impl MediaBridgeConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            join_timeout: Duration::from_secs(config.media_join_timeout_secs),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ToggleRequest {
    pub enabled: Option<bool>,
}
