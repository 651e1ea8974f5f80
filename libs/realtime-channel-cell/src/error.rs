use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Realtime channel not configured")]
    NotConfigured,

    #[error("Timed out connecting to the realtime server after {timeout_seconds} seconds")]
    ConnectTimeout { timeout_seconds: u64 },

    #[error("Realtime channel is disconnected")]
    Disconnected,

    #[error("No acknowledgment received within {timeout_seconds} seconds")]
    AckTimeout { timeout_seconds: u64 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        ChannelError::Serialization(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChannelError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChannelError::Transport(err.to_string())
    }
}
