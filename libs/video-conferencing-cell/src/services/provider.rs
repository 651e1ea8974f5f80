// libs/video-conferencing-cell/src/services/provider.rs
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::MediaError;
use crate::models::{ParticipantInfo, ProviderEvent, RoomDescriptor};

/// Factory for call objects of the underlying audio/video transport.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    async fn create_call_object(&self) -> Result<Arc<dyn CallObject>, MediaError>;
}

/// One call handle. Holds device resources until `destroy` is called.
#[async_trait]
pub trait CallObject: Send + Sync {
    /// Resolves with the local participant once the provider has joined.
    async fn join(&self, room: &RoomDescriptor) -> Result<ParticipantInfo, MediaError>;
    async fn leave(&self) -> Result<(), MediaError>;
    async fn set_local_audio(&self, enabled: bool) -> Result<(), MediaError>;
    async fn set_local_video(&self, enabled: bool) -> Result<(), MediaError>;
    async fn start_screen_share(&self) -> Result<(), MediaError>;
    async fn stop_screen_share(&self) -> Result<(), MediaError>;
    fn events(&self) -> broadcast::Receiver<ProviderEvent>;
    async fn destroy(&self);
}
