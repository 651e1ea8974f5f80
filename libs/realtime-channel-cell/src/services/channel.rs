// libs/realtime-channel-cell/src/services/channel.rs
use async_trait::async_trait;
use serde_json::Value;

use crate::error::ChannelError;
use crate::models::{ConnectionStatus, EventKind, OutboundEvent};
use crate::services::stream::EventStream;

/// The seam every consumer of the coordination server goes through.
/// `RealtimeChannelClient` is the production implementation.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Sends an event and resolves with the server's acknowledgment payload.
    ///
    /// Resolves only after every event that arrived before the acknowledgment
    /// has been handled by its subscribers. Subscribers must therefore not
    /// wait on an acknowledgment while handling an event.
    async fn emit(&self, event: OutboundEvent) -> Result<Value, ChannelError>;

    /// Receives every inbound event of any of `kinds` on one stream, in
    /// arrival order.
    async fn subscribe_many(&self, kinds: &[EventKind]) -> EventStream;

    async fn subscribe(&self, kind: EventKind) -> EventStream {
        self.subscribe_many(&[kind]).await
    }

    fn status(&self) -> ConnectionStatus;
}

