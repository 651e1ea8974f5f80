// libs/video-conferencing-cell/src/services/bridge.rs
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::MediaError;
use crate::models::{MediaBridgeConfig, MediaCommand, ParticipantInfo, ProviderEvent, RoomDescriptor};
use crate::services::provider::{CallObject, MediaProvider};

type PendingJoin = oneshot::Sender<Result<ParticipantInfo, MediaError>>;

/// Media provider whose transport lives in the browser.
///
/// Commands go out to the attached UI as a stream; the UI reports provider
/// events back through `deliver`.
#[derive(Clone)]
pub struct MediaBridge {
    shared: Arc<BridgeShared>,
}

struct BridgeShared {
    config: MediaBridgeConfig,
    commands: broadcast::Sender<MediaCommand>,
    events: broadcast::Sender<ProviderEvent>,
    pending_join: Mutex<Option<PendingJoin>>,
}

impl MediaBridge {
    pub fn new(config: MediaBridgeConfig) -> Self {
        let (commands, _) = broadcast::channel(config.command_buffer);
        let (events, _) = broadcast::channel(config.command_buffer);
        Self {
            shared: Arc::new(BridgeShared { config, commands, events, pending_join: Mutex::new(None) }),
        }
    }

    /// Stream of commands for the attached UI.
    pub fn commands(&self) -> broadcast::Receiver<MediaCommand> {
        self.shared.commands.subscribe()
    }

    pub fn is_attached(&self) -> bool {
        self.shared.commands.receiver_count() > 0
    }

    /// Feeds one event reported by the UI into the bridge.
    pub async fn deliver(&self, event: ProviderEvent) {
        match &event {
            ProviderEvent::Joined { local } => {
                self.settle_join(Ok(local.clone())).await;
            }
            ProviderEvent::JoinFailed { message } => {
                self.settle_join(Err(MediaError::JoinFailed { message: message.clone() })).await;
            }
            _ => {}
        }
        debug!("Media event from UI: {:?}", event);
        let _ = self.shared.events.send(event);
    }

    async fn settle_join(&self, result: Result<ParticipantInfo, MediaError>) {
        match self.shared.pending_join.lock().await.take() {
            Some(waiter) => {
                let _ = waiter.send(result);
            }
            None => debug!("Join result with no pending join"),
        }
    }
}

#[async_trait]
impl MediaProvider for MediaBridge {
    async fn create_call_object(&self) -> Result<Arc<dyn CallObject>, MediaError> {
        Ok(Arc::new(BridgeCall { shared: Arc::clone(&self.shared) }))
    }
}

struct BridgeCall {
    shared: Arc<BridgeShared>,
}

impl BridgeCall {
    fn send(&self, command: MediaCommand) -> Result<(), MediaError> {
        self.shared
            .commands
            .send(command)
            .map(|_| ())
            .map_err(|_| MediaError::ClientDetached)
    }
}

#[async_trait]
impl CallObject for BridgeCall {
    async fn join(&self, room: &RoomDescriptor) -> Result<ParticipantInfo, MediaError> {
        let (tx, rx) = oneshot::channel();
        *self.shared.pending_join.lock().await = Some(tx);

        if let Err(e) = self.send(MediaCommand::Join { room_url: room.room_url.clone(), token: room.token.clone() }) {
            self.shared.pending_join.lock().await.take();
            return Err(e);
        }

        let join_timeout = self.shared.config.join_timeout;
        match timeout(join_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(MediaError::JoinFailed { message: "join abandoned".to_string() }),
            Err(_) => {
                self.shared.pending_join.lock().await.take();
                warn!("No join confirmation within {:?}", join_timeout);
                Err(MediaError::JoinTimeout { timeout_seconds: join_timeout.as_secs() })
            }
        }
    }

    async fn leave(&self) -> Result<(), MediaError> {
        self.send(MediaCommand::Leave)
    }

    async fn set_local_audio(&self, enabled: bool) -> Result<(), MediaError> {
        self.send(MediaCommand::SetLocalAudio { enabled })
    }

    async fn set_local_video(&self, enabled: bool) -> Result<(), MediaError> {
        self.send(MediaCommand::SetLocalVideo { enabled })
    }

    async fn start_screen_share(&self) -> Result<(), MediaError> {
        self.send(MediaCommand::StartScreenShare)
    }

    async fn stop_screen_share(&self) -> Result<(), MediaError> {
        self.send(MediaCommand::StopScreenShare)
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.shared.events.subscribe()
    }

    async fn destroy(&self) {
        if self.send(MediaCommand::Destroy).is_err() {
            debug!("Destroy with no media client attached");
        }
        info!("Call object destroyed");
    }
}
