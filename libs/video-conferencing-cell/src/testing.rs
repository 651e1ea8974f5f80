// libs/video-conferencing-cell/src/testing.rs
//! In-memory media provider for tests of the controller and of the cells that
//! drive it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use crate::error::MediaError;
use crate::models::{MediaCommand, ParticipantInfo, ProviderEvent, RoomDescriptor};
use crate::services::provider::{CallObject, MediaProvider};

#[derive(Clone)]
enum JoinScript {
    Succeed,
    Fail(String),
    Hold(Arc<Notify>),
}

pub fn local_participant() -> ParticipantInfo {
    ParticipantInfo {
        session_id: "local-1".to_string(),
        user_id: Some("doctor-1".to_string()),
        local: true,
        audio: true,
        video: true,
        screen: false,
    }
}

pub fn remote_participant(session_id: &str) -> ParticipantInfo {
    ParticipantInfo {
        session_id: session_id.to_string(),
        user_id: Some(format!("user-{}", session_id)),
        local: false,
        audio: true,
        video: true,
        screen: false,
    }
}

/// Hands out `FakeCall`s and remembers every one of them. The join script is
/// shared, so changing it also affects calls already handed out.
pub struct FakeProvider {
    script: Arc<StdMutex<JoinScript>>,
    calls: StdMutex<Vec<Arc<FakeCall>>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self { script: Arc::new(StdMutex::new(JoinScript::Succeed)), calls: StdMutex::new(Vec::new()) }
    }

    pub fn succeed_joins(&self) {
        *self.script.lock().expect("script lock") = JoinScript::Succeed;
    }

    pub fn fail_joins_with(&self, message: &str) {
        *self.script.lock().expect("script lock") = JoinScript::Fail(message.to_string());
    }

    /// Joins block until the returned handle is notified, then succeed.
    pub fn hold_joins(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.script.lock().expect("script lock") = JoinScript::Hold(Arc::clone(&gate));
        gate
    }

    pub fn created_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    pub fn last_call(&self) -> Option<Arc<FakeCall>> {
        self.calls.lock().expect("calls lock").last().cloned()
    }
}

#[async_trait]
impl MediaProvider for FakeProvider {
    async fn create_call_object(&self) -> Result<Arc<dyn CallObject>, MediaError> {
        let (events, _) = broadcast::channel(64);
        let call = Arc::new(FakeCall {
            script: Arc::clone(&self.script),
            events,
            commands: StdMutex::new(Vec::new()),
            joins: AtomicUsize::new(0),
            destroyed: AtomicUsize::new(0),
        });
        self.calls.lock().expect("calls lock").push(Arc::clone(&call));
        Ok(call)
    }
}

pub struct FakeCall {
    script: Arc<StdMutex<JoinScript>>,
    events: broadcast::Sender<ProviderEvent>,
    commands: StdMutex<Vec<MediaCommand>>,
    joins: AtomicUsize,
    destroyed: AtomicUsize,
}

impl FakeCall {
    /// Raises a provider event as if it came from the transport.
    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn commands(&self) -> Vec<MediaCommand> {
        self.commands.lock().expect("commands lock").clone()
    }

    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn record(&self, command: MediaCommand) {
        self.commands.lock().expect("commands lock").push(command);
    }
}

#[async_trait]
impl CallObject for FakeCall {
    async fn join(&self, room: &RoomDescriptor) -> Result<ParticipantInfo, MediaError> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        self.record(MediaCommand::Join { room_url: room.room_url.clone(), token: room.token.clone() });
        let script = self.script.lock().expect("script lock").clone();
        match script {
            JoinScript::Succeed => Ok(local_participant()),
            JoinScript::Fail(message) => Err(MediaError::JoinFailed { message }),
            JoinScript::Hold(gate) => {
                gate.notified().await;
                Ok(local_participant())
            }
        }
    }

    async fn leave(&self) -> Result<(), MediaError> {
        self.record(MediaCommand::Leave);
        Ok(())
    }

    async fn set_local_audio(&self, enabled: bool) -> Result<(), MediaError> {
        self.record(MediaCommand::SetLocalAudio { enabled });
        Ok(())
    }

    async fn set_local_video(&self, enabled: bool) -> Result<(), MediaError> {
        self.record(MediaCommand::SetLocalVideo { enabled });
        Ok(())
    }

    async fn start_screen_share(&self) -> Result<(), MediaError> {
        self.record(MediaCommand::StartScreenShare);
        Ok(())
    }

    async fn stop_screen_share(&self) -> Result<(), MediaError> {
        self.record(MediaCommand::StopScreenShare);
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    async fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        self.record(MediaCommand::Destroy);
    }
}
