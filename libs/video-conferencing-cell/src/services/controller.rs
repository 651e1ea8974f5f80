// libs/video-conferencing-cell/src/services/controller.rs
use std::sync::Arc;

use tokio::sync::{broadcast, broadcast::error::RecvError, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::MediaError;
use crate::models::{MediaPhase, MediaSignal, MediaState, ParticipantInfo, ProviderEvent, RoomDescriptor};
use crate::services::provider::{CallObject, MediaProvider};

const SIGNAL_CAPACITY: usize = 32;

/// Owns the single call object of a consultation and exposes its state.
///
/// `Idle -> Connecting -> Connected -> Leaving -> Idle`, plus the terminal
/// `Ended` when the remote party closes the room. The call object is
/// destroyed exactly once, by whichever of `leave` or a remote end gets to it
/// first.
pub struct MediaSessionController {
    provider: Arc<dyn MediaProvider>,
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<ControllerInner>,
    state_tx: watch::Sender<MediaState>,
    signals: broadcast::Sender<MediaSignal>,
}

#[derive(Default)]
struct ControllerInner {
    call: Option<Arc<dyn CallObject>>,
    pump: Option<JoinHandle<()>>,
    phase: MediaPhase,
    leave_requested: bool,
    ended_by_other: bool,
    /// Join order.
    participants: Vec<ParticipantInfo>,
    local_id: Option<String>,
    connected_at: Option<Instant>,
    error: Option<MediaError>,
}

impl ControllerInner {
    fn snapshot(&self) -> MediaState {
        let local = self.participants.iter().find(|p| p.local);
        MediaState {
            phase: self.phase,
            is_connecting: self.phase == MediaPhase::Connecting,
            is_connected: self.phase == MediaPhase::Connected,
            local_participant_id: self.local_id.clone(),
            remote_participant_id: self
                .participants
                .iter()
                .find(|p| !p.local)
                .map(|p| p.session_id.clone()),
            call_duration_seconds: 0,
            is_screen_sharing: local.is_some_and(|p| p.screen),
            is_mic_on: local.is_some_and(|p| p.audio),
            is_camera_on: local.is_some_and(|p| p.video),
            error: self.error.clone(),
            ended_by_other: self.ended_by_other,
            connected_at: self.connected_at,
        }
        .at_now()
    }

    fn upsert(&mut self, participant: ParticipantInfo) {
        if participant.local {
            self.local_id = Some(participant.session_id.clone());
        }
        match self.participants.iter_mut().find(|p| p.session_id == participant.session_id) {
            Some(existing) => *existing = participant,
            None => self.participants.push(participant),
        }
    }

    fn clear_call_state(&mut self) {
        self.participants.clear();
        self.local_id = None;
        self.connected_at = None;
    }
}

impl Shared {
    fn publish(&self, inner: &ControllerInner) {
        self.state_tx.send_replace(inner.snapshot());
    }

    fn signal(&self, signal: MediaSignal) {
        let _ = self.signals.send(signal);
    }

    /// Applies one provider event. Returns `true` once the call is over and
    /// the pump should stop.
    async fn apply(&self, event: ProviderEvent) -> bool {
        let mut inner = self.inner.lock().await;
        match event {
            ProviderEvent::Joined { local } => {
                if inner.phase == MediaPhase::Connected {
                    inner.upsert(local);
                }
            }
            // Reported through the pending join() instead.
            ProviderEvent::JoinFailed { .. } => {}
            ProviderEvent::ParticipantJoined { participant } => {
                if !participant.local {
                    info!("Remote participant {} joined", participant.session_id);
                    self.signal(MediaSignal::RemoteJoined {
                        session_id: participant.session_id.clone(),
                        user_id: participant.user_id.clone(),
                    });
                }
                inner.upsert(participant);
            }
            ProviderEvent::ParticipantUpdated { participant } => inner.upsert(participant),
            ProviderEvent::ParticipantLeft { session_id } => {
                let was_remote = inner.participants.iter().any(|p| p.session_id == session_id && !p.local);
                inner.participants.retain(|p| p.session_id != session_id);
                info!("Participant {} left", session_id);
                // Only the last remote leaving empties the room for us.
                if was_remote && !inner.participants.iter().any(|p| !p.local) {
                    self.signal(MediaSignal::RemoteLeft { session_id });
                }
            }
            ProviderEvent::MeetingEnded => {
                if inner.leave_requested || inner.call.is_none() {
                    debug!("Meeting end after local leave, ignoring");
                    return false;
                }
                info!("Meeting ended by the other party");
                inner.phase = MediaPhase::Ended;
                inner.ended_by_other = true;
                inner.clear_call_state();
                inner.pump.take();
                let call = inner.call.take();
                self.publish(&inner);
                drop(inner);

                self.signal(MediaSignal::MeetingEndedByOther);
                if let Some(call) = call {
                    call.destroy().await;
                }
                return true;
            }
            ProviderEvent::Error { message } => {
                warn!("Media provider error: {}", message);
                let error = MediaError::Provider { message };
                inner.error = Some(error.clone());
                self.signal(MediaSignal::Failed(error));
            }
        }
        self.publish(&inner);
        false
    }
}

fn spawn_event_pump(shared: Arc<Shared>, mut events: broadcast::Receiver<ProviderEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if shared.apply(event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Media event pump lagged by {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Media event pump stopped");
    })
}

impl MediaSessionController {
    pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
        let (state_tx, _) = watch::channel(MediaState::default());
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            provider,
            shared: Arc::new(Shared { inner: Mutex::new(ControllerInner::default()), state_tx, signals }),
        }
    }

    /// Creates the call object on first use and joins `room`.
    ///
    /// No-op while connecting or connected, after an intentional leave, or
    /// once the meeting was ended by the other party.
    #[instrument(skip(self, room), fields(room = %room.room_url))]
    pub async fn join(&self, room: &RoomDescriptor) -> Result<(), MediaError> {
        let call = {
            let mut inner = self.shared.inner.lock().await;
            if inner.phase != MediaPhase::Idle || inner.leave_requested {
                debug!("Join ignored in phase {:?} (leave requested: {})", inner.phase, inner.leave_requested);
                return Ok(());
            }
            if room.room_url.trim().is_empty() {
                return Err(MediaError::MissingRoom);
            }

            inner.phase = MediaPhase::Connecting;
            self.shared.publish(&inner);

            let call = match inner.call.clone() {
                Some(call) => call,
                None => match self.provider.create_call_object().await {
                    Ok(call) => {
                        inner.pump = Some(spawn_event_pump(Arc::clone(&self.shared), call.events()));
                        inner.call = Some(Arc::clone(&call));
                        call
                    }
                    Err(e) => {
                        warn!("Could not create call object: {}", e);
                        inner.phase = MediaPhase::Idle;
                        inner.error = Some(e.clone());
                        self.shared.publish(&inner);
                        return Err(e);
                    }
                },
            };
            call
        };

        let joined = call.join(room).await;

        let mut inner = self.shared.inner.lock().await;
        if inner.phase != MediaPhase::Connecting {
            debug!("Join settled after phase moved to {:?}", inner.phase);
            return Ok(());
        }

        match joined {
            Ok(local) => {
                inner.phase = MediaPhase::Connected;
                inner.connected_at = Some(Instant::now());
                inner.upsert(local);
                self.shared.publish(&inner);
                self.shared.signal(MediaSignal::Connected);
                info!("Joined media session");
                Ok(())
            }
            Err(e) => {
                warn!("Join failed: {}", e);
                inner.phase = MediaPhase::Idle;
                inner.error = Some(e.clone());
                self.shared.publish(&inner);
                self.shared.signal(MediaSignal::Failed(e.clone()));
                Err(e)
            }
        }
    }

    /// Leaves the call and destroys the call object. Later joins are ignored.
    #[instrument(skip(self))]
    pub async fn leave(&self) {
        let (call, pump) = {
            let mut inner = self.shared.inner.lock().await;
            inner.leave_requested = true;
            if inner.call.is_none() {
                if inner.phase != MediaPhase::Ended {
                    inner.phase = MediaPhase::Idle;
                }
                self.shared.publish(&inner);
                return;
            }
            inner.phase = MediaPhase::Leaving;
            self.shared.publish(&inner);
            (inner.call.take(), inner.pump.take())
        };

        if let Some(call) = call {
            if let Err(e) = call.leave().await {
                warn!("Provider leave failed: {}", e);
            }
            call.destroy().await;
        }
        if let Some(pump) = pump {
            pump.abort();
        }

        let mut inner = self.shared.inner.lock().await;
        inner.phase = MediaPhase::Idle;
        inner.clear_call_state();
        self.shared.publish(&inner);
        info!("Left media session");
    }

    /// Makes an idle controller joinable again for a new consultation.
    pub async fn reset(&self) -> Result<(), MediaError> {
        let mut inner = self.shared.inner.lock().await;
        if inner.call.is_some() {
            return Err(MediaError::Provider { message: "call still active".to_string() });
        }
        *inner = ControllerInner::default();
        self.shared.publish(&inner);
        Ok(())
    }

    pub async fn toggle_mic(&self) -> Result<(), MediaError> {
        let (call, state) = self.connected_call().await?;
        let result = call.set_local_audio(!state.is_mic_on).await;
        self.record_failure(result).await
    }

    pub async fn toggle_camera(&self) -> Result<(), MediaError> {
        let (call, state) = self.connected_call().await?;
        let result = call.set_local_video(!state.is_camera_on).await;
        self.record_failure(result).await
    }

    pub async fn toggle_screen_share(&self) -> Result<(), MediaError> {
        let (call, state) = self.connected_call().await?;
        let result = if state.is_screen_sharing {
            call.stop_screen_share().await
        } else {
            call.start_screen_share().await
        };
        self.record_failure(result).await
    }

    async fn connected_call(&self) -> Result<(Arc<dyn CallObject>, MediaState), MediaError> {
        let inner = self.shared.inner.lock().await;
        if inner.phase != MediaPhase::Connected {
            return Err(MediaError::NotConnected);
        }
        let call = inner.call.clone().ok_or(MediaError::NotConnected)?;
        Ok((call, inner.snapshot()))
    }

    async fn record_failure(&self, result: Result<(), MediaError>) -> Result<(), MediaError> {
        if let Err(e) = &result {
            let mut inner = self.shared.inner.lock().await;
            inner.error = Some(e.clone());
            self.shared.publish(&inner);
        }
        result
    }

    pub async fn clear_error(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.error = None;
        self.shared.publish(&inner);
    }

    pub fn state(&self) -> MediaState {
        self.shared.state_tx.borrow().clone().at_now()
    }

    pub fn watch(&self) -> watch::Receiver<MediaState> {
        self.shared.state_tx.subscribe()
    }

    pub fn signals(&self) -> broadcast::Receiver<MediaSignal> {
        self.shared.signals.subscribe()
    }
}
