// libs/consultation-session-cell/src/services/orchestrator.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast::error::RecvError, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use access_guard_cell::{AccessGuardService, GuardDecision, GuardError, DASHBOARD_ROUTE, LOGIN_ROUTE};
use realtime_channel_cell::{EndConsultationPayload, EventKind, InboundEvent, OutboundEvent, RealtimeChannel};
use shared_models::auth::User;
use shared_models::toast::Toast;
use video_conferencing_cell::{MediaSessionController, MediaSignal, RoomDescriptor};

use crate::error::SessionError;
use crate::models::{
    ClinicalNotes, Consultation, ConsultationStatus, EndOutcome, ExitOutcome, NotesDraft, NotesPatch,
    SaveOutcome, SessionPhase, SessionView,
};
use crate::services::lifecycle::ConsultationLifecycle;
use crate::services::resources::{AppointmentResource, ConsultationResource};

pub fn consultation_path(consultation_id: &str) -> String {
    format!("/consultation/{}", consultation_id)
}

struct ActiveSession {
    consultation: Consultation,
    notes: NotesDraft,
    phase: SessionPhase,
    doctor_user_id: String,
    auth_token: String,
    patient_connected: bool,
    peer_typing: bool,
    server_status: Option<ConsultationStatus>,
    notice: Option<Toast>,
}

impl ActiveSession {
    fn new(user: &User, auth_token: &str, consultation: Consultation, phase: SessionPhase) -> Self {
        Self {
            notes: NotesDraft::new(ClinicalNotes::from_consultation(&consultation)),
            consultation,
            phase,
            doctor_user_id: user.id.clone(),
            auth_token: auth_token.to_string(),
            patient_connected: false,
            peer_typing: false,
            server_status: None,
            notice: None,
        }
    }

    fn is_peer(&self, user_id: &str) -> bool {
        user_id != self.doctor_user_id
    }
}

/// Runs one consultation at a time: fetch, guard re-check, media join, the
/// in-call notes workflow, and the two ways out (exit and end).
///
/// The orchestrator is the only owner of the media controller. Entry
/// operations (`start*`, `retry`) are serialized; exit and end are not, so
/// the doctor can always get out of a hanging join.
pub struct ConsultationSessionOrchestrator {
    consultations: Arc<dyn ConsultationResource>,
    appointments: Arc<dyn AppointmentResource>,
    guard: Arc<AccessGuardService>,
    media: Arc<MediaSessionController>,
    channel: Arc<dyn RealtimeChannel>,
    lifecycle: ConsultationLifecycle,
    session: RwLock<Option<ActiveSession>>,
    entry: Mutex<()>,
}

impl ConsultationSessionOrchestrator {
    pub fn new(
        consultations: Arc<dyn ConsultationResource>,
        appointments: Arc<dyn AppointmentResource>,
        guard: Arc<AccessGuardService>,
        media: Arc<MediaSessionController>,
        channel: Arc<dyn RealtimeChannel>,
    ) -> Self {
        Self {
            consultations,
            appointments,
            guard,
            media,
            channel,
            lifecycle: ConsultationLifecycle::new(),
            session: RwLock::new(None),
            entry: Mutex::new(()),
        }
    }

    pub fn media(&self) -> &Arc<MediaSessionController> {
        &self.media
    }

    // ==========================================================================
    // ENTRY
    // ==========================================================================

    #[instrument(skip(self, user, auth_token), fields(user_id = %user.id))]
    pub async fn start(&self, user: &User, auth_token: &str, consultation_id: &str) -> Result<SessionView, SessionError> {
        let _entry = self.entry.lock().await;
        if let Some(view) = self.reuse_active(&user.id, |c| c.id == consultation_id).await? {
            debug!("Consultation {} already active", consultation_id);
            return Ok(view);
        }

        let consultation = self.consultations.get_consultation(consultation_id, auth_token).await?;
        self.enter(user, auth_token, consultation).await
    }

    /// Creates the consultation for an appointment, then enters it.
    #[instrument(skip(self, user, auth_token), fields(user_id = %user.id))]
    pub async fn start_from_appointment(
        &self,
        user: &User,
        auth_token: &str,
        appointment_id: &str,
    ) -> Result<SessionView, SessionError> {
        let _entry = self.entry.lock().await;
        if let Some(view) = self
            .reuse_active(&user.id, |c| c.appointment_id.as_deref() == Some(appointment_id))
            .await?
        {
            return Ok(view);
        }

        self.check_guard(user, auth_token, &format!("/appointments/{}", appointment_id)).await?;
        let appointment = self.appointments.get_appointment(appointment_id, auth_token).await?;
        if !appointment.status.can_start_consultation() {
            warn!("Appointment {} is {:?}, not starting", appointment_id, appointment.status);
            return Err(SessionError::InvalidState(format!("appointment is {:?}", appointment.status)));
        }

        let consultation = self.appointments.create_consultation(&appointment, auth_token).await?;
        self.enter(user, auth_token, consultation).await
    }

    /// Manual retry after `RoomNotReady` or a failed join. Never automatic.
    #[instrument(skip(self))]
    pub async fn retry(&self) -> Result<SessionView, SessionError> {
        let _entry = self.entry.lock().await;
        let (phase, consultation_id, auth_token) = {
            let session = self.session.read().await;
            let active = session.as_ref().ok_or(SessionError::NoActiveSession)?;
            (active.phase, active.consultation.id.clone(), active.auth_token.clone())
        };

        let room = match phase {
            SessionPhase::RoomNotReady => {
                let refreshed = self.consultations.get_consultation(&consultation_id, &auth_token).await?;
                self.lifecycle.ensure_joinable(refreshed.status)?;
                let room = refreshed.room();

                let mut session = self.session.write().await;
                let active = session.as_mut().ok_or(SessionError::NoActiveSession)?;
                if active.consultation.id != consultation_id || active.phase != SessionPhase::RoomNotReady {
                    return Err(SessionError::InvalidState(format!("{:?}", active.phase)));
                }
                active.consultation.room_url = refreshed.room_url;
                active.consultation.token = refreshed.token;
                active.consultation.status = refreshed.status;

                match room {
                    Some(room) => {
                        active.phase = SessionPhase::Joining;
                        room
                    }
                    None => {
                        info!("Room for consultation {} still not ready", consultation_id);
                        return Err(SessionError::RoomNotReady);
                    }
                }
            }
            SessionPhase::JoinFailed => {
                let mut session = self.session.write().await;
                let active = session.as_mut().ok_or(SessionError::NoActiveSession)?;
                let room = active.consultation.room().ok_or(SessionError::RoomNotReady)?;
                active.phase = SessionPhase::Joining;
                room
            }
            other => return Err(SessionError::InvalidState(format!("{:?}", other))),
        };

        info!("Retrying join for consultation {}", consultation_id);
        self.join(room).await
    }

    async fn reuse_active(
        &self,
        user_id: &str,
        matches: impl Fn(&Consultation) -> bool,
    ) -> Result<Option<SessionView>, SessionError> {
        let session = self.session.read().await;
        match session.as_ref() {
            Some(active) if !active.phase.is_finished() => {
                if active.doctor_user_id != user_id {
                    return Err(SessionError::NotSessionOwner);
                }
                if matches(&active.consultation) {
                    Ok(Some(self.view_of(active)))
                } else {
                    Err(SessionError::AlreadyActive { consultation_id: active.consultation.id.clone() })
                }
            }
            _ => Ok(None),
        }
    }

    async fn check_guard(&self, user: &User, auth_token: &str, path: &str) -> Result<(), SessionError> {
        match self.guard.check(Some(user), auth_token, path).await {
            Ok(GuardDecision::Allow) => Ok(()),
            Ok(GuardDecision::Redirect { to, .. }) => {
                info!("Guard redirects {} to {}", path, to);
                Err(SessionError::GuardRejected { redirect_to: to })
            }
            Ok(GuardDecision::Loading) => Err(SessionError::NetworkError("access status still loading".to_string())),
            Err(GuardError::Unauthorized) => Err(SessionError::GuardRejected { redirect_to: LOGIN_ROUTE.to_string() }),
            Err(e) => Err(SessionError::NetworkError(e.to_string())),
        }
    }

    async fn enter(&self, user: &User, auth_token: &str, consultation: Consultation) -> Result<SessionView, SessionError> {
        self.check_guard(user, auth_token, &consultation_path(&consultation.id)).await?;
        self.lifecycle.ensure_joinable(consultation.status)?;
        self.media
            .reset()
            .await
            .map_err(|e| SessionError::InvalidState(e.to_string()))?;

        let room = consultation.room();
        let phase = if room.is_some() { SessionPhase::Joining } else { SessionPhase::RoomNotReady };
        let consultation_id = consultation.id.clone();
        *self.session.write().await = Some(ActiveSession::new(user, auth_token, consultation, phase));

        match room {
            Some(room) => {
                info!("Joining consultation {}", consultation_id);
                self.join(room).await
            }
            None => {
                warn!("Consultation {} has no room yet", consultation_id);
                Err(SessionError::RoomNotReady)
            }
        }
    }

    async fn join(&self, room: RoomDescriptor) -> Result<SessionView, SessionError> {
        let joined = self.media.join(&room).await;

        let (consultation_id, auth_token, mark_started) = {
            let mut session = self.session.write().await;
            let active = session.as_mut().ok_or(SessionError::NoActiveSession)?;
            if active.phase != SessionPhase::Joining {
                debug!("Join settled after session moved to {:?}", active.phase);
                return Ok(self.view_of(active));
            }
            if let Err(e) = joined {
                active.phase = SessionPhase::JoinFailed;
                return Err(SessionError::MediaJoinFailed(e));
            }
            active.phase = SessionPhase::InCall;
            info!("In call for consultation {}", active.consultation.id);
            (
                active.consultation.id.clone(),
                active.auth_token.clone(),
                active.consultation.status == ConsultationStatus::Scheduled,
            )
        };

        if mark_started {
            self.mark_in_progress(&consultation_id, &auth_token).await;
        }
        self.current().await.ok_or(SessionError::NoActiveSession)
    }

    async fn mark_in_progress(&self, consultation_id: &str, auth_token: &str) {
        if self
            .lifecycle
            .validate_status_transition(ConsultationStatus::Scheduled, ConsultationStatus::InProgress)
            .is_err()
        {
            return;
        }
        match self
            .consultations
            .update_status(consultation_id, ConsultationStatus::InProgress, auth_token)
            .await
        {
            Ok(updated) => {
                let mut session = self.session.write().await;
                if let Some(active) = session.as_mut().filter(|a| a.consultation.id == consultation_id) {
                    active.consultation.status = updated.status;
                    active.consultation.started_at = updated.started_at;
                }
            }
            Err(e) => warn!("Could not mark consultation {} in progress: {}", consultation_id, e),
        }
    }

    // ==========================================================================
    // IN CALL
    // ==========================================================================

    /// Only the doctor who opened the active session may act on it.
    pub async fn ensure_owner(&self, user_id: &str) -> Result<(), SessionError> {
        let session = self.session.read().await;
        match session.as_ref() {
            Some(active) if active.doctor_user_id != user_id => {
                warn!("User {} tried to act on consultation {}", user_id, active.consultation.id);
                Err(SessionError::NotSessionOwner)
            }
            _ => Ok(()),
        }
    }

    pub async fn current(&self) -> Option<SessionView> {
        let session = self.session.read().await;
        session.as_ref().map(|active| self.view_of(active))
    }

    fn view_of(&self, active: &ActiveSession) -> SessionView {
        SessionView {
            consultation: active.consultation.clone(),
            notes: active.notes.current().clone(),
            notes_dirty: active.notes.is_dirty(),
            phase: active.phase,
            patient_connected: active.patient_connected,
            peer_typing: active.peer_typing,
            server_status: active.server_status,
            retry_available: active.phase.can_retry(),
            redirect_to: active.phase.is_finished().then(|| DASHBOARD_ROUTE.to_string()),
            notice: active.notice.clone(),
            media: self.media.state(),
        }
    }

    /// Edits the local notes. Nothing is persisted until `save_notes` or
    /// `end_consultation`.
    pub async fn update_notes(&self, patch: NotesPatch) -> Result<SessionView, SessionError> {
        let mut session = self.session.write().await;
        let active = session.as_mut().ok_or(SessionError::NoActiveSession)?;
        if matches!(active.phase, SessionPhase::Ending | SessionPhase::Ended) {
            return Err(SessionError::InvalidState(format!("{:?}", active.phase)));
        }
        active.notes.apply(patch);
        Ok(self.view_of(active))
    }

    /// Persists the notes, then tells the patient if they are connected.
    /// A disconnected patient is skipped, not queued.
    #[instrument(skip(self))]
    pub async fn save_notes(&self) -> Result<SaveOutcome, SessionError> {
        let (consultation_id, auth_token, snapshot) = {
            let session = self.session.read().await;
            let active = session.as_ref().ok_or(SessionError::NoActiveSession)?;
            if matches!(active.phase, SessionPhase::Ending | SessionPhase::Ended) {
                return Err(SessionError::InvalidState(format!("{:?}", active.phase)));
            }
            (active.consultation.id.clone(), active.auth_token.clone(), active.notes.current().clone())
        };

        self.consultations
            .update_notes(&consultation_id, &snapshot, &auth_token)
            .await
            .map_err(|e| SessionError::PersistenceFailed(e.to_string()))?;

        let patient_connected = {
            let mut session = self.session.write().await;
            match session.as_mut().filter(|a| a.consultation.id == consultation_id) {
                Some(active) => {
                    active.notes.mark_saved(snapshot.clone());
                    active.patient_connected
                }
                None => false,
            }
        };

        let peer_notified = if patient_connected {
            self.notify_notes_updated(&consultation_id, &snapshot).await
        } else {
            debug!("Patient not connected, skipping notes update event");
            false
        };

        Ok(SaveOutcome { consultation_id, peer_notified })
    }

    async fn notify_notes_updated(&self, consultation_id: &str, notes: &ClinicalNotes) -> bool {
        let event = OutboundEvent::NotifyNotesUpdated(notes.peer_payload(consultation_id));
        match self.channel.emit(event).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Notes update event not delivered: {}", e);
                false
            }
        }
    }

    // ==========================================================================
    // EXIT AND END
    // ==========================================================================

    /// Leaves the call. The consultation record stays open.
    #[instrument(skip(self))]
    pub async fn exit(&self) -> Result<ExitOutcome, SessionError> {
        let consultation_id = {
            let mut session = self.session.write().await;
            let active = session.as_mut().ok_or(SessionError::NoActiveSession)?;
            if active.phase == SessionPhase::Ending {
                return Err(SessionError::InvalidState("ending".to_string()));
            }
            if !active.phase.is_finished() {
                active.phase = SessionPhase::Exited;
            }
            active.peer_typing = false;
            active.consultation.id.clone()
        };

        self.media.leave().await;
        info!("Exited consultation {}", consultation_id);
        Ok(ExitOutcome { consultation_id, redirect_to: DASHBOARD_ROUTE.to_string() })
    }

    /// Persists edited notes, notifies the peer, leaves the call, in that
    /// order. Every step runs even if an earlier one failed; only the notes
    /// failure reaches the user.
    #[instrument(skip(self))]
    pub async fn end_consultation(&self) -> Result<EndOutcome, SessionError> {
        let (consultation_id, auth_token, snapshot, dirty) = {
            let mut session = self.session.write().await;
            let active = session.as_mut().ok_or(SessionError::NoActiveSession)?;
            if matches!(active.phase, SessionPhase::Ending | SessionPhase::Ended) {
                return Err(SessionError::InvalidState(format!("{:?}", active.phase)));
            }
            active.phase = SessionPhase::Ending;
            (
                active.consultation.id.clone(),
                active.auth_token.clone(),
                active.notes.current().clone(),
                active.notes.is_dirty(),
            )
        };
        info!("Ending consultation {}", consultation_id);

        let persisted = if dirty {
            self.consultations
                .update_notes(&consultation_id, &snapshot, &auth_token)
                .await
                .map(|_| ())
                .map_err(|e| SessionError::PersistenceFailed(e.to_string()))
        } else {
            debug!("No unsaved notes for {}", consultation_id);
            Ok(())
        };
        if let Err(e) = &persisted {
            warn!("End flow: {}", e);
        }

        let end_event = OutboundEvent::EndConsultation(EndConsultationPayload {
            consultation_id: consultation_id.clone(),
        });
        let peer_notified = match self.channel.emit(end_event).await {
            Ok(_) => true,
            Err(e) => {
                warn!("End flow: peer not notified: {}", e);
                false
            }
        };

        self.media.leave().await;

        {
            let mut session = self.session.write().await;
            if let Some(active) = session.as_mut().filter(|a| a.consultation.id == consultation_id) {
                active.phase = SessionPhase::Ended;
                active.patient_connected = false;
                active.peer_typing = false;
                if persisted.is_ok() {
                    active.notes.mark_saved(snapshot);
                }
                let status = active.consultation.status;
                if self
                    .lifecycle
                    .validate_status_transition(status, ConsultationStatus::Completed)
                    .is_ok()
                {
                    active.consultation.status = ConsultationStatus::Completed;
                    active.consultation.ended_at = Some(Utc::now());
                }
            }
        }

        let outcome = match persisted {
            Ok(()) => {
                info!("Consultation {} ended", consultation_id);
                EndOutcome {
                    consultation_id,
                    success: true,
                    notes_saved: true,
                    peer_notified,
                    toast: Toast::success("Consultation ended"),
                    redirect_to: DASHBOARD_ROUTE.to_string(),
                }
            }
            Err(e) => EndOutcome {
                consultation_id,
                success: false,
                notes_saved: false,
                peer_notified,
                toast: e.toast(),
                redirect_to: DASHBOARD_ROUTE.to_string(),
            },
        };
        Ok(outcome)
    }

    // ==========================================================================
    // EVENTS
    // ==========================================================================

    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::ParticipantJoined(presence) => {
                self.set_presence(&presence.consultation_id, &presence.user_id, true).await;
            }
            InboundEvent::ParticipantLeft(presence) => {
                self.set_presence(&presence.consultation_id, &presence.user_id, false).await;
            }
            InboundEvent::TypingIndicator(typing) => {
                let mut session = self.session.write().await;
                if let Some(active) = session.as_mut().filter(|a| a.consultation.id == typing.consultation_id) {
                    if active.is_peer(&typing.user_id) {
                        active.peer_typing = typing.is_typing;
                    }
                }
            }
            InboundEvent::ConsultationStatus(update) => {
                let Some(status) = ConsultationStatus::parse(&update.status) else {
                    warn!("Unknown consultation status {:?}", update.status);
                    return;
                };
                let mut session = self.session.write().await;
                if let Some(active) = session.as_mut().filter(|a| a.consultation.id == update.consultation_id) {
                    active.server_status = Some(status);
                    let current = active.consultation.status;
                    if current != status && self.lifecycle.validate_status_transition(current, status).is_ok() {
                        active.consultation.status = status;
                    }
                }
            }
            InboundEvent::ConsultationEnded(ended) => {
                self.end_by_other(&ended.consultation_id, ended.ended_by.as_deref()).await;
            }
            other => debug!("Session ignores {:?}", other.kind()),
        }
    }

    pub async fn handle_media_signal(&self, signal: MediaSignal) {
        match signal {
            MediaSignal::RemoteJoined { .. } => self.set_active_presence(true).await,
            MediaSignal::RemoteLeft { .. } => self.set_active_presence(false).await,
            MediaSignal::MeetingEndedByOther => {
                let consultation_id = {
                    let session = self.session.read().await;
                    session.as_ref().map(|a| a.consultation.id.clone())
                };
                if let Some(consultation_id) = consultation_id {
                    self.end_by_other(&consultation_id, None).await;
                }
            }
            MediaSignal::Connected | MediaSignal::Failed(_) => {}
        }
    }

    async fn set_presence(&self, consultation_id: &str, user_id: &str, connected: bool) {
        let mut session = self.session.write().await;
        if let Some(active) = session.as_mut().filter(|a| a.consultation.id == consultation_id) {
            if active.is_peer(user_id) {
                debug!("Patient {} connected: {}", user_id, connected);
                active.patient_connected = connected;
                if !connected {
                    active.peer_typing = false;
                }
            }
        }
    }

    async fn set_active_presence(&self, connected: bool) {
        let mut session = self.session.write().await;
        if let Some(active) = session.as_mut().filter(|a| !a.phase.is_finished()) {
            active.patient_connected = connected;
        }
    }

    /// Unconditional and final: the local call is torn down and never
    /// rejoined.
    async fn end_by_other(&self, consultation_id: &str, ended_by: Option<&str>) {
        {
            let mut session = self.session.write().await;
            let Some(active) = session.as_mut().filter(|a| a.consultation.id == consultation_id) else {
                return;
            };
            if ended_by.is_some_and(|by| !active.is_peer(by)) {
                debug!("Own end echo for {}", consultation_id);
                return;
            }
            if active.phase.is_finished() || active.phase == SessionPhase::Ending {
                return;
            }
            info!("Consultation {} ended by the other participant", consultation_id);
            active.phase = SessionPhase::EndedByOther;
            active.patient_connected = false;
            active.peer_typing = false;
            active.notice = Some(Toast::info("The consultation was ended by the other participant."));
        }
        self.media.leave().await;
    }

    /// Routes session events from the channel and the media controller.
    pub async fn spawn_listeners(self: Arc<Self>) -> JoinHandle<()> {
        // One stream, so a left followed by a joined is applied in that order.
        let mut events = self
            .channel
            .subscribe_many(&[
                EventKind::ParticipantJoined,
                EventKind::ParticipantLeft,
                EventKind::TypingIndicator,
                EventKind::ConsultationStatus,
                EventKind::ConsultationEnded,
            ])
            .await;
        let mut signals = self.media.signals();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = events.recv() => self.handle_event(event).await,
                    signal = signals.recv() => match signal {
                        Ok(signal) => self.handle_media_signal(signal).await,
                        Err(RecvError::Lagged(skipped)) => warn!("Session missed {} media signals", skipped),
                        Err(RecvError::Closed) => break,
                    },
                    else => break,
                }
            }
            info!("Session listeners stopped");
        })
    }
}
