#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::json;

use access_guard_cell::{AccessGuardService, GuardError, OnboardingStatusSource};
use consultation_session_cell::*;
use realtime_channel_cell::testing::ScriptedChannel;
use realtime_channel_cell::RealtimeChannel;
use shared_models::auth::{OnboardingStatus, User};
use shared_utils::test_utils::TestUser;
use video_conferencing_cell::testing::FakeProvider;
use video_conferencing_cell::MediaSessionController;

pub type CallLog = Arc<StdMutex<Vec<String>>>;

/// Onboarding status the test can change between calls.
pub struct FixedStatus(pub StdMutex<Option<OnboardingStatus>>);

impl FixedStatus {
    pub fn set(&self, status: Option<OnboardingStatus>) {
        *self.0.lock().unwrap() = status;
    }
}

#[async_trait]
impl OnboardingStatusSource for FixedStatus {
    async fn onboarding_status(&self, _: &str, _: &str) -> Result<Option<OnboardingStatus>, GuardError> {
        Ok(*self.0.lock().unwrap())
    }
}

/// Consultation table held in memory.
pub struct FakeConsultations {
    pub record: StdMutex<Consultation>,
    pub fail_notes: AtomicBool,
    pub log: CallLog,
}

impl FakeConsultations {
    pub fn new(record: Consultation, log: CallLog) -> Self {
        Self { record: StdMutex::new(record), fail_notes: AtomicBool::new(false), log }
    }

    pub fn fail_notes(&self, fail: bool) {
        self.fail_notes.store(fail, Ordering::SeqCst);
    }

    pub fn set_room(&self, room_url: Option<&str>) {
        self.record.lock().unwrap().room_url = room_url.map(str::to_string);
    }

    pub fn stored(&self) -> Consultation {
        self.record.lock().unwrap().clone()
    }

    fn push(&self, entry: &str) {
        self.log.lock().unwrap().push(entry.to_string());
    }
}

#[async_trait]
impl ConsultationResource for FakeConsultations {
    async fn get_consultation(&self, consultation_id: &str, _: &str) -> Result<Consultation, SessionError> {
        self.push("get_consultation");
        let record = self.stored();
        if record.id != consultation_id {
            return Err(SessionError::NotFound(consultation_id.to_string()));
        }
        Ok(record)
    }

    async fn update_notes(
        &self,
        _: &str,
        notes: &ClinicalNotes,
        _: &str,
    ) -> Result<Consultation, SessionError> {
        self.push("update_notes");
        if self.fail_notes.load(Ordering::SeqCst) {
            return Err(SessionError::NetworkError("503 from consultations".to_string()));
        }
        let mut record = self.record.lock().unwrap();
        record.notes = notes.notes.clone();
        record.diagnosis = notes.diagnosis.clone();
        record.prescription = notes.prescription.clone();
        record.follow_up_date = notes.follow_up_date;
        record.follow_up_notes = notes.follow_up_notes.clone();
        Ok(record.clone())
    }

    async fn update_status(
        &self,
        _: &str,
        status: ConsultationStatus,
        _: &str,
    ) -> Result<Consultation, SessionError> {
        self.push(&format!("update_status:{:?}", status));
        let mut record = self.record.lock().unwrap();
        record.status = status;
        Ok(record.clone())
    }
}

pub struct NoAppointments;

#[async_trait]
impl AppointmentResource for NoAppointments {
    async fn get_appointment(&self, appointment_id: &str, _: &str) -> Result<Appointment, SessionError> {
        Err(SessionError::NotFound(appointment_id.to_string()))
    }

    async fn create_consultation(&self, appointment: &Appointment, _: &str) -> Result<Consultation, SessionError> {
        Err(SessionError::NotFound(appointment.id.clone()))
    }
}

pub fn consultation(id: &str) -> Consultation {
    serde_json::from_value(json!({
        "id": id,
        "appointment_id": "appt-1",
        "doctor_id": "doctor-row-1",
        "patient_id": "patient-1",
        "room_url": "https://media.example.com/rooms/abc",
        "token": "room-token",
        "status": "SCHEDULED"
    }))
    .unwrap()
}

pub struct Harness {
    pub orchestrator: Arc<ConsultationSessionOrchestrator>,
    pub consultations: Arc<FakeConsultations>,
    pub provider: Arc<FakeProvider>,
    pub channel: Arc<ScriptedChannel>,
    pub status: Arc<FixedStatus>,
    pub log: CallLog,
    pub doctor: User,
    pub token: String,
}

pub fn harness_with(
    status: Option<OnboardingStatus>,
    record: Consultation,
    appointments: Arc<dyn AppointmentResource>,
) -> Harness {
    let log: CallLog = Arc::new(StdMutex::new(Vec::new()));
    let consultations = Arc::new(FakeConsultations::new(record, Arc::clone(&log)));
    let provider = Arc::new(FakeProvider::new());
    let channel = Arc::new(ScriptedChannel::new());
    let status = Arc::new(FixedStatus(StdMutex::new(status)));
    let guard = Arc::new(AccessGuardService::new(status.clone()));
    let media = Arc::new(MediaSessionController::new(provider.clone()));

    let orchestrator = Arc::new(ConsultationSessionOrchestrator::new(
        consultations.clone(),
        appointments,
        guard,
        media,
        channel.clone() as Arc<dyn RealtimeChannel>,
    ));

    Harness {
        orchestrator,
        consultations,
        provider,
        channel,
        status,
        log,
        doctor: TestUser::doctor("doc@example.com").to_user(),
        token: "doctor-token".to_string(),
    }
}

pub fn harness() -> Harness {
    harness_with(Some(OnboardingStatus::Verified), consultation("c-1"), Arc::new(NoAppointments))
}
