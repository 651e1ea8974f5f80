// libs/consultation-session-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use realtime_channel_cell::NotesUpdatedPayload;
use shared_models::toast::Toast;
use video_conferencing_cell::{MediaState, RoomDescriptor};

// ==============================================================================
// CONSULTATION RECORD
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl ConsultationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConsultationStatus::Completed | ConsultationStatus::Cancelled | ConsultationStatus::NoShow)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_value(Value::String(raw.to_ascii_uppercase())).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: String,
    #[serde(default)]
    pub appointment_id: Option<String>,
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub room_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    pub status: ConsultationStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub prescription: Option<String>,
    #[serde(default)]
    pub follow_up_date: Option<NaiveDate>,
    #[serde(default)]
    pub follow_up_notes: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Consultation {
    pub fn room(&self) -> Option<RoomDescriptor> {
        RoomDescriptor::from_parts(self.room_url.clone(), self.token.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn can_start_consultation(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed | AppointmentStatus::InProgress
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub doctor_id: String,
    pub patient_id: String,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

// ==============================================================================
// CLINICAL NOTES
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalNotes {
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_notes: Option<String>,
}

impl ClinicalNotes {
    pub fn from_consultation(consultation: &Consultation) -> Self {
        Self {
            notes: consultation.notes.clone(),
            diagnosis: consultation.diagnosis.clone(),
            prescription: consultation.prescription.clone(),
            follow_up_date: consultation.follow_up_date,
            follow_up_notes: consultation.follow_up_notes.clone(),
        }
    }

    /// PATCH body for the consultation resource.
    pub fn update_body(&self, now: DateTime<Utc>) -> Value {
        json!({
            "notes": self.notes,
            "diagnosis": self.diagnosis,
            "prescription": self.prescription,
            "follow_up_date": self.follow_up_date,
            "follow_up_notes": self.follow_up_notes,
            "updated_at": now.to_rfc3339(),
        })
    }

    pub fn peer_payload(&self, consultation_id: &str) -> NotesUpdatedPayload {
        NotesUpdatedPayload {
            consultation_id: consultation_id.to_string(),
            notes: self.notes.clone(),
            prescription: self.prescription.clone(),
            follow_up_date: self.follow_up_date.map(|d| d.to_string()),
        }
    }
}

/// Edits from the notes form. Absent fields are left alone; blank strings
/// clear the field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesPatch {
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_notes: Option<String>,
}

fn blank_to_none(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Last persisted notes next to the edited copy.
#[derive(Debug, Clone, Default)]
pub struct NotesDraft {
    saved: ClinicalNotes,
    current: ClinicalNotes,
}

impl NotesDraft {
    pub fn new(saved: ClinicalNotes) -> Self {
        Self { current: saved.clone(), saved }
    }

    pub fn current(&self) -> &ClinicalNotes {
        &self.current
    }

    pub fn is_dirty(&self) -> bool {
        self.saved != self.current
    }

    pub fn apply(&mut self, patch: NotesPatch) {
        if let Some(notes) = patch.notes {
            self.current.notes = blank_to_none(notes);
        }
        if let Some(diagnosis) = patch.diagnosis {
            self.current.diagnosis = blank_to_none(diagnosis);
        }
        if let Some(prescription) = patch.prescription {
            self.current.prescription = blank_to_none(prescription);
        }
        if let Some(date) = patch.follow_up_date {
            self.current.follow_up_date = Some(date);
        }
        if let Some(follow_up_notes) = patch.follow_up_notes {
            self.current.follow_up_notes = blank_to_none(follow_up_notes);
        }
    }

    /// Records `persisted` as saved. Edits made meanwhile stay dirty.
    pub fn mark_saved(&mut self, persisted: ClinicalNotes) {
        self.saved = persisted;
    }
}

// ==============================================================================
// SESSION STATE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Record fetched, no room descriptor yet. Manual retry only.
    RoomNotReady,
    Joining,
    /// Join failed; the media error stays visible until cleared.
    JoinFailed,
    InCall,
    Ending,
    Ended,
    /// Left the call without closing the record.
    Exited,
    EndedByOther,
}

impl SessionPhase {
    /// The session no longer holds the media channel.
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionPhase::Ended | SessionPhase::Exited | SessionPhase::EndedByOther)
    }

    pub fn can_retry(&self) -> bool {
        matches!(self, SessionPhase::RoomNotReady | SessionPhase::JoinFailed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub consultation: Consultation,
    pub notes: ClinicalNotes,
    pub notes_dirty: bool,
    pub phase: SessionPhase,
    pub patient_connected: bool,
    pub peer_typing: bool,
    pub server_status: Option<ConsultationStatus>,
    pub retry_available: bool,
    /// Where the UI goes once the session no longer holds the call.
    pub redirect_to: Option<String>,
    pub notice: Option<Toast>,
    pub media: MediaState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub consultation_id: String,
    pub peer_notified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitOutcome {
    pub consultation_id: String,
    pub redirect_to: String,
}

/// Result of the end sequence. Only a notes persistence failure turns it
/// into an error for the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndOutcome {
    pub consultation_id: String,
    pub success: bool,
    pub notes_saved: bool,
    pub peer_notified: bool,
    pub toast: Toast,
    pub redirect_to: String,
}
