// libs/consultation-session-cell/src/services/resources.rs
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_rest::{ApiClient, ApiError};

use crate::error::SessionError;
use crate::models::{Appointment, ClinicalNotes, Consultation, ConsultationStatus};

#[async_trait]
pub trait ConsultationResource: Send + Sync {
    async fn get_consultation(&self, consultation_id: &str, auth_token: &str) -> Result<Consultation, SessionError>;

    async fn update_notes(
        &self,
        consultation_id: &str,
        notes: &ClinicalNotes,
        auth_token: &str,
    ) -> Result<Consultation, SessionError>;

    async fn update_status(
        &self,
        consultation_id: &str,
        status: ConsultationStatus,
        auth_token: &str,
    ) -> Result<Consultation, SessionError>;
}

#[async_trait]
pub trait AppointmentResource: Send + Sync {
    async fn get_appointment(&self, appointment_id: &str, auth_token: &str) -> Result<Appointment, SessionError>;

    /// Creates the consultation record, room credentials included.
    async fn create_consultation(&self, appointment: &Appointment, auth_token: &str) -> Result<Consultation, SessionError>;
}

fn classify(err: anyhow::Error) -> SessionError {
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::NotFound(msg)) => SessionError::NotFound(msg.clone()),
        _ => SessionError::NetworkError(err.to_string()),
    }
}

fn representation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn first_row<T: DeserializeOwned>(rows: Vec<Value>, what: &str, id: &str) -> Result<T, SessionError> {
    let Some(row) = rows.into_iter().next() else {
        return Err(SessionError::NotFound(format!("{} {}", what, id)));
    };
    serde_json::from_value(row)
        .map_err(|e| SessionError::NetworkError(format!("Failed to parse {}: {}", what, e)))
}

/// PostgREST-backed consultations table.
pub struct RestConsultationResource {
    client: ApiClient,
}

impl RestConsultationResource {
    pub fn new(config: &AppConfig) -> Self {
        Self { client: ApiClient::new(config) }
    }

    async fn patch(&self, consultation_id: &str, body: Value, auth_token: &str) -> Result<Consultation, SessionError> {
        let path = format!("/rest/v1/consultations?id=eq.{}", consultation_id);
        let rows: Vec<Value> = self
            .client
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(representation_headers()))
            .await
            .map_err(classify)?;
        first_row(rows, "consultation", consultation_id)
    }
}

#[async_trait]
impl ConsultationResource for RestConsultationResource {
    async fn get_consultation(&self, consultation_id: &str, auth_token: &str) -> Result<Consultation, SessionError> {
        debug!("Fetching consultation {}", consultation_id);
        let path = format!("/rest/v1/consultations?id=eq.{}", consultation_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(classify)?;
        first_row(rows, "consultation", consultation_id)
    }

    async fn update_notes(
        &self,
        consultation_id: &str,
        notes: &ClinicalNotes,
        auth_token: &str,
    ) -> Result<Consultation, SessionError> {
        let updated = self.patch(consultation_id, notes.update_body(Utc::now()), auth_token).await?;
        info!("Clinical notes saved for consultation {}", consultation_id);
        Ok(updated)
    }

    async fn update_status(
        &self,
        consultation_id: &str,
        status: ConsultationStatus,
        auth_token: &str,
    ) -> Result<Consultation, SessionError> {
        let now = Utc::now().to_rfc3339();
        let mut body = json!({ "status": status, "updated_at": now });
        match status {
            ConsultationStatus::InProgress => body["started_at"] = json!(now),
            ConsultationStatus::Completed => body["ended_at"] = json!(now),
            _ => {}
        }
        let updated = self.patch(consultation_id, body, auth_token).await?;
        info!("Consultation {} is now {:?}", consultation_id, status);
        Ok(updated)
    }
}

pub struct RestAppointmentResource {
    client: ApiClient,
}

impl RestAppointmentResource {
    pub fn new(config: &AppConfig) -> Self {
        Self { client: ApiClient::new(config) }
    }
}

#[async_trait]
impl AppointmentResource for RestAppointmentResource {
    async fn get_appointment(&self, appointment_id: &str, auth_token: &str) -> Result<Appointment, SessionError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(classify)?;
        first_row(rows, "appointment", appointment_id)
    }

    async fn create_consultation(&self, appointment: &Appointment, auth_token: &str) -> Result<Consultation, SessionError> {
        let body = json!({
            "appointment_id": appointment.id,
            "doctor_id": appointment.doctor_id,
            "patient_id": appointment.patient_id,
            "status": ConsultationStatus::Scheduled,
            "created_at": Utc::now().to_rfc3339(),
        });
        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                "/rest/v1/consultations",
                Some(auth_token),
                Some(body),
                Some(representation_headers()),
            )
            .await
            .map_err(classify)?;
        let consultation: Consultation = first_row(rows, "created consultation for appointment", &appointment.id)?;
        info!("Consultation {} created for appointment {}", consultation.id, appointment.id);
        Ok(consultation)
    }
}
