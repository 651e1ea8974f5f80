// libs/consultation-session-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::info;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::error::SessionError;
use crate::models::{NotesPatch, SessionView};
use crate::router::SessionCellState;

fn ensure_doctor(user: &User) -> Result<(), AppError> {
    if !user.is_doctor() {
        return Err(AppError::Forbidden("Only doctors can run consultations".to_string()));
    }
    Ok(())
}

async fn ensure_session_doctor(state: &SessionCellState, user: &User) -> Result<(), AppError> {
    ensure_doctor(user)?;
    state.orchestrator.ensure_owner(&user.id).await?;
    Ok(())
}

/// Guard rejections are flow control: the client gets the redirect, not an
/// error.
fn entry_response(result: Result<SessionView, SessionError>) -> Result<Json<Value>, AppError> {
    match result {
        Ok(view) => Ok(Json(json!({ "success": true, "session": view }))),
        Err(SessionError::GuardRejected { redirect_to }) => {
            Ok(Json(json!({ "success": false, "redirectTo": redirect_to })))
        }
        Err(e) => Err(e.into()),
    }
}

// ==============================================================================
// ENTRY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn start_consultation(
    State(state): State<Arc<SessionCellState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(consultation_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    ensure_doctor(&user)?;
    info!("Doctor {} opening consultation {}", user.id, consultation_id);
    entry_response(state.orchestrator.start(&user, auth.token(), &consultation_id).await)
}

pub async fn start_from_appointment(
    State(state): State<Arc<SessionCellState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    ensure_doctor(&user)?;
    entry_response(
        state
            .orchestrator
            .start_from_appointment(&user, auth.token(), &appointment_id)
            .await,
    )
}

pub async fn retry_join(
    State(state): State<Arc<SessionCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_session_doctor(&state, &user).await?;
    entry_response(state.orchestrator.retry().await)
}

// ==============================================================================
// IN-CALL HANDLERS
// ==============================================================================

pub async fn current_session(
    State(state): State<Arc<SessionCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_session_doctor(&state, &user).await?;
    let session = state.orchestrator.current().await.ok_or(SessionError::NoActiveSession)?;
    Ok(Json(json!({ "session": session })))
}

pub async fn update_notes(
    State(state): State<Arc<SessionCellState>>,
    Extension(user): Extension<User>,
    Json(patch): Json<NotesPatch>,
) -> Result<Json<Value>, AppError> {
    ensure_session_doctor(&state, &user).await?;
    let session = state.orchestrator.update_notes(patch).await?;
    Ok(Json(json!({ "success": true, "session": session })))
}

pub async fn save_notes(
    State(state): State<Arc<SessionCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_session_doctor(&state, &user).await?;
    let outcome = state.orchestrator.save_notes().await?;
    Ok(Json(json!({
        "success": true,
        "consultationId": outcome.consultation_id,
        "peerNotified": outcome.peer_notified,
    })))
}

// ==============================================================================
// EXIT AND END HANDLERS
// ==============================================================================

pub async fn exit_consultation(
    State(state): State<Arc<SessionCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_session_doctor(&state, &user).await?;
    let outcome = state.orchestrator.exit().await?;
    Ok(Json(json!({
        "success": true,
        "consultationId": outcome.consultation_id,
        "redirectTo": outcome.redirect_to,
    })))
}

pub async fn end_consultation(
    State(state): State<Arc<SessionCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_session_doctor(&state, &user).await?;
    let outcome = state.orchestrator.end_consultation().await?;
    Ok(Json(serde_json::to_value(&outcome).map_err(|e| AppError::Internal(e.to_string()))?))
}
