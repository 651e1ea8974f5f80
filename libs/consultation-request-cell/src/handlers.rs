// libs/consultation-request-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{RespondOutcome, RespondRequest};
use crate::router::RequestCellState;

// ==============================================================================
// NOTIFICATION PANEL HANDLERS
// ==============================================================================

pub async fn list_notifications(
    State(state): State<Arc<RequestCellState>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let notifications = state.center.snapshot().await;
    let most_recent_unread = state.center.most_recent_unread().await;
    let unread_count = state.center.unread_count().await;

    Ok(Json(json!({
        "notifications": notifications,
        "unreadCount": unread_count,
        "mostRecentUnread": most_recent_unread,
    })))
}

pub async fn mark_notification_read(
    State(state): State<Arc<RequestCellState>>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !state.center.mark_read(notification_id).await {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}

pub async fn mark_all_read(
    State(state): State<Arc<RequestCellState>>,
) -> Result<Json<Value>, AppError> {
    let updated = state.center.mark_all_read().await;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

pub async fn dismiss_notification(
    State(state): State<Arc<RequestCellState>>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .center
        .dismiss(notification_id)
        .await
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;
    Ok(Json(json!({ "success": true })))
}

pub async fn clear_read(
    State(state): State<Arc<RequestCellState>>,
) -> Result<Json<Value>, AppError> {
    let removed = state.center.clear_read().await;
    Ok(Json(json!({ "success": true, "removed": removed })))
}

// ==============================================================================
// OFFER RESOLUTION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn respond_to_request(
    State(state): State<Arc<RequestCellState>>,
    Extension(user): Extension<User>,
    Path(request_id): Path<String>,
    Json(body): Json<RespondRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_doctor() {
        return Err(AppError::Forbidden("Only doctors can respond to consultation requests".to_string()));
    }

    info!("Doctor {} responding to request {} (accept: {})", user.id, request_id, body.accept);

    match state.resolver.respond(&request_id, body.accept).await? {
        RespondOutcome::Accepted { request_id, appointment_id } => Ok(Json(json!({
            "success": true,
            "requestId": request_id,
            "appointmentId": appointment_id,
        }))),
        RespondOutcome::Declined { request_id } => Ok(Json(json!({
            "success": true,
            "requestId": request_id,
        }))),
    }
}

pub async fn connection_status(
    State(state): State<Arc<RequestCellState>>,
) -> Result<Json<Value>, AppError> {
    let status = state.channel.status();
    Ok(Json(json!({
        "connection": status,
        "offline": status.is_offline(),
    })))
}
