// libs/video-conferencing-cell/src/handlers.rs
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Extension, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{MediaCommand, ProviderEvent, ToggleRequest};
use crate::router::MediaCellState;

// ==============================================================================
// STATE AND DEVICE HANDLERS
// ==============================================================================

pub async fn get_media_state(
    State(state): State<Arc<MediaCellState>>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({
        "media": state.controller.state(),
        "clientAttached": state.bridge.is_attached(),
    })))
}

/// Optional `{"enabled": bool}` body. A request for the state the provider
/// already reports issues no command.
fn toggle_target(body: &Bytes) -> Result<Option<bool>, AppError> {
    if body.is_empty() {
        return Ok(None);
    }
    let request: ToggleRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid toggle request: {}", e)))?;
    Ok(request.enabled)
}

pub async fn toggle_mic(
    State(state): State<Arc<MediaCellState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let target = toggle_target(&body)?;
    if target != Some(state.controller.state().is_mic_on) {
        state.controller.toggle_mic().await?;
    }
    Ok(Json(json!({ "success": true, "media": state.controller.state() })))
}

pub async fn toggle_camera(
    State(state): State<Arc<MediaCellState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let target = toggle_target(&body)?;
    if target != Some(state.controller.state().is_camera_on) {
        state.controller.toggle_camera().await?;
    }
    Ok(Json(json!({ "success": true, "media": state.controller.state() })))
}

pub async fn toggle_screen_share(
    State(state): State<Arc<MediaCellState>>,
) -> Result<Json<Value>, AppError> {
    state.controller.toggle_screen_share().await?;
    Ok(Json(json!({ "success": true, "media": state.controller.state() })))
}

pub async fn clear_media_error(
    State(state): State<Arc<MediaCellState>>,
) -> Result<Json<Value>, AppError> {
    state.controller.clear_error().await;
    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// MEDIA CLIENT BRIDGE HANDLERS
// ==============================================================================

pub async fn media_commands(
    State(state): State<Arc<MediaCellState>>,
    Extension(user): Extension<User>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Media client attached for user {}", user.id);
    let commands = state.bridge.commands();

    let stream = stream::unfold(commands, |mut commands| async move {
        loop {
            match commands.recv().await {
                Ok(command) => {
                    let event = command_event(&command);
                    return Some((Ok(event), commands));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Media client lagged, {} commands dropped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn command_event(command: &MediaCommand) -> Event {
    match serde_json::to_string(command) {
        Ok(data) => Event::default().event("media_command").data(data),
        Err(e) => {
            warn!("Could not encode media command: {}", e);
            Event::default().comment("encode error")
        }
    }
}

pub async fn post_media_event(
    State(state): State<Arc<MediaCellState>>,
    Json(event): Json<ProviderEvent>,
) -> Result<Json<Value>, AppError> {
    debug!("Provider event reported: {:?}", event);
    state.bridge.deliver(event).await;
    Ok(Json(json!({ "success": true })))
}
