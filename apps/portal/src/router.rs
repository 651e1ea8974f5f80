use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use access_guard_cell::{access_guard_routes, GuardCellState};
use consultation_request_cell::{consultation_request_routes, RequestCellState};
use consultation_session_cell::{consultation_session_routes, SessionCellState};
use realtime_channel_cell::RealtimeChannel;
use video_conferencing_cell::{media_routes, MediaCellState};

pub struct PortalCells {
    pub requests: Arc<RequestCellState>,
    pub guard: Arc<GuardCellState>,
    pub media: Arc<MediaCellState>,
    pub sessions: Arc<SessionCellState>,
}

pub fn create_router(cells: PortalCells) -> Router {
    let channel = Arc::clone(&cells.requests.channel);

    Router::new()
        .route("/", get(|| async { "Telehealth provider portal is running!" }))
        .route(
            "/health",
            get(move || {
                let status = channel.status();
                async move { Json(json!({ "status": "ok", "realtime": status })) }
            }),
        )
        .nest("/requests", consultation_request_routes(cells.requests))
        .nest("/guard", access_guard_routes(cells.guard))
        .nest("/media", media_routes(cells.media))
        .nest("/consultations", consultation_session_routes(cells.sessions))
}
