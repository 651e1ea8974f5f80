// libs/video-conferencing-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;
use crate::services::{MediaBridge, MediaSessionController};

pub struct MediaCellState {
    pub config: Arc<AppConfig>,
    pub controller: Arc<MediaSessionController>,
    pub bridge: MediaBridge,
}

impl MediaCellState {
    /// Controller backed by a bridge, so the browser client carries the media.
    pub fn bridged(config: Arc<AppConfig>, bridge: MediaBridge) -> Self {
        let controller = Arc::new(MediaSessionController::new(Arc::new(bridge.clone())));
        Self { config, controller, bridge }
    }
}

pub fn media_routes(state: Arc<MediaCellState>) -> Router {
    Router::new()
        .route("/state", get(get_media_state))
        .route("/mic", post(toggle_mic))
        .route("/camera", post(toggle_camera))
        .route("/screen-share", post(toggle_screen_share))
        .route("/error/clear", post(clear_media_error))
        .route("/commands", get(media_commands))
        .route("/events", post(post_media_event))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
