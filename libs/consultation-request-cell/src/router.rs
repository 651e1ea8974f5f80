// libs/consultation-request-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use realtime_channel_cell::RealtimeChannel;
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;
use crate::services::{NotificationCenter, OfferResolutionService};

pub struct RequestCellState {
    pub config: Arc<AppConfig>,
    pub center: Arc<NotificationCenter>,
    pub resolver: Arc<OfferResolutionService>,
    pub channel: Arc<dyn RealtimeChannel>,
}

impl RequestCellState {
    pub fn new(config: Arc<AppConfig>, center: Arc<NotificationCenter>, channel: Arc<dyn RealtimeChannel>) -> Self {
        let resolver = Arc::new(OfferResolutionService::new(Arc::clone(&center), Arc::clone(&channel)));
        Self { config, center, resolver, channel }
    }
}

pub fn consultation_request_routes(state: Arc<RequestCellState>) -> Router {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/clear-read", post(clear_read))
        .route("/notifications/{notification_id}/read", post(mark_notification_read))
        .route("/notifications/{notification_id}", delete(dismiss_notification))
        .route("/requests/{request_id}/respond", post(respond_to_request))
        .route("/status", get(connection_status))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
