// libs/consultation-session-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;
use crate::services::ConsultationSessionOrchestrator;

pub struct SessionCellState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<ConsultationSessionOrchestrator>,
}

pub fn consultation_session_routes(state: Arc<SessionCellState>) -> Router {
    Router::new()
        .route("/{consultation_id}/start", post(start_consultation))
        .route("/appointments/{appointment_id}/start", post(start_from_appointment))
        .route("/current", get(current_session))
        .route("/current/notes", put(update_notes))
        .route("/current/notes/save", post(save_notes))
        .route("/current/exit", post(exit_consultation))
        .route("/current/end", post(end_consultation))
        .route("/current/retry", post(retry_join))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
