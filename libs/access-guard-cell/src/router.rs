// libs/access-guard-cell/src/router.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;
use crate::services::AccessGuardService;

pub struct GuardCellState {
    pub config: Arc<AppConfig>,
    pub guard: Arc<AccessGuardService>,
}

pub fn access_guard_routes(state: Arc<GuardCellState>) -> Router {
    Router::new()
        .route("/evaluate", get(evaluate_route))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
