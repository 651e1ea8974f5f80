// libs/access-guard-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::GuardDecision;
use crate::router::GuardCellState;

#[derive(Debug, Deserialize)]
pub struct EvaluateQuery {
    pub path: String,
    /// Answer from cache only, `loading` while the lookup runs.
    #[serde(default)]
    pub peek: bool,
}

pub async fn evaluate_route(
    State(state): State<Arc<GuardCellState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<EvaluateQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let decision = if query.peek {
        state.guard.peek(Some(&user), token, &query.path).await
    } else {
        state.guard.check(Some(&user), token, &query.path).await?
    };

    Ok(Json(decision_json(&query.path, &decision)))
}

pub fn decision_json(path: &str, decision: &GuardDecision) -> Value {
    match decision {
        GuardDecision::Allow => json!({ "path": path, "decision": "allow" }),
        GuardDecision::Loading => json!({ "path": path, "decision": "loading" }),
        GuardDecision::Redirect { to, error } => json!({
            "path": path,
            "decision": "redirect",
            "redirectTo": to,
            "error": error.as_ref().map(|e| e.user_message()),
        }),
    }
}
