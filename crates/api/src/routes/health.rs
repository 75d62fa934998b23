use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

/// Health-check routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Liveness + database reachability probe.
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let database = match conseq_db::health_check(&state.pool).await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            "unreachable"
        }
    };

    Json(json!({
        "status": "ok",
        "database": database,
    }))
}
