use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — plain liveness probe.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /health/full — per-backend status (§6: `{ok|degraded|down}` plus
/// per-backend detail), grounded in the reference stack's aggregate
/// `/health` handler pattern.
pub async fn health_full_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let hooks: Vec<Value> = state
        .hook_health
        .all_entries()
        .into_iter()
        .map(|e| {
            json!({
                "connector": e.connector,
                "status": e.status.to_string(),
                "requests_ok": e.requests_ok,
                "requests_err": e.requests_err,
                "last_error": e.last_error,
            })
        })
        .collect();

    let overall = if hooks.iter().any(|h| h["status"] == "down") {
        "degraded"
    } else {
        "ok"
    };

    Json(json!({
        "status": overall,
        "active_conversations": state.conversations.active_count(),
        "hooks": hooks,
    }))
}
