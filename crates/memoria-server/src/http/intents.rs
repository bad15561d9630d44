use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use memoria_core::MemoriaError;
use memoria_intents::{CreateIntentRequest, FireResult, TriggerKind};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct CreateRequest {
    pub user_id: String,
    pub trigger_kind: String,
    pub trigger_config: Value,
    pub action: Value,
    #[serde(default)]
    pub max_executions: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// POST /v1/intents
pub async fn create_handler(State(state): State<Arc<AppState>>, Json(req): Json<CreateRequest>) -> ApiResult<Json<Value>> {
    let trigger_kind = TriggerKind::parse(&req.trigger_kind)
        .ok_or_else(|| MemoriaError::Validation(format!("unknown trigger kind: {}", req.trigger_kind)))?;

    let intent = state
        .intents
        .create(CreateIntentRequest {
            user_id: req.user_id,
            trigger_kind,
            trigger_config: req.trigger_config,
            action: req.action,
            max_executions: req.max_executions,
            expires_at: req.expires_at,
        })
        .await
        .map_err(MemoriaError::from)?;

    Ok(Json(json!({ "status": "success", "intent": intent })))
}

/// GET /v1/intents?user_id
pub async fn list_handler(State(state): State<Arc<AppState>>, Query(q): Query<UserIdQuery>) -> ApiResult<Json<Value>> {
    let intents = state.intents.list(q.user_id).await.map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "intents": intents })))
}

/// GET /v1/intents/{id}
pub async fn get_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let intent = state.intents.get(id).await.map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "intent": intent })))
}

/// PUT /v1/intents/{id} — full-row replace; the caller is expected to send
/// back a previously-fetched row with fields changed.
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut intent): Json<memoria_stores::types::ScheduledIntentRow>,
) -> ApiResult<Json<Value>> {
    intent.id = id;
    state.intents.update(intent.clone()).await.map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "intent": intent })))
}

/// DELETE /v1/intents/{id}?user_id
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<Json<Value>> {
    state.intents.delete(id, q.user_id).await.map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success" })))
}

#[derive(Deserialize)]
pub struct PendingQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_pending_limit")]
    pub limit: usize,
}

fn default_pending_limit() -> usize {
    50
}

/// GET /v1/intents/pending
pub async fn pending_handler(State(state): State<Arc<AppState>>, Query(q): Query<PendingQuery>) -> ApiResult<Json<Value>> {
    let pending = state.intents.pending(q.user_id, q.limit).await.map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "pending": pending })))
}

/// POST /v1/intents/{id}/claim
pub async fn claim_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let intent = state.intents.claim(id).await.map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "intent": intent })))
}

#[derive(Deserialize)]
pub struct FireRequest {
    pub result: String,
    #[serde(default)]
    pub gate_result: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// POST /v1/intents/{id}/fire
pub async fn fire_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<FireRequest>,
) -> ApiResult<Json<Value>> {
    let result = match req.result.as_str() {
        "success" => FireResult::Success,
        "condition_not_met" => FireResult::ConditionNotMet,
        "gate_blocked" => FireResult::GateBlocked,
        "failed" => FireResult::Failed,
        other => return Err(MemoriaError::Validation(format!("unknown fire result: {other}")).into()),
    };
    let intent = state
        .intents
        .fire(id, result, req.gate_result, req.detail)
        .await
        .map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "intent": intent })))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

/// GET /v1/intents/{id}/history
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let history = state.intents.history(id, q.limit).await.map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "history": history })))
}
