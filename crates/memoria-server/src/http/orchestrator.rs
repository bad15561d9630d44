use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use memoria_core::{ConversationId, MemoriaError};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct MessageRequest {
    pub user_id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "chat".to_string()
}

/// POST /v1/orchestrator/message — route one inbound turn, return its
/// injections (§4.7).
pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequest>,
) -> ApiResult<Json<Value>> {
    let conversation_id = ConversationId::from(req.conversation_id);
    let result = state
        .conversations
        .send_message(&req.user_id, &conversation_id, &req.role, &req.content, &req.channel)
        .await
        .map_err(MemoriaError::from)?;

    Ok(Json(json!({
        "status": "success",
        "injections": result.injections,
        "profile_summary": result.profile_summary,
        "gap_question": result.gap_question,
    })))
}

#[derive(Deserialize)]
pub struct RetrieveRequest {
    pub user_id: String,
    pub query: String,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

const EPOCH: &str = "1970-01-01T00:00:00Z";

/// POST /v1/orchestrator/retrieve — query-only variant of retrieval, bypassing
/// conversation state and the injection ledger entirely.
pub async fn retrieve_handler(State(state): State<Arc<AppState>>, Json(req): Json<RetrieveRequest>) -> Json<Value> {
    let now = memoria_core::now_iso();
    let (hits, explainability) = memoria_retrieval::persona_retrieve(
        Arc::clone(&state.stores),
        Arc::clone(&state.embedder),
        &req.user_id,
        &req.query,
        EPOCH,
        &now,
        req.persona.as_deref(),
        req.limit,
    )
    .await;
    Json(json!({ "status": "success", "hits": hits, "explainability": explainability }))
}

#[derive(Deserialize)]
pub struct TranscriptRequest {
    pub user_id: String,
    pub conversation_id: String,
    pub turns: Vec<TranscriptTurn>,
}

#[derive(Deserialize)]
pub struct TranscriptTurn {
    pub role: String,
    pub content: String,
    #[serde(default = "default_channel")]
    pub channel: String,
}

/// POST /v1/orchestrator/transcript — batch replay, one `send_message` per
/// turn in order, against the same conversation actor (§4.7 step 1:
/// ordering is serialized per `conversation_id`).
pub async fn transcript_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranscriptRequest>,
) -> ApiResult<Json<Value>> {
    let conversation_id = ConversationId::from(req.conversation_id);
    let mut turn_results = Vec::with_capacity(req.turns.len());
    for turn in &req.turns {
        let result = state
            .conversations
            .send_message(&req.user_id, &conversation_id, &turn.role, &turn.content, &turn.channel)
            .await
            .map_err(MemoriaError::from)?;
        turn_results.push(json!({
            "injections": result.injections,
            "profile_summary": result.profile_summary,
            "gap_question": result.gap_question,
        }));
    }
    Ok(Json(json!({ "status": "success", "turns": turn_results })))
}
