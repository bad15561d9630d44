use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use memoria_core::MemoriaError;
use memoria_retrieval::{persona_retrieve, simple_retrieve, structured_retrieve};
use memoria_stores::vector::VectorFilters;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

const EPOCH: &str = "1970-01-01T00:00:00Z";

fn default_limit() -> usize {
    20
}

// ---- POST /v1/store ----

#[derive(Deserialize)]
pub struct StoreRequest {
    pub user_id: String,
    pub transcript: String,
}

pub async fn store_handler(State(state): State<Arc<AppState>>, Json(req): Json<StoreRequest>) -> Json<Value> {
    let summary = memoria_ingestion::ingest(
        Arc::clone(&state.stores),
        Arc::clone(&state.embedder),
        Arc::clone(&state.llm),
        state.config.thresholds.extraction_confidence,
        state.config.thresholds.dedup_cosine,
        &req.user_id,
        &req.transcript,
    )
    .await;

    Json(json!({
        "status": "success",
        "memories_created": summary.memories_created,
        "ids": summary.ids,
        "summary": summary.summary,
        "storage": summary.per_backend_status,
    }))
}

// ---- GET /v1/retrieve (simple) ----

#[derive(Deserialize)]
pub struct SimpleRetrieveQuery {
    pub user_id: String,
    pub query: String,
    pub layer: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

pub async fn simple_retrieve_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SimpleRetrieveQuery>,
) -> Json<Value> {
    let filters = VectorFilters {
        layer: q.layer.as_deref().and_then(|s| s.parse().ok()),
        memory_type: q.memory_type.as_deref().and_then(|s| s.parse().ok()),
        tags: vec![],
    };
    let hits = simple_retrieve(
        Arc::clone(&state.stores),
        Arc::clone(&state.embedder),
        &q.user_id,
        &q.query,
        filters,
        q.limit + q.offset,
    )
    .await;
    let page: Vec<_> = hits.into_iter().skip(q.offset).take(q.limit).collect();
    Json(json!({ "status": "success", "hits": page }))
}

// ---- POST /v1/retrieve (persona-aware) ----

#[derive(Deserialize)]
pub struct PersonaRetrieveRequest {
    pub user_id: String,
    pub query: String,
    #[serde(default)]
    pub window_from: Option<String>,
    #[serde(default)]
    pub window_to: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn persona_retrieve_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PersonaRetrieveRequest>,
) -> Json<Value> {
    let (hits, explainability) = run_persona_retrieve(&state, &req).await;
    Json(json!({ "status": "success", "hits": hits, "explainability": explainability }))
}

async fn run_persona_retrieve(
    state: &AppState,
    req: &PersonaRetrieveRequest,
) -> (Vec<memoria_retrieval::Hit>, memoria_retrieval::Explainability) {
    let now = memoria_core::now_iso();
    let window_from = req.window_from.clone().unwrap_or_else(|| EPOCH.to_string());
    let window_to = req.window_to.clone().unwrap_or(now);
    persona_retrieve(
        Arc::clone(&state.stores),
        Arc::clone(&state.embedder),
        &req.user_id,
        &req.query,
        &window_from,
        &window_to,
        req.persona.as_deref(),
        req.limit,
    )
    .await
}

// ---- POST /v1/retrieve/structured ----

pub async fn structured_retrieve_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PersonaRetrieveRequest>,
) -> Json<Value> {
    let (hits, _) = run_persona_retrieve(&state, &req).await;
    let buckets = structured_retrieve(Arc::clone(&state.llm), &hits).await;
    Json(json!({ "status": "success", "categories": buckets }))
}

// ---- POST /v1/narrative ----

pub async fn narrative_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PersonaRetrieveRequest>,
) -> ApiResult<Json<Value>> {
    let (hits, _) = run_persona_retrieve(&state, &req).await;
    let profile_summary = profile_summary_json(&state, &req.user_id);

    match memoria_retrieval::narrative(Arc::clone(&state.llm), &hits, profile_summary).await {
        Some(narrative) => Ok(Json(json!({ "status": "success", "narrative": narrative }))),
        None => Err(ApiError(MemoriaError::Llm(
            "narrative synthesis failed after retry".to_string(),
        ))),
    }
}

fn profile_summary_json(state: &AppState, user_id: &str) -> Option<Value> {
    let fields = state
        .stores
        .with_conn(|conn| memoria_stores::profile::list_profile_fields(conn, user_id))
        .ok()?;
    if fields.is_empty() {
        return None;
    }
    let top: HashMap<String, String> = fields
        .into_iter()
        .take(10)
        .map(|f| (f.field_name, f.field_value))
        .collect();
    Some(json!(top))
}

// ---- POST /v1/memories/direct ----

#[derive(Deserialize)]
pub struct DirectWriteRequest {
    pub user_id: String,
    pub content: String,
    #[serde(default = "default_layer")]
    pub layer: String,
    #[serde(default = "default_memory_type", rename = "type")]
    pub memory_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_importance")]
    pub importance: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Value,
}

fn default_layer() -> String {
    "semantic".to_string()
}
fn default_memory_type() -> String {
    "explicit".to_string()
}
fn default_importance() -> f64 {
    0.8
}
fn default_confidence() -> f64 {
    0.9
}

pub async fn direct_write_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DirectWriteRequest>,
) -> ApiResult<Json<Value>> {
    let layer: memoria_core::MemoryLayer = req
        .layer
        .parse()
        .map_err(MemoriaError::Validation)?;
    let memory_type: memoria_core::MemoryType = req
        .memory_type
        .parse()
        .map_err(MemoriaError::Validation)?;

    let embedding = state
        .embedder
        .embed(&req.content)
        .await
        .ok_or_else(|| MemoriaError::Embedding("embedder unavailable".to_string()))?;

    let memory = memoria_stores::types::Memory {
        id: memoria_core::new_memory_id(),
        user_id: req.user_id,
        content: req.content,
        layer,
        memory_type,
        importance: req.importance,
        confidence: req.confidence,
        relevance_score: req.importance,
        usage_count: 0,
        persona_tags: req.tags,
        embedding,
        timestamp: memoria_core::now_iso(),
        metadata: req.metadata,
    };

    let bundle = memoria_ingestion::MemoryBundle::bare(memory);
    let (outcome, stored) = memoria_ingestion::orchestrator::store(Arc::clone(&state.stores), bundle)
        .await
        .map_err(MemoriaError::from)?;

    Ok(Json(json!({ "status": "success", "memory_id": stored.id, "storage": outcome })))
}

// ---- DELETE /v1/memories/{id}?user_id=… ----

#[derive(Deserialize)]
pub struct DeleteMemoryQuery {
    pub user_id: String,
}

pub async fn delete_memory_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<DeleteMemoryQuery>,
) -> ApiResult<Json<Value>> {
    let outcome = memoria_ingestion::orchestrator::delete(Arc::clone(&state.stores), id, q.user_id)
        .await
        .map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "storage": outcome })))
}

// ---- POST /v1/forget ----

#[derive(Deserialize)]
pub struct ForgetRequest {
    pub user_id: String,
    pub memory_id: String,
}

/// POST-body alternative to `DELETE /v1/memories/{id}` for callers that
/// can't send a request body on `DELETE` (§6 lists both; same C7 path).
pub async fn forget_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgetRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = memoria_ingestion::orchestrator::delete(Arc::clone(&state.stores), req.memory_id, req.user_id)
        .await
        .map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "storage": outcome })))
}

// ---- POST /v1/maintenance, POST /v1/maintenance/compact_all ----

#[derive(Deserialize)]
pub struct MaintenanceRequest {
    pub user_id: String,
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn maintenance_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MaintenanceRequest>,
) -> Json<Value> {
    let summary = memoria_compaction::compact(
        Arc::clone(&state.stores),
        Arc::clone(&state.llm),
        &req.user_id,
        req.dry_run,
    )
    .await;
    Json(json!({ "status": "success", "compaction": summary }))
}

#[derive(Deserialize, Default)]
pub struct CompactAllRequest {
    /// `YYYYMMDD`; defaults to today.
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct CompactAllSummary {
    users_processed: usize,
    summaries: Vec<memoria_compaction::CompactionSummary>,
}

/// Runs `compact` over every user in `recent_users:{day}` (§4.8 "target set
/// taken from the activity set in C6").
pub async fn compact_all_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompactAllRequest>,
) -> ApiResult<Json<Value>> {
    let day = req.day.unwrap_or_else(|| chrono::Utc::now().format("%Y%m%d").to_string());
    let users = state
        .stores
        .with_conn(|conn| memoria_stores::cache::recent_users(conn, &day))
        .map_err(MemoriaError::from)?;

    let mut summaries = Vec::with_capacity(users.len());
    for user_id in &users {
        let summary = memoria_compaction::compact(
            Arc::clone(&state.stores),
            Arc::clone(&state.llm),
            user_id,
            req.dry_run,
        )
        .await;
        summaries.push(summary);
    }

    Ok(Json(json!(CompactAllSummary {
        users_processed: users.len(),
        summaries,
    })))
}
