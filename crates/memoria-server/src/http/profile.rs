use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use memoria_core::MemoriaError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: String,
}

/// GET /v1/profile?user_id — full profile: summary row, every field, and
/// its confidence score (§3).
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<Json<Value>> {
    let (profile, fields, scores) = state
        .stores
        .with_conn(|conn| {
            let profile = memoria_stores::profile::get_user_profile(conn, &q.user_id)?;
            let fields = memoria_stores::profile::list_profile_fields(conn, &q.user_id)?;
            let scores = memoria_stores::profile::list_confidence_scores(conn, &q.user_id)?;
            Ok((profile, fields, scores))
        })
        .map_err(MemoriaError::from)?;

    Ok(Json(json!({
        "status": "success",
        "profile": profile,
        "fields": fields,
        "confidence": scores,
    })))
}

/// GET /v1/profile/{category}?user_id — fields in one category only.
pub async fn get_category_handler(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<Json<Value>> {
    let category: memoria_core::ProfileCategory = category.parse().map_err(MemoriaError::Validation)?;
    let fields = state
        .stores
        .with_conn(|conn| memoria_stores::profile::list_profile_fields(conn, &q.user_id))
        .map_err(MemoriaError::from)?
        .into_iter()
        .filter(|f| f.category == category)
        .collect::<Vec<_>>();

    Ok(Json(json!({ "status": "success", "category": category.to_string(), "fields": fields })))
}

#[derive(Deserialize)]
pub struct PutFieldRequest {
    pub user_id: String,
    pub value: String,
}

/// PUT /v1/profile/{category}/{field} — manual edit, confidence = 100
/// by definition (§4.5 "direct write wins").
pub async fn put_field_handler(
    State(state): State<Arc<AppState>>,
    Path((category, field)): Path<(String, String)>,
    Json(req): Json<PutFieldRequest>,
) -> ApiResult<Json<Value>> {
    let category: memoria_core::ProfileCategory = category.parse().map_err(MemoriaError::Validation)?;
    state
        .stores
        .with_conn_mut(|conn| memoria_stores::profile::set_manual_override(conn, &req.user_id, category, &field, &req.value))
        .map_err(MemoriaError::from)?;

    Ok(Json(json!({ "status": "success" })))
}

/// DELETE /v1/profile?user_id — cascading delete of fields, scores, sources.
pub async fn delete_profile_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<Json<Value>> {
    state
        .stores
        .with_conn_mut(|conn| memoria_stores::profile::delete_profile(conn, &q.user_id))
        .map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success" })))
}

/// GET /v1/profile/completeness?user_id
pub async fn completeness_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<Json<Value>> {
    let profile = state
        .stores
        .with_conn(|conn| memoria_stores::profile::get_user_profile(conn, &q.user_id))
        .map_err(MemoriaError::from)?;

    match profile {
        Some(p) => Ok(Json(json!({
            "status": "success",
            "completeness_pct": p.completeness_pct,
            "populated_fields": p.populated_fields,
            "total_fields": p.total_fields,
        }))),
        None => Err(MemoriaError::NotFound(format!("no profile for user {}", q.user_id)).into()),
    }
}

#[derive(Deserialize)]
pub struct ImportRequest {
    pub user_id: String,
    pub updates: Vec<memoria_stores::types::ProfileUpdate>,
}

/// POST /v1/profile/import — bulk `upsert_profile_fields`, same path §4.4's
/// extraction step uses for `profile_updates[]`.
pub async fn import_handler(State(state): State<Arc<AppState>>, Json(req): Json<ImportRequest>) -> ApiResult<Json<Value>> {
    state
        .stores
        .with_conn_mut(|conn| memoria_stores::profile::upsert_profile_fields(conn, &req.user_id, &req.updates))
        .map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "imported": req.updates.len() })))
}

/// GET /v1/profile/export?user_id — same shape as `get_profile_handler`,
/// named separately per §6 so callers can treat it as the canonical backup
/// format independent of the live-read endpoint's shape evolving later.
pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<Json<Value>> {
    get_profile_handler(State(state), Query(q)).await
}

/// GET /v1/profile/audit?user_id — full `profile_sources` trail.
pub async fn audit_handler(State(state): State<Arc<AppState>>, Query(q): Query<UserIdQuery>) -> ApiResult<Json<Value>> {
    let sources = state
        .stores
        .with_conn(|conn| memoria_stores::profile::list_profile_sources(conn, &q.user_id))
        .map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "sources": sources })))
}
