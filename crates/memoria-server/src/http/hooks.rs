use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use memoria_core::MemoriaError;
use memoria_hooks::{HookKind, RawEvent};
use memoria_stores::types::HookConsent;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct WebhookQuery {
    pub user_id: String,
}

/// POST /v1/hooks/{source}/{kind} — the one HTTP entry point every connector
/// in `memoria_core::config::WebhooksConfig` shares. `source` is matched
/// against `config.webhooks.sources[].name`; `kind` is a `HookKind`.
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Path((source, kind)): Path<(String, String)>,
    Query(q): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let hook_kind = HookKind::parse(&kind).ok_or_else(|| MemoriaError::Validation(format!("unknown hook kind: {kind}")))?;

    let source_config = state
        .config
        .webhooks
        .sources
        .iter()
        .find(|s| s.name == source)
        .ok_or_else(|| MemoriaError::NotFound(format!("no webhook source configured: {source}")))?;

    let signature_header = headers.get("x-hub-signature-256").and_then(|v| v.to_str().ok());
    let auth_header = headers.get("authorization").and_then(|v| v.to_str().ok());

    let raw: RawEvent = serde_json::from_slice(&body).map_err(|e| MemoriaError::Validation(format!("invalid event body: {e}")))?;

    let deps = state.ingress_deps();
    let summary = memoria_hooks::webhook::handle_webhook(
        &deps,
        &state.hook_health,
        source_config,
        hook_kind,
        &q.user_id,
        &body,
        signature_header,
        auth_header,
        raw,
    )
    .await
    .map_err(MemoriaError::from)?;

    Ok(Json(json!({ "status": "success", "ingest": summary })))
}

#[derive(Deserialize)]
pub struct ConsentRequest {
    pub user_id: String,
    pub hook_kind: String,
    pub granted: bool,
}

/// POST /v1/hooks/consent — grant or revoke a connector for a user; every
/// `accept_event` call checks this before any event reaches C8.
pub async fn set_consent_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConsentRequest>,
) -> ApiResult<Json<Value>> {
    let consent = HookConsent {
        user_id: req.user_id,
        hook_kind: req.hook_kind,
        granted: req.granted,
        granted_at: memoria_core::now_iso(),
    };
    state
        .stores
        .with_conn(|conn| memoria_stores::relational::set_hook_consent(conn, &consent))
        .map_err(MemoriaError::from)?;

    Ok(Json(json!({ "status": "success", "consent": consent })))
}
