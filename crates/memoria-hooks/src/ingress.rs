use std::sync::Arc;

use memoria_gateways::{Embedder, LlmClient};
use memoria_ingestion::IngestSummary;
use memoria_stores::Stores;
use tracing::{info, warn};

use crate::error::{HookError, Result};
use crate::normalize::normalize;
use crate::types::{HookKind, RawEvent};

/// Everything an event needs to reach C8, gathered once by the caller
/// (webhook handler or poller) and threaded through per accepted event.
pub struct IngressDeps {
    pub stores: Arc<Stores>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn LlmClient>,
    pub extraction_confidence_threshold: f64,
    pub dedup_cosine_threshold: f64,
}

/// Consent check, dedup, normalize, hand off to C8 — the one path every
/// hook connector funnels through (§4.10). Returns `Ok(None)` for a
/// redelivered/already-seen event rather than erroring: dedup is expected,
/// routine traffic, not a failure.
pub async fn accept_event(
    deps: &IngressDeps,
    user_id: &str,
    hook_kind: HookKind,
    channel: &str,
    raw: RawEvent,
) -> Result<Option<IngestSummary>> {
    let consent = {
        let stores = Arc::clone(&deps.stores);
        let user_id = user_id.to_string();
        let kind = hook_kind.as_str().to_string();
        tokio::task::spawn_blocking(move || {
            stores.with_conn(|conn| memoria_stores::relational::get_hook_consent(conn, &user_id, &kind))
        })
        .await
        .map_err(|e| HookError::InvalidPayload(e.to_string()))??
    };
    if !consent.is_some_and(|c| c.granted) {
        return Err(HookError::ConsentNotGranted { hook_kind: hook_kind.as_str().to_string() });
    }

    let is_new = {
        let stores = Arc::clone(&deps.stores);
        let user_id = user_id.to_string();
        let kind = hook_kind.as_str().to_string();
        let message_id = raw.source_message_id.clone();
        let now = memoria_core::now_iso();
        tokio::task::spawn_blocking(move || {
            stores.with_conn(|conn| {
                memoria_stores::relational::record_hook_event_seen(conn, &user_id, &kind, &message_id, &now)
            })
        })
        .await
        .map_err(|e| HookError::InvalidPayload(e.to_string()))??
    };
    if !is_new {
        info!(user_id, hook_kind = hook_kind.as_str(), "duplicate hook event dropped");
        return Ok(None);
    }

    let event = normalize(user_id, hook_kind, channel, &raw)?;

    let summary = memoria_ingestion::ingest(
        Arc::clone(&deps.stores),
        Arc::clone(&deps.embedder),
        Arc::clone(&deps.llm),
        deps.extraction_confidence_threshold,
        deps.dedup_cosine_threshold,
        &event.user_id,
        &event.transcript,
    )
    .await;

    if summary.memories_created == 0 {
        warn!(user_id, hook_kind = hook_kind.as_str(), "hook event produced no memories");
    }
    Ok(Some(summary))
}
