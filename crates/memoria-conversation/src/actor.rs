use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use memoria_core::now_iso;
use memoria_gateways::{Embedder, LlmClient};
use memoria_stores::Stores;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::state::ConversationState;
use crate::types::{ConversationPolicy, TurnResult};

const DEFAULT_RETRIEVAL_LIMIT: usize = 10;
const EPOCH_WINDOW_FROM: &str = "1970-01-01T00:00:00Z";

pub enum ConversationCmd {
    Message {
        role: String,
        content: String,
        channel: String,
        reply: oneshot::Sender<TurnResult>,
    },
    Shutdown,
}

/// Handle a running conversation owns in the registry: the command channel
/// plus a lock-free last-activity stamp the registry's GC sweep can read
/// without talking to the actor task (§4.7 "garbage collection").
#[derive(Clone)]
pub struct ConversationHandle {
    pub tx: mpsc::Sender<ConversationCmd>,
    pub last_activity_epoch: Arc<AtomicI64>,
}

pub struct ConversationDeps {
    pub stores: Arc<Stores>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn LlmClient>,
    pub extraction_confidence_threshold: f64,
    pub dedup_cosine_threshold: f64,
}

/// Spawns the per-conversation Tokio task (§4.7 Design Note §9): one task
/// owns the `ConversationState`, callers send commands and await a oneshot
/// reply, so the injection ledger never needs its own lock.
pub fn spawn(
    user_id: String,
    conversation_id: String,
    policy: ConversationPolicy,
    deps: Arc<ConversationDeps>,
) -> ConversationHandle {
    let (tx, mut rx) = mpsc::channel::<ConversationCmd>(32);
    let last_activity_epoch = Arc::new(AtomicI64::new(chrono::Utc::now().timestamp()));
    let stamp = Arc::clone(&last_activity_epoch);

    tokio::spawn(async move {
        let mut state = ConversationState::new(user_id.clone(), conversation_id.clone(), policy);

        while let Some(cmd) = rx.recv().await {
            match cmd {
                ConversationCmd::Message {
                    role,
                    content,
                    channel,
                    reply,
                } => {
                    stamp.store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
                    let result = handle_message(&mut state, &deps, &role, &content, &channel).await;
                    let _ = reply.send(result);
                }
                ConversationCmd::Shutdown => break,
            }
        }
        info!(conversation_id = %conversation_id, "conversation task exiting");
    });

    ConversationHandle {
        tx,
        last_activity_epoch,
    }
}

async fn handle_message(
    state: &mut ConversationState,
    deps: &ConversationDeps,
    role: &str,
    content: &str,
    channel: &str,
) -> TurnResult {
    let is_first_turn = state.history.is_empty();
    state.push_turn(role, content);

    let profile_summary = if is_first_turn {
        let fields = deps
            .stores
            .with_conn(|conn| memoria_stores::profile::list_profile_fields(conn, &state.user_id))
            .unwrap_or_default();
        state.build_profile_summary(&fields)
    } else {
        None
    };

    let query = state.retrieval_query(content);
    let now = now_iso();
    let (hits, _explainability) = memoria_retrieval::persona_retrieve(
        Arc::clone(&deps.stores),
        Arc::clone(&deps.embedder),
        &state.user_id,
        &query,
        EPOCH_WINDOW_FROM,
        &now,
        None,
        DEFAULT_RETRIEVAL_LIMIT,
    )
    .await;

    let injections = state
        .apply_injection_policy(deps.embedder.as_ref(), hits, channel)
        .await;

    let gap_question = if is_first_turn {
        let fields = deps
            .stores
            .with_conn(|conn| memoria_stores::profile::list_profile_fields(conn, &state.user_id))
            .unwrap_or_default();
        state.maybe_gap_question(&fields)
    } else {
        None
    };

    if state.should_ingest() {
        let transcript: String = state
            .history
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n");
        let stores = Arc::clone(&deps.stores);
        let embedder = Arc::clone(&deps.embedder);
        let llm = Arc::clone(&deps.llm);
        let user_id = state.user_id.clone();
        let confidence_threshold = deps.extraction_confidence_threshold;
        let dedup_threshold = deps.dedup_cosine_threshold;
        tokio::spawn(async move {
            let summary = memoria_ingestion::ingest(
                stores,
                embedder,
                llm,
                confidence_threshold,
                dedup_threshold,
                &user_id,
                &transcript,
            )
            .await;
            if summary.memories_created == 0 {
                warn!(user_id = %user_id, "window ingestion produced no memories");
            }
        });
    }

    TurnResult {
        injections,
        profile_summary,
        gap_question,
    }
}
