use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use memoria_conversation::{ConversationPolicy, ConversationRegistry};
use memoria_core::MemoriaConfig;
use memoria_gateways::{Embedder, LlmClient};
use memoria_hooks::{HookHealthTracker, IngressDeps};
use memoria_intents::IntentsEngine;
use memoria_stores::Stores;

/// Central shared state, passed as `Arc<AppState>` to every handler —
/// mirrors the reference stack's single-`Arc<AppState>` + `.with_state()`
/// pattern.
pub struct AppState {
    pub config: MemoriaConfig,
    pub stores: Arc<Stores>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn LlmClient>,
    pub conversations: ConversationRegistry,
    pub intents: IntentsEngine,
    pub hook_health: Arc<HookHealthTracker>,
}

impl AppState {
    pub fn new(
        config: MemoriaConfig,
        stores: Arc<Stores>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let policy = ConversationPolicy {
            max_injections_per_turn: config.thresholds.max_injections_per_turn,
            gap_question_cooldown_hours: config.thresholds.profile_question_cooldown_hours,
            ..ConversationPolicy::default()
        };
        let conversation_deps = Arc::new(memoria_conversation::ConversationDeps {
            stores: Arc::clone(&stores),
            embedder: Arc::clone(&embedder),
            llm: Arc::clone(&llm),
            extraction_confidence_threshold: config.thresholds.extraction_confidence,
            dedup_cosine_threshold: config.thresholds.dedup_cosine,
        });

        Self {
            intents: IntentsEngine::new(Arc::clone(&stores)),
            conversations: ConversationRegistry::new(conversation_deps, policy),
            hook_health: HookHealthTracker::new(),
            config,
            stores,
            embedder,
            llm,
        }
    }

    /// Bundles the dependencies `memoria_hooks::webhook`/`ingress` need for
    /// one accepted event. Built per-call rather than stored once since it's
    /// just a handful of cheap `Arc::clone`s.
    pub fn ingress_deps(&self) -> IngressDeps {
        IngressDeps {
            stores: Arc::clone(&self.stores),
            embedder: Arc::clone(&self.embedder),
            llm: Arc::clone(&self.llm),
            extraction_confidence_threshold: self.config.thresholds.extraction_confidence,
            dedup_cosine_threshold: self.config.thresholds.dedup_cosine,
        }
    }
}

/// Assemble the full `axum` router — one route per §6 external interface.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/health/full", get(crate::http::health::health_full_handler))
        // core memory
        .route("/v1/store", post(crate::http::memory::store_handler))
        .route("/v1/retrieve", get(crate::http::memory::simple_retrieve_handler))
        .route("/v1/retrieve", post(crate::http::memory::persona_retrieve_handler))
        .route(
            "/v1/retrieve/structured",
            post(crate::http::memory::structured_retrieve_handler),
        )
        .route("/v1/narrative", post(crate::http::memory::narrative_handler))
        .route("/v1/memories/direct", post(crate::http::memory::direct_write_handler))
        .route("/v1/memories/{id}", delete(crate::http::memory::delete_memory_handler))
        .route("/v1/forget", post(crate::http::memory::forget_handler))
        .route("/v1/maintenance", post(crate::http::memory::maintenance_handler))
        .route(
            "/v1/maintenance/compact_all",
            post(crate::http::memory::compact_all_handler),
        )
        // conversation orchestrator
        .route(
            "/v1/orchestrator/message",
            post(crate::http::orchestrator::message_handler),
        )
        .route(
            "/v1/orchestrator/retrieve",
            post(crate::http::orchestrator::retrieve_handler),
        )
        .route(
            "/v1/orchestrator/transcript",
            post(crate::http::orchestrator::transcript_handler),
        )
        // profile
        .route("/v1/profile", get(crate::http::profile::get_profile_handler))
        .route("/v1/profile", delete(crate::http::profile::delete_profile_handler))
        .route(
            "/v1/profile/completeness",
            get(crate::http::profile::completeness_handler),
        )
        .route("/v1/profile/import", post(crate::http::profile::import_handler))
        .route("/v1/profile/export", get(crate::http::profile::export_handler))
        .route("/v1/profile/audit", get(crate::http::profile::audit_handler))
        .route(
            "/v1/profile/{category}",
            get(crate::http::profile::get_category_handler),
        )
        .route(
            "/v1/profile/{category}/{field}",
            put(crate::http::profile::put_field_handler),
        )
        // portfolio
        .route("/v1/portfolio/summary", get(crate::http::portfolio::summary_handler))
        .route(
            "/v1/portfolio/holding/{ticker}",
            get(crate::http::portfolio::get_holding_handler)
                .post(crate::http::portfolio::create_holding_handler)
                .put(crate::http::portfolio::update_holding_handler)
                .delete(crate::http::portfolio::delete_holding_handler),
        )
        // scheduled intents
        .route(
            "/v1/intents",
            get(crate::http::intents::list_handler).post(crate::http::intents::create_handler),
        )
        .route("/v1/intents/pending", get(crate::http::intents::pending_handler))
        .route(
            "/v1/intents/{id}",
            get(crate::http::intents::get_handler)
                .put(crate::http::intents::update_handler)
                .delete(crate::http::intents::delete_handler),
        )
        .route("/v1/intents/{id}/claim", post(crate::http::intents::claim_handler))
        .route("/v1/intents/{id}/fire", post(crate::http::intents::fire_handler))
        .route(
            "/v1/intents/{id}/history",
            get(crate::http::intents::history_handler),
        )
        // hook ingress (§4.10) — not individually named in the endpoint
        // list, added as the natural webhook entry point + consent toggle.
        .route("/v1/hooks/consent", post(crate::http::hooks::set_consent_handler))
        .route("/v1/hooks/{source}/{kind}", post(crate::http::hooks::webhook_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
