use std::sync::Arc;

use dashmap::DashMap;
use memoria_core::ConversationId;
use tokio::sync::oneshot;
use tracing::info;

use crate::actor::{self, ConversationCmd, ConversationDeps, ConversationHandle};
use crate::error::ConversationError;
use crate::types::{ConversationPolicy, TurnResult};

/// `DashMap<ConversationId, mpsc::Sender<ConversationCmd>>` (§4.7 Design
/// Note §9) — each conversation gets its own task; the registry only routes
/// commands and garbage-collects idle ones.
pub struct ConversationRegistry {
    conversations: DashMap<ConversationId, ConversationHandle>,
    deps: Arc<ConversationDeps>,
    policy: ConversationPolicy,
}

impl ConversationRegistry {
    pub fn new(deps: Arc<ConversationDeps>, policy: ConversationPolicy) -> Self {
        Self {
            conversations: DashMap::new(),
            deps,
            policy,
        }
    }

    fn get_or_spawn(&self, user_id: &str, conversation_id: &ConversationId) -> ConversationHandle {
        if let Some(handle) = self.conversations.get(conversation_id) {
            return handle.clone();
        }
        let handle = actor::spawn(
            user_id.to_string(),
            conversation_id.as_str().to_string(),
            self.policy,
            Arc::clone(&self.deps),
        );
        self.conversations.insert(conversation_id.clone(), handle.clone());
        handle
    }

    /// Route one inbound message to its conversation's actor, spawning a new
    /// one on first contact (§4.7).
    pub async fn send_message(
        &self,
        user_id: &str,
        conversation_id: &ConversationId,
        role: &str,
        content: &str,
        channel: &str,
    ) -> Result<TurnResult, ConversationError> {
        let handle = self.get_or_spawn(user_id, conversation_id);
        let (reply_tx, reply_rx) = oneshot::channel();

        handle
            .tx
            .send(ConversationCmd::Message {
                role: role.to_string(),
                content: content.to_string(),
                channel: channel.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| ConversationError::ActorUnavailable)?;

        reply_rx.await.map_err(|_| ConversationError::ActorUnavailable)
    }

    /// Drops conversation tasks that have been inactive past the GC window
    /// (§4.7: "garbage collection drops conversation state after 24 h of
    /// inactivity"). Intended to be called periodically by the host process.
    pub async fn gc_idle(&self) {
        let now = chrono::Utc::now().timestamp();
        let cutoff_secs = self.policy.idle_after_hours * 3600;

        let expired: Vec<ConversationId> = self
            .conversations
            .iter()
            .filter(|entry| now - entry.value().last_activity_epoch.load(std::sync::atomic::Ordering::Relaxed) >= cutoff_secs)
            .map(|entry| entry.key().clone())
            .collect();

        for conversation_id in expired {
            if let Some((_, handle)) = self.conversations.remove(&conversation_id) {
                let _ = handle.tx.send(ConversationCmd::Shutdown).await;
                info!(conversation_id = %conversation_id, "garbage collected idle conversation");
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.conversations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_gateways::{DeterministicEmbedder, FakeLlmClient};
    use memoria_stores::Stores;

    fn test_deps() -> Arc<ConversationDeps> {
        Arc::new(ConversationDeps {
            stores: Arc::new(Stores::open_in_memory().unwrap()),
            embedder: Arc::new(DeterministicEmbedder),
            llm: Arc::new(FakeLlmClient::failing()),
            extraction_confidence_threshold: 0.80,
            dedup_cosine_threshold: 0.80,
        })
    }

    #[tokio::test]
    async fn send_message_spawns_conversation_and_replies() {
        let registry = ConversationRegistry::new(test_deps(), ConversationPolicy::default());
        let conversation_id = ConversationId::from("conv1");

        let result = registry
            .send_message("u1", &conversation_id, "user", "I love hiking", "chat")
            .await
            .unwrap();
        assert!(result.injections.is_empty());
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test]
    async fn second_message_reuses_existing_actor() {
        let registry = ConversationRegistry::new(test_deps(), ConversationPolicy::default());
        let conversation_id = ConversationId::from("conv1");

        registry
            .send_message("u1", &conversation_id, "user", "hi", "chat")
            .await
            .unwrap();
        registry
            .send_message("u1", &conversation_id, "user", "hello again", "chat")
            .await
            .unwrap();
        assert_eq!(registry.active_count(), 1);
    }
}
