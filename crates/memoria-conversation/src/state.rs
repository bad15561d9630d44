use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use memoria_core::ProfileCategory;
use memoria_gateways::Embedder;
use memoria_retrieval::Hit;
use memoria_stores::types::ProfileField;

use crate::types::{ConversationPolicy, Injection, LedgerEntry, Phase, Turn};

/// Owns the full state of one conversation (§4.7). Lives inside the
/// conversation's dedicated task — there is exactly one owner, so none of
/// its fields need their own lock.
pub struct ConversationState {
    pub user_id: String,
    pub conversation_id: String,
    pub policy: ConversationPolicy,
    pub history: VecDeque<Turn>,
    pub turn_count: u32,
    pub phase: Phase,
    pub last_activity: DateTime<Utc>,
    pub injection_ledger: Vec<LedgerEntry>,
    pub profile_summary_sent: bool,
    pub last_gap_question_at: Option<DateTime<Utc>>,
}

impl ConversationState {
    pub fn new(user_id: String, conversation_id: String, policy: ConversationPolicy) -> Self {
        Self {
            user_id,
            conversation_id,
            policy,
            history: VecDeque::new(),
            turn_count: 0,
            phase: Phase::Fresh,
            last_activity: Utc::now(),
            injection_ledger: Vec::new(),
            profile_summary_sent: false,
            last_gap_question_at: None,
        }
    }

    /// Append a turn, bounding the history to the configured window (§4.7
    /// step 1) and advancing the lifecycle phase.
    pub fn push_turn(&mut self, role: &str, content: &str) {
        self.history.push_back(Turn {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        while self.history.len() > self.policy.history_window {
            self.history.pop_front();
        }
        self.turn_count += 1;
        self.last_activity = Utc::now();
        self.phase = match self.phase {
            Phase::Fresh => Phase::Warm,
            other => other,
        };
    }

    /// `latest message + short window summary` query used against C9 (§4.7
    /// step 2). The window summary is the last few turns' content, joined.
    pub fn retrieval_query(&self, latest_message: &str) -> String {
        let window_summary: String = self
            .history
            .iter()
            .rev()
            .take(5)
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{latest_message}\n{window_summary}")
    }

    pub fn should_ingest(&self) -> bool {
        self.policy.ingest_every_n_turns > 0 && self.turn_count % self.policy.ingest_every_n_turns == 0
    }

    pub fn is_idle(&self, now: DateTime<Utc>) -> bool {
        (now - self.last_activity).num_hours() >= self.policy.idle_after_hours
    }

    pub fn mark_idle_if_expired(&mut self, now: DateTime<Utc>) {
        if self.is_idle(now) {
            self.phase = Phase::Idle;
        }
    }

    /// Applies the injection policy (§4.7 step 3) to a ranked hit set,
    /// embedding survivors for future overlap checks and recording them in
    /// the ledger.
    pub async fn apply_injection_policy(
        &mut self,
        embedder: &dyn Embedder,
        hits: Vec<Hit>,
        channel: &str,
    ) -> Vec<Injection> {
        let now = Utc::now();
        let mut survivors = Vec::new();
        for hit in hits {
            if survivors.len() >= self.policy.max_injections_per_turn {
                break;
            }

            let in_cooldown = self.injection_ledger.iter().any(|entry| {
                entry.memory_id == hit.memory_id
                    && now - entry.injected_at < chrono::Duration::minutes(self.policy.injection_cooldown_minutes)
            });
            if in_cooldown {
                continue;
            }

            let Some(embedding) = embedder.embed(&hit.content).await else {
                continue;
            };
            let overlaps_prior = self.injection_ledger.iter().any(|entry| {
                memoria_stores::vector::cosine_similarity(&embedding, &entry.embedding)
                    >= self.policy.overlap_cosine_threshold
            });
            if overlaps_prior {
                continue;
            }

            self.injection_ledger.push(LedgerEntry {
                memory_id: hit.memory_id.clone(),
                embedding,
                injected_at: now,
            });

            survivors.push(Injection {
                memory_id: hit.memory_id,
                content: hit.content,
                source: format!("{:?}", hit.source).to_lowercase(),
                channel: channel.to_string(),
                score: hit.score,
                metadata: hit.metadata,
            });
        }
        survivors
    }

    /// Compact `<=` `profile_summary_max_tokens`-ish summary injected once,
    /// at conversation start (§4.7 step 6). Token budget is approximated as
    /// whitespace-separated words, matching the reference stack's cheap
    /// token estimate for prompt-budget checks.
    pub fn build_profile_summary(&mut self, fields: &[ProfileField]) -> Option<String> {
        if self.profile_summary_sent || fields.is_empty() {
            return None;
        }
        self.profile_summary_sent = true;

        let mut summary = String::from("User Profile Summary: ");
        let mut word_count = 3;
        for field in fields {
            let fragment = format!("{}={}; ", field.field_name, field.field_value);
            let fragment_words = fragment.split_whitespace().count();
            if word_count + fragment_words > self.policy.profile_summary_max_tokens {
                break;
            }
            summary.push_str(&fragment);
            word_count += fragment_words;
        }
        Some(summary)
    }

    /// Elects one gap-detection question per conversation, suppressed for
    /// `gap_question_cooldown_hours` (§4.7 step 6). Picks the first profile
    /// category with no populated fields as the highest-value gap.
    pub fn maybe_gap_question(&mut self, fields: &[ProfileField]) -> Option<String> {
        let now = Utc::now();
        if let Some(last) = self.last_gap_question_at {
            if now - last < chrono::Duration::hours(self.policy.gap_question_cooldown_hours) {
                return None;
            }
        }

        let missing_category = ProfileCategory::ALL
            .into_iter()
            .find(|category| !fields.iter().any(|f| f.category == *category))?;

        self.last_gap_question_at = Some(now);
        Some(format!(
            "I don't think we've talked much about your {missing_category} yet — mind sharing a bit?"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_gateways::DeterministicEmbedder;
    use memoria_retrieval::HitSource;

    #[test]
    fn push_turn_bounds_history_and_advances_phase() {
        let mut state = ConversationState::new("u1".into(), "c1".into(), ConversationPolicy {
            history_window: 2,
            ..ConversationPolicy::default()
        });
        assert_eq!(state.phase, Phase::Fresh);
        state.push_turn("user", "hi");
        assert_eq!(state.phase, Phase::Warm);
        state.push_turn("assistant", "hello");
        state.push_turn("user", "how are you");
        assert_eq!(state.history.len(), 2);
    }

    #[tokio::test]
    async fn injection_policy_caps_at_max_per_turn() {
        let embedder = DeterministicEmbedder;
        let mut state = ConversationState::new("u1".into(), "c1".into(), ConversationPolicy {
            max_injections_per_turn: 1,
            ..ConversationPolicy::default()
        });
        let hits = vec![
            Hit {
                memory_id: "mem_a".into(),
                content: "likes jazz".into(),
                score: 0.9,
                source: HitSource::Semantic,
                metadata: serde_json::json!({}),
                timestamp: "2026-01-01T00:00:00Z".into(),
            },
            Hit {
                memory_id: "mem_b".into(),
                content: "plays guitar".into(),
                score: 0.8,
                source: HitSource::Semantic,
                metadata: serde_json::json!({}),
                timestamp: "2026-01-01T00:00:00Z".into(),
            },
        ];
        let injections = state.apply_injection_policy(&embedder, hits, "chat").await;
        assert_eq!(injections.len(), 1);
    }

    #[tokio::test]
    async fn injection_policy_suppresses_cooldown_repeat() {
        let embedder = DeterministicEmbedder;
        let mut state = ConversationState::new("u1".into(), "c1".into(), ConversationPolicy::default());
        let hit = Hit {
            memory_id: "mem_a".into(),
            content: "likes jazz".into(),
            score: 0.9,
            source: HitSource::Semantic,
            metadata: serde_json::json!({}),
            timestamp: "2026-01-01T00:00:00Z".into(),
        };
        let first = state.apply_injection_policy(&embedder, vec![hit.clone()], "chat").await;
        assert_eq!(first.len(), 1);
        let second = state.apply_injection_policy(&embedder, vec![hit], "chat").await;
        assert_eq!(second.len(), 0);
    }
}
