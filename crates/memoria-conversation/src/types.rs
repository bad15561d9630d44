use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-conversation lifecycle phase (§4.7). No state is ever "closed" — the
/// registry drops idle conversations after the GC window instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Fresh,
    Warm,
    Idle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A memory that survived injection policy and is handed back to the caller
/// this turn (§4.7 step 4).
#[derive(Debug, Clone, Serialize)]
pub struct Injection {
    pub memory_id: String,
    pub content: String,
    pub source: String,
    pub channel: String,
    pub score: f64,
    pub metadata: serde_json::Value,
}

/// One previously-surfaced memory, kept to evaluate cooldown and semantic
/// overlap against future candidates (§4.7 step 3).
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub memory_id: String,
    pub embedding: Vec<f32>,
    pub injected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct ConversationPolicy {
    pub history_window: usize,
    pub injection_cooldown_minutes: i64,
    pub overlap_cosine_threshold: f64,
    pub max_injections_per_turn: usize,
    pub ingest_every_n_turns: u32,
    pub profile_summary_max_tokens: usize,
    pub gap_question_cooldown_hours: i64,
    pub idle_after_hours: i64,
}

impl Default for ConversationPolicy {
    fn default() -> Self {
        Self {
            history_window: 20,
            injection_cooldown_minutes: 10,
            overlap_cosine_threshold: 0.9,
            max_injections_per_turn: 3,
            ingest_every_n_turns: 4,
            profile_summary_max_tokens: 500,
            gap_question_cooldown_hours: 24,
            idle_after_hours: 24,
        }
    }
}

/// Result of one inbound-message turn, returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub injections: Vec<Injection>,
    pub profile_summary: Option<String>,
    pub gap_question: Option<String>,
}
