use serde::{Deserialize, Serialize};

/// The logical memory record (§3). The vector store is the source of truth
/// for existence; the `stored_in_*` flags record which typed stores also
/// hold a copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub layer: memoria_core::MemoryLayer,
    #[serde(rename = "type")]
    pub memory_type: memoria_core::MemoryType,
    pub importance: f64,
    pub confidence: f64,
    pub relevance_score: f64,
    pub usage_count: u64,
    pub persona_tags: Vec<String>,
    pub embedding: Vec<f32>,
    pub timestamp: String,
    pub metadata: serde_json::Value,
}

impl Memory {
    pub fn stored_in(&self, flag: &str) -> bool {
        self.metadata
            .get(flag)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn set_stored_in(&mut self, flag: &str, value: bool) {
        if !self.metadata.is_object() {
            self.metadata = serde_json::json!({});
        }
        self.metadata[flag] = serde_json::json!(value);
    }
}

/// Episodic row (§3), keyed by `(id, event_timestamp)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicRow {
    pub id: String,
    pub user_id: String,
    pub event_timestamp: String,
    pub event_type: Option<String>,
    pub content: String,
    pub location: Option<serde_json::Value>,
    pub participants: Vec<String>,
    pub emotional_valence: Option<f64>,
    pub emotional_arousal: Option<f64>,
    pub importance_score: f64,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
}

/// Emotional row (§3), keyed by `(id, timestamp)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalRow {
    pub id: String,
    pub user_id: String,
    pub timestamp: String,
    pub emotional_state: String,
    pub valence: f64,
    pub arousal: f64,
    pub dominance: f64,
    pub context: Option<String>,
    pub trigger_event: Option<String>,
    pub intensity: f64,
    pub duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProficiencyLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl std::fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProficiencyLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            "expert" => Ok(Self::Expert),
            other => Err(format!("unknown proficiency level: {other}")),
        }
    }
}

/// Procedural row (§3), keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProceduralRow {
    pub id: String,
    pub user_id: String,
    pub skill_name: String,
    pub proficiency_level: ProficiencyLevel,
    pub prerequisites: Vec<String>,
    pub practice_count: u64,
    pub success_rate: f64,
    pub last_practiced: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillProgression {
    pub id: i64,
    pub skill_id: String,
    pub from_level: ProficiencyLevel,
    pub to_level: ProficiencyLevel,
    pub transitioned_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioHolding {
    pub user_id: String,
    pub ticker: String,
    pub shares: f64,
    pub avg_price: f64,
    pub asset_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioTransaction {
    pub id: i64,
    pub user_id: String,
    pub ticker: String,
    pub action: String,
    pub shares: f64,
    pub price: f64,
    pub executed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub user_id: String,
    pub snapshot_timestamp: String,
    pub total_value: f64,
    pub holdings: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPreference {
    pub user_id: String,
    pub pref_key: String,
    pub pref_value: serde_json::Value,
}

/// `user_profiles` row (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub completeness_pct: f64,
    pub total_fields: i64,
    pub populated_fields: i64,
    pub created_at: String,
    pub last_updated: String,
}

/// `profile_fields` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileField {
    pub user_id: String,
    pub category: memoria_core::ProfileCategory,
    pub field_name: String,
    pub field_value: String,
    pub value_type: String,
}

/// `profile_confidence_scores` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfidence {
    pub user_id: String,
    pub category: memoria_core::ProfileCategory,
    pub field_name: String,
    pub overall_confidence: f64,
    pub frequency: f64,
    pub recency: f64,
    pub explicitness: f64,
    pub source_diversity: f64,
    pub mention_count: i64,
    pub last_mentioned: String,
}

/// `profile_sources` row — audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSource {
    pub id: i64,
    pub user_id: String,
    pub category: memoria_core::ProfileCategory,
    pub field_name: String,
    pub source_memory_id: Option<String>,
    pub source_type: memoria_core::SourceType,
    pub extracted_at: String,
}

/// An update proposed by ingestion extraction (§4.4 `profile_updates`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub category: memoria_core::ProfileCategory,
    pub field_name: String,
    pub field_value: String,
    /// 0-100 as extracted by the LLM (§4.4); manual API edits pass 100.
    pub confidence: f64,
    pub source_type: memoria_core::SourceType,
    pub source_memory_id: Option<String>,
}

/// `scheduled_intents` row (C12 storage, owned operationally by the intents
/// engine but persisted here alongside the other relational tables).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledIntentRow {
    pub id: String,
    pub user_id: String,
    pub trigger_kind: String,
    pub trigger_config: serde_json::Value,
    pub action: serde_json::Value,
    pub enabled: bool,
    pub next_check: Option<String>,
    pub claimed_at: Option<String>,
    pub last_checked: Option<String>,
    pub last_executed: Option<String>,
    pub last_condition_fire: Option<String>,
    pub execution_count: i64,
    pub max_executions: Option<i64>,
    pub expires_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentExecution {
    pub id: i64,
    pub intent_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub result: String,
    pub gate_result: Option<String>,
    pub detail: Option<String>,
}

/// Hook consent row (C13), persisted in the relational store (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConsent {
    pub user_id: String,
    pub hook_kind: String,
    pub granted: bool,
    pub granted_at: String,
}
