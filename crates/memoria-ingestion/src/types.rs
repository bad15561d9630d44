use memoria_stores::types::{EmotionalRow, EpisodicRow, Memory, PortfolioHolding, ProceduralRow};

/// One logical memory plus whichever typed payloads ingestion attached to
/// it. Which fields are `Some` decides routing in the storage orchestrator
/// (§4.3): episodic iff `episodic` is set, emotional iff `emotional` is set,
/// procedural iff `procedural` is set, portfolio sub-tables iff `portfolio`
/// is set, short-term cache iff `memory.layer == ShortTerm`.
#[derive(Debug, Clone)]
pub struct MemoryBundle {
    pub memory: Memory,
    pub episodic: Option<EpisodicRow>,
    pub emotional: Option<EmotionalRow>,
    pub procedural: Option<ProceduralRow>,
    pub portfolio: Option<PortfolioHolding>,
}

impl MemoryBundle {
    pub fn bare(memory: Memory) -> Self {
        Self {
            memory,
            episodic: None,
            emotional: None,
            procedural: None,
            portfolio: None,
        }
    }
}

/// One extracted memory candidate before embedding/object construction
/// (§4.4 `extract_all` output, `memories[]`).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ExtractedMemory {
    pub content: String,
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub entities: Option<ExtractedEntities>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub timestamp_type: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub emotional_state: Option<String>,
    #[serde(default)]
    pub skill_name: Option<String>,
}

fn default_confidence() -> f64 {
    0.8
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub places: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// §4.4 `profile_updates[]` — parsed straight into the stores-crate type.
pub type ExtractedProfileUpdate = memoria_stores::types::ProfileUpdate;

/// Combined schema produced by the single extraction LLM call (§4.4).
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub memories: Vec<ExtractedMemory>,
    #[serde(default)]
    pub profile_updates: Vec<ExtractedProfileUpdate>,
}

/// `finalize` output (§4.4).
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestSummary {
    pub memories_created: usize,
    pub ids: Vec<String>,
    pub summary: String,
    pub per_backend_status: std::collections::HashMap<String, std::collections::HashMap<String, bool>>,
}
