use memoria_stores::types::Memory;
use serde::Serialize;

/// One ranked retrieval hit (§4.6).
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub memory_id: String,
    pub content: String,
    pub score: f64,
    pub source: HitSource,
    pub metadata: serde_json::Value,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    Semantic,
    Episodic,
    Structured,
}

impl Hit {
    pub fn from_memory(memory: &Memory, score: f64, source: HitSource) -> Self {
        Self {
            memory_id: memory.id.clone(),
            content: memory.content.clone(),
            score,
            source,
            metadata: memory.metadata.clone(),
            timestamp: memory.timestamp.clone(),
        }
    }
}

/// Weight set applied by hybrid/persona-aware retrieval (§4.6).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Weights {
    pub semantic: f64,
    pub time: f64,
    pub importance: f64,
    pub emotional: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            semantic: 0.5,
            time: 0.2,
            importance: 0.2,
            emotional: 0.1,
        }
    }
}

/// Persona presets that contribute weight overrides (§4.6). Personas not in
/// this set fall back to `Weights::default()`.
pub fn weights_for_persona(persona: &str) -> Weights {
    match persona {
        "casual" => Weights {
            semantic: 0.4,
            time: 0.35,
            importance: 0.15,
            emotional: 0.1,
        },
        "coach" => Weights {
            semantic: 0.45,
            time: 0.15,
            importance: 0.3,
            emotional: 0.1,
        },
        "advisor" => Weights {
            semantic: 0.55,
            time: 0.1,
            importance: 0.3,
            emotional: 0.05,
        },
        _ => Weights::default(),
    }
}

/// Crude keyword-based auto-detection used when no persona is supplied
/// (§4.6 "auto-detected from the query").
pub fn detect_persona(query: &str) -> &'static str {
    let q = query.to_lowercase();
    if q.contains("should i") || q.contains("advice") || q.contains("invest") {
        "advisor"
    } else if q.contains("goal") || q.contains("progress") || q.contains("habit") {
        "coach"
    } else {
        "casual"
    }
}

/// `{weights, source-per-hit}` transparency object (§4.6).
#[derive(Debug, Clone, Serialize)]
pub struct Explainability {
    pub persona: String,
    pub weights: Weights,
    pub sources: std::collections::HashMap<String, HitSource>,
}

pub const STRUCTURED_CATEGORIES: [&str; 11] = [
    "emotions",
    "behaviors",
    "personal",
    "professional",
    "habits",
    "skills_tools",
    "projects",
    "relationships",
    "learning_journal",
    "finance",
    "other",
];
