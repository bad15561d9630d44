use std::collections::HashMap;
use std::sync::Arc;

use memoria_core::{new_memory_id, now_iso, MemoryLayer, MemoryType};
use memoria_gateways::{Embedder, LlmClient};
use memoria_stores::types::{EmotionalRow, EpisodicRow, Memory, ProceduralRow, ProficiencyLevel};
use memoria_stores::Stores;
use tracing::warn;

use crate::error::IngestionError;
use crate::orchestrator;
use crate::types::{ExtractionResult, IngestSummary, MemoryBundle};

const EXISTING_MEMORY_CONTEXT_SIZE: usize = 20;

fn extraction_schema() -> serde_json::Value {
    serde_json::json!({
        "required": ["memories", "profile_updates"],
        "properties": {
            "memories": { "type": "array" },
            "profile_updates": { "type": "array" }
        }
    })
}

const EXTRACT_PROMPT: &str = "Extract durable facts and profile field updates from the \
transcript below. Reject truisms, restatements of user actions, and quantitative state \
data that belongs in a structured tool (e.g. share counts). Suppress anything that \
semantically duplicates one of the existing memories provided.";

/// C8 — `init -> extract_all -> classify_and_enrich -> build_objects -> store_all -> finalize`.
///
/// Never propagates past the request boundary (§4.4 failure mode): an
/// embedder/LLM failure degrades to an empty-but-successful summary rather
/// than an error.
pub async fn ingest(
    stores: Arc<Stores>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LlmClient>,
    extraction_confidence_threshold: f64,
    dedup_cosine_threshold: f64,
    user_id: &str,
    transcript: &str,
) -> IngestSummary {
    let existing = init(&stores, user_id);
    let extraction = extract_all(&llm, transcript, &existing).await;

    let Some(extraction) = extraction else {
        return IngestSummary {
            memories_created: 0,
            ids: vec![],
            summary: "extraction unavailable".to_string(),
            per_backend_status: HashMap::new(),
        };
    };

    let bundles = classify_and_enrich(
        embedder.as_ref(),
        &existing,
        extraction.memories,
        extraction_confidence_threshold,
        dedup_cosine_threshold,
    )
    .await;

    let bundles = build_objects(user_id, bundles);

    finalize(
        store_all(Arc::clone(&stores), user_id, bundles, extraction.profile_updates).await,
    )
}

fn init(stores: &Arc<Stores>, user_id: &str) -> Vec<Memory> {
    stores
        .with_conn(|conn| memoria_stores::vector::top_recent_relevant(conn, user_id, EXISTING_MEMORY_CONTEXT_SIZE))
        .unwrap_or_default()
}

async fn extract_all(
    llm: &Arc<dyn LlmClient>,
    transcript: &str,
    existing: &[Memory],
) -> Option<ExtractionResult> {
    let existing_summaries: Vec<serde_json::Value> = existing
        .iter()
        .map(|m| serde_json::json!({ "id": m.id, "content": m.content }))
        .collect();
    let input = serde_json::json!({
        "transcript": transcript,
        "existing_memories": existing_summaries,
    });

    let value = llm.call_structured(EXTRACT_PROMPT, &input, &extraction_schema()).await?;
    match serde_json::from_value::<ExtractionResult>(value) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(error = %e, "extraction result did not match expected shape");
            None
        }
    }
}

/// Assigns storage destinations by presence of typed fields and computes
/// embeddings in parallel (§4.4). Candidates under the confidence threshold
/// or that semantically entail an existing memory (cosine >= dedup
/// threshold) are suppressed.
async fn classify_and_enrich(
    embedder: &dyn Embedder,
    existing: &[Memory],
    candidates: Vec<crate::types::ExtractedMemory>,
    confidence_threshold: f64,
    dedup_cosine_threshold: f64,
) -> Vec<(crate::types::ExtractedMemory, Vec<f32>)> {
    let mut enriched = Vec::new();
    for candidate in candidates {
        if candidate.confidence < confidence_threshold {
            continue;
        }
        let Some(embedding) = embedder.embed(&candidate.content).await else {
            continue;
        };
        let is_duplicate = existing.iter().any(|m| {
            memoria_stores::vector::cosine_similarity(&embedding, &m.embedding) >= dedup_cosine_threshold
        });
        if is_duplicate {
            continue;
        }
        enriched.push((candidate, embedding));
    }
    enriched
}

fn build_objects(
    user_id: &str,
    enriched: Vec<(crate::types::ExtractedMemory, Vec<f32>)>,
) -> Vec<MemoryBundle> {
    enriched
        .into_iter()
        .map(|(candidate, embedding)| {
            let id = new_memory_id();
            let layer = candidate
                .layer
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(MemoryLayer::Semantic);
            let memory_type = if candidate.timestamp_type.as_deref() == Some("explicit") {
                MemoryType::Explicit
            } else {
                MemoryType::Implicit
            };

            let memory = Memory {
                id: id.clone(),
                user_id: user_id.to_string(),
                content: candidate.content.clone(),
                layer,
                memory_type,
                importance: 0.8,
                confidence: candidate.confidence,
                relevance_score: 0.8,
                usage_count: 0,
                persona_tags: candidate.tags.clone(),
                embedding,
                timestamp: candidate.timestamp.clone().unwrap_or_else(now_iso),
                metadata: serde_json::json!({}),
            };

            let has_temporal_anchor = candidate.timestamp_type.as_deref() == Some("explicit")
                && candidate.timestamp.is_some();
            let episodic = has_temporal_anchor.then(|| EpisodicRow {
                id: id.clone(),
                user_id: user_id.to_string(),
                event_timestamp: memory.timestamp.clone(),
                event_type: candidate.event_type.clone(),
                content: candidate.content.clone(),
                location: None,
                participants: candidate
                    .entities
                    .as_ref()
                    .map(|e| e.people.clone())
                    .unwrap_or_default(),
                emotional_valence: None,
                emotional_arousal: None,
                importance_score: memory.importance,
                tags: candidate.tags.clone(),
                metadata: serde_json::json!({}),
            });

            let emotional = candidate.emotional_state.clone().map(|state| EmotionalRow {
                id: id.clone(),
                user_id: user_id.to_string(),
                timestamp: memory.timestamp.clone(),
                emotional_state: state,
                valence: 0.0,
                arousal: 0.0,
                dominance: 0.0,
                context: Some(candidate.content.clone()),
                trigger_event: candidate.event_type.clone(),
                intensity: 0.5,
                duration_minutes: None,
            });

            let procedural = candidate.skill_name.clone().map(|skill_name| ProceduralRow {
                id: id.clone(),
                user_id: user_id.to_string(),
                skill_name,
                proficiency_level: ProficiencyLevel::Beginner,
                prerequisites: vec![],
                practice_count: 1,
                success_rate: 0.0,
                last_practiced: Some(memory.timestamp.clone()),
            });

            MemoryBundle {
                memory,
                episodic,
                emotional,
                procedural,
                portfolio: None,
            }
        })
        .collect()
}

async fn store_all(
    stores: Arc<Stores>,
    user_id: &str,
    bundles: Vec<MemoryBundle>,
    profile_updates: Vec<memoria_stores::types::ProfileUpdate>,
) -> IngestSummary {
    let mut ids = Vec::new();
    let mut per_backend_status = HashMap::new();

    for bundle in bundles {
        let memory_id = bundle.memory.id.clone();
        match orchestrator::store(Arc::clone(&stores), bundle).await {
            Ok((outcome, _memory)) => {
                ids.push(memory_id.clone());
                per_backend_status.insert(memory_id, outcome);
            }
            Err(e) => {
                warn!(error = %e, "memory write failed, skipping");
            }
        }
    }

    if !profile_updates.is_empty() {
        let s = Arc::clone(&stores);
        let user_id = user_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            s.with_conn_mut(|conn| memoria_stores::profile::upsert_profile_fields(conn, &user_id, &profile_updates))
        })
        .await;
        if let Ok(Err(e)) = result {
            warn!(error = %e, "profile update write failed");
        }
    }

    IngestSummary {
        memories_created: ids.len(),
        ids,
        summary: format!("created {} memories", ids.len()),
        per_backend_status,
    }
}

fn finalize(summary: IngestSummary) -> IngestSummary {
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_gateways::{DeterministicEmbedder, FakeLlmClient};

    #[tokio::test]
    async fn ingest_creates_memories_from_extraction() {
        let stores = Arc::new(Stores::open_in_memory().unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(DeterministicEmbedder);
        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::returning(serde_json::json!({
            "memories": [{
                "content": "user prefers dark roast coffee",
                "layer": "semantic",
                "tags": [],
                "confidence": 0.9,
                "timestamp_type": "none",
            }],
            "profile_updates": [],
        })));

        let summary = ingest(stores, embedder, llm, 0.80, 0.80, "u1", "I like dark roast coffee").await;
        assert_eq!(summary.memories_created, 1);
        assert_eq!(summary.ids.len(), 1);
    }

    #[tokio::test]
    async fn ingest_degrades_gracefully_on_llm_failure() {
        let stores = Arc::new(Stores::open_in_memory().unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(DeterministicEmbedder);
        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::failing());

        let summary = ingest(stores, embedder, llm, 0.80, 0.80, "u1", "hello").await;
        assert_eq!(summary.memories_created, 0);
    }

    #[tokio::test]
    async fn low_confidence_candidates_are_suppressed() {
        let stores = Arc::new(Stores::open_in_memory().unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(DeterministicEmbedder);
        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::returning(serde_json::json!({
            "memories": [{
                "content": "maybe likes tea",
                "confidence": 0.5,
            }],
            "profile_updates": [],
        })));

        let summary = ingest(stores, embedder, llm, 0.80, 0.80, "u1", "hmm").await;
        assert_eq!(summary.memories_created, 0);
    }
}
