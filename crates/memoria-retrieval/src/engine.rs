use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use memoria_gateways::{Embedder, LlmClient};
use memoria_stores::vector::VectorFilters;
use memoria_stores::Stores;
use tracing::warn;

use crate::scoring::{combined_score, dedup_and_rank};
use crate::types::{
    detect_persona, weights_for_persona, Explainability, Hit, HitSource, Weights,
    STRUCTURED_CATEGORIES,
};

/// *Simple retrieval* (§4.6): cosine ANN with metadata filters, stable
/// `[0, 1]` scoring.
pub async fn simple_retrieve(
    stores: Arc<Stores>,
    embedder: Arc<dyn Embedder>,
    user_id: &str,
    query: &str,
    filters: VectorFilters,
    limit: usize,
) -> Vec<Hit> {
    let Some(query_vector) = embedder.embed(query).await else {
        return vec![];
    };
    let results = stores
        .with_conn(|conn| memoria_stores::vector::query(conn, user_id, &query_vector, &filters, limit))
        .unwrap_or_default();

    dedup_and_rank(
        results
            .into_iter()
            .map(|(memory, score)| Hit::from_memory(&memory, score, HitSource::Semantic))
            .collect(),
    )
}

/// *Hybrid retrieval* (§4.6): union of semantic + time-bounded episodic +
/// structured hits, deduped by id, ranked by the combined weighted score.
pub async fn hybrid_retrieve(
    stores: Arc<Stores>,
    embedder: Arc<dyn Embedder>,
    user_id: &str,
    query: &str,
    window_from: &str,
    window_to: &str,
    weights: Weights,
    limit: usize,
) -> Vec<Hit> {
    let Some(query_vector) = embedder.embed(query).await else {
        return vec![];
    };
    let now = Utc::now();

    let semantic_rows = stores
        .with_conn(|conn| {
            memoria_stores::vector::query(conn, user_id, &query_vector, &VectorFilters::default(), limit * 2)
        })
        .unwrap_or_default();

    let episodic_rows = stores
        .with_conn(|conn| {
            memoria_stores::timeseries::episodic_in_window(conn, user_id, window_from, window_to, limit * 2)
        })
        .unwrap_or_default();

    let procedural_rows = stores
        .with_conn(|conn| memoria_stores::relational::procedural_for_user(conn, user_id))
        .unwrap_or_default();

    let holdings = stores
        .with_conn(|conn| memoria_stores::relational::list_holdings(conn, user_id))
        .unwrap_or_default();

    let mut hits: Vec<Hit> = semantic_rows
        .into_iter()
        .map(|(memory, semantic_score)| {
            let emotional_alignment = memory
                .metadata
                .get("emotional_alignment")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            let score = combined_score(
                &weights,
                semantic_score,
                &memory.timestamp,
                memory.importance,
                emotional_alignment,
                now,
            );
            Hit::from_memory(&memory, score, HitSource::Semantic)
        })
        .collect();

    hits.extend(episodic_rows.into_iter().map(|row| {
        let score = combined_score(&weights, 0.0, &row.event_timestamp, row.importance_score, 0.0, now);
        Hit {
            memory_id: row.id,
            content: row.content,
            score,
            source: HitSource::Episodic,
            metadata: row.metadata,
            timestamp: row.event_timestamp,
        }
    }));

    hits.extend(procedural_rows.into_iter().map(|row| {
        let timestamp = row.last_practiced.clone().unwrap_or_else(|| now.to_rfc3339());
        let score = combined_score(&weights, 0.0, &timestamp, row.success_rate, 0.0, now);
        Hit {
            memory_id: row.id,
            content: format!(
                "{} proficiency in {} ({} practices, {:.0}% success rate)",
                row.proficiency_level,
                row.skill_name,
                row.practice_count,
                row.success_rate * 100.0
            ),
            score,
            source: HitSource::Structured,
            metadata: serde_json::json!({
                "skill_name": row.skill_name,
                "proficiency_level": row.proficiency_level.to_string(),
                "practice_count": row.practice_count,
            }),
            timestamp,
        }
    }));

    hits.extend(holdings.into_iter().map(|holding| {
        let score = combined_score(&weights, 0.0, &holding.updated_at, 0.5, 0.0, now);
        Hit {
            memory_id: format!("holding_{}_{}", holding.user_id, holding.ticker),
            content: format!(
                "holds {} shares of {} at an average price of {}",
                holding.shares, holding.ticker, holding.avg_price
            ),
            score,
            source: HitSource::Structured,
            metadata: serde_json::json!({
                "ticker": holding.ticker,
                "shares": holding.shares,
                "avg_price": holding.avg_price,
            }),
            timestamp: holding.updated_at,
        }
    }));

    let mut ranked = dedup_and_rank(hits);
    ranked.truncate(limit);
    ranked
}

/// *Persona-aware retrieval* (§4.6): hybrid retrieval plus weight overrides
/// and an explainability object.
pub async fn persona_retrieve(
    stores: Arc<Stores>,
    embedder: Arc<dyn Embedder>,
    user_id: &str,
    query: &str,
    window_from: &str,
    window_to: &str,
    persona: Option<&str>,
    limit: usize,
) -> (Vec<Hit>, Explainability) {
    let persona = persona
        .map(|p| p.to_string())
        .unwrap_or_else(|| detect_persona(query).to_string());
    let weights = weights_for_persona(&persona);

    let hits = hybrid_retrieve(stores, embedder, user_id, query, window_from, window_to, weights, limit).await;

    let sources = hits.iter().map(|h| (h.memory_id.clone(), h.source)).collect();
    let explainability = Explainability {
        persona,
        weights,
        sources,
    };
    (hits, explainability)
}

/// *Structured retrieval* (§4.6): one LLM call re-buckets hits into a fixed
/// category set. Items with no confident bucket fall into `other`. Empty
/// input returns empty categories rather than an error.
pub async fn structured_retrieve(
    llm: Arc<dyn LlmClient>,
    hits: &[Hit],
) -> HashMap<String, Vec<String>> {
    if hits.is_empty() {
        return HashMap::new();
    }

    let schema = serde_json::json!({
        "required": ["buckets"],
        "properties": { "buckets": { "type": "object" } }
    });
    let input = serde_json::json!({
        "categories": STRUCTURED_CATEGORIES,
        "items": hits.iter().map(|h| serde_json::json!({ "id": h.memory_id, "content": h.content })).collect::<Vec<_>>(),
    });
    let prompt = "Assign each item id to exactly one of the given categories. \
        Return {\"buckets\": {category: [ids]}}. Use \"other\" when no category fits confidently.";

    let Some(value) = llm.call_structured(prompt, &input, &schema).await else {
        warn!("structured retrieval LLM call failed, returning all items under 'other'");
        let mut fallback = HashMap::new();
        fallback.insert("other".to_string(), hits.iter().map(|h| h.memory_id.clone()).collect());
        return fallback;
    };

    let buckets = value
        .get("buckets")
        .and_then(|b| b.as_object())
        .cloned()
        .unwrap_or_default();

    buckets
        .into_iter()
        .map(|(category, ids)| {
            let ids: Vec<String> = ids
                .as_array()
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default();
            (category, ids)
        })
        .collect()
}

/// *Narrative* (§4.6): one LLM call weaves ranked, deduped hits into
/// coherent prose. Empty input returns an empty narrative, never an error.
pub async fn narrative(
    llm: Arc<dyn LlmClient>,
    hits: &[Hit],
    profile_summary: Option<serde_json::Value>,
) -> Option<String> {
    if hits.is_empty() {
        return Some(String::new());
    }

    let schema = serde_json::json!({ "required": ["narrative"] });
    let input = serde_json::json!({
        "memories": hits.iter().map(|h| h.content.clone()).collect::<Vec<_>>(),
        "profile_summary": profile_summary,
    });
    let prompt = "Weave the given memories into a short, coherent first-person narrative summary.";

    llm.call_structured(prompt, &input, &schema)
        .await
        .and_then(|v| v.get("narrative").and_then(|n| n.as_str()).map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::{new_memory_id, now_iso, MemoryLayer, MemoryType};
    use memoria_gateways::{DeterministicEmbedder, FakeLlmClient};
    use memoria_stores::types::Memory;

    fn sample_memory(user_id: &str, content: &str, embedding: Vec<f32>) -> Memory {
        Memory {
            id: new_memory_id(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            layer: MemoryLayer::Semantic,
            memory_type: MemoryType::Explicit,
            importance: 0.8,
            confidence: 0.9,
            relevance_score: 0.8,
            usage_count: 0,
            persona_tags: vec![],
            embedding,
            timestamp: now_iso(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn simple_retrieve_ranks_by_cosine() {
        let stores = Arc::new(Stores::open_in_memory().unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(DeterministicEmbedder);

        let target_embedding = embedder.embed("hiking trip").await.unwrap();
        let mem = sample_memory("u1", "went on a hiking trip", target_embedding);
        stores.with_conn(|conn| memoria_stores::vector::upsert(conn, &mem)).unwrap();

        let hits = simple_retrieve(
            Arc::clone(&stores),
            Arc::clone(&embedder),
            "u1",
            "hiking trip",
            VectorFilters::default(),
            5,
        )
        .await;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.9);
    }

    #[tokio::test]
    async fn narrative_is_empty_for_no_hits() {
        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::failing());
        let result = narrative(llm, &[], None).await;
        assert_eq!(result, Some(String::new()));
    }

    #[tokio::test]
    async fn structured_retrieve_falls_back_to_other_on_llm_failure() {
        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::failing());
        let hits = vec![Hit {
            memory_id: "mem_x".to_string(),
            content: "likes jazz".to_string(),
            score: 0.5,
            source: HitSource::Semantic,
            metadata: serde_json::json!({}),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }];
        let buckets = structured_retrieve(llm, &hits).await;
        assert_eq!(buckets.get("other"), Some(&vec!["mem_x".to_string()]));
    }
}
