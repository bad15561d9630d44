use std::sync::Arc;

use chrono::Utc;
use memoria_core::{new_memory_id, now_iso};
use memoria_gateways::LlmClient;
use memoria_stores::types::Memory;
use memoria_stores::Stores;
use tracing::warn;

use crate::clustering::cluster_by_cosine;
use crate::types::{
    CompactionSummary, CLUSTER_COSINE_THRESHOLD, CRITICAL_TAG, DECAY_HALF_LIFE_DAYS,
    DROP_THRESHOLD, MAX_CANDIDATES_PER_RUN, MIN_AGE_DAYS, MIN_CLUSTER_SIZE,
};

const CONSOLIDATE_PROMPT: &str = "Merge the given related memories into one consolidated record \
that preserves every distinct fact. Return a single concise statement.";

/// `compact(user_id)` (§4.8): decay, drop, cluster, consolidate. Never
/// propagates I/O failures past the call boundary for an individual
/// candidate — those are logged and the run continues with the rest.
pub async fn compact(
    stores: Arc<Stores>,
    llm: Arc<dyn LlmClient>,
    user_id: &str,
    dry_run: bool,
) -> CompactionSummary {
    let cutoff = (Utc::now() - chrono::Duration::days(MIN_AGE_DAYS)).to_rfc3339();
    let candidates = stores
        .with_conn(|conn| memoria_stores::vector::candidates_older_than(conn, user_id, &cutoff, MAX_CANDIDATES_PER_RUN))
        .unwrap_or_default();

    let mut summary = CompactionSummary {
        user_id: user_id.to_string(),
        candidates_scanned: candidates.len(),
        dry_run,
        ..Default::default()
    };

    let mut survivors = Vec::new();
    for memory in candidates {
        let decayed = decayed_importance(&memory);
        let pinned = memory.persona_tags.iter().any(|t| t == CRITICAL_TAG);
        if decayed < DROP_THRESHOLD && !pinned {
            summary.dropped += 1;
            if !dry_run {
                if let Err(e) = memoria_ingestion::orchestrator::delete(
                    Arc::clone(&stores),
                    memory.id.clone(),
                    user_id.to_string(),
                )
                .await
                {
                    warn!(error = %e, memory_id = %memory.id, "failed to drop decayed memory");
                }
            }
            continue;
        }
        survivors.push(memory);
    }

    let clusters = cluster_by_cosine(&survivors, CLUSTER_COSINE_THRESHOLD);
    for cluster in clusters {
        if cluster.len() < MIN_CLUSTER_SIZE {
            continue;
        }
        let group: Vec<&Memory> = cluster.iter().map(|&idx| &survivors[idx]).collect();
        if let Some(golden) = consolidate(llm.as_ref(), &group).await {
            summary.clusters_consolidated += 1;
            if !dry_run {
                let bundle = memoria_ingestion::MemoryBundle::bare(golden);
                match memoria_ingestion::orchestrator::store(Arc::clone(&stores), bundle).await {
                    Ok(_) => summary.memories_created += 1,
                    Err(e) => warn!(error = %e, "failed to store consolidated golden record"),
                }
                for memory in &group {
                    match memoria_ingestion::orchestrator::delete(
                        Arc::clone(&stores),
                        memory.id.clone(),
                        user_id.to_string(),
                    )
                    .await
                    {
                        Ok(_) => summary.memories_deleted += 1,
                        Err(e) => warn!(error = %e, memory_id = %memory.id, "failed to delete consolidated original"),
                    }
                }
            }
        }
    }

    summary
}

/// `importance' = importance * exp(-age_days / half_life)` (§4.8).
fn decayed_importance(memory: &Memory) -> f64 {
    let Ok(ts) = chrono::DateTime::parse_from_rfc3339(&memory.timestamp) else {
        return memory.importance;
    };
    let age_days = (Utc::now() - ts.with_timezone(&Utc)).num_seconds() as f64 / 86_400.0;
    memory.importance * (-age_days.max(0.0) / DECAY_HALF_LIFE_DAYS).exp()
}

/// One C2 call per group of >= 3 (§4.8): highest confidence wins, tags
/// union, earliest timestamp preserved, metadata links back to the merged
/// ids. Returns `None` (skip this group) rather than propagate a gateway
/// failure, matching the service-wide graceful-degradation pattern.
async fn consolidate(llm: &dyn LlmClient, group: &[&Memory]) -> Option<Memory> {
    let schema = serde_json::json!({ "required": ["content"] });
    let input = serde_json::json!({
        "memories": group.iter().map(|m| m.content.clone()).collect::<Vec<_>>(),
    });
    let value = llm.call_structured(CONSOLIDATE_PROMPT, &input, &schema).await?;
    let content = value.get("content")?.as_str()?.to_string();

    let highest_confidence = group.iter().map(|m| m.confidence).fold(0.0_f64, f64::max);
    let mut tags: Vec<String> = group.iter().flat_map(|m| m.persona_tags.clone()).collect();
    tags.sort();
    tags.dedup();
    let earliest_timestamp = group
        .iter()
        .map(|m| m.timestamp.clone())
        .min()
        .unwrap_or_else(now_iso);
    let merged_ids: Vec<String> = group.iter().map(|m| m.id.clone()).collect();
    let embedding = group.first().map(|m| m.embedding.clone()).unwrap_or_default();
    let user_id = group.first().map(|m| m.user_id.clone()).unwrap_or_default();

    Some(Memory {
        id: new_memory_id(),
        user_id,
        content,
        layer: group[0].layer,
        memory_type: group[0].memory_type,
        importance: group.iter().map(|m| m.importance).fold(0.0_f64, f64::max),
        confidence: highest_confidence,
        relevance_score: group.iter().map(|m| m.relevance_score).fold(0.0_f64, f64::max),
        usage_count: group.iter().map(|m| m.usage_count).sum(),
        persona_tags: tags,
        embedding,
        timestamp: earliest_timestamp,
        metadata: serde_json::json!({ "consolidated_from": merged_ids }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::{MemoryLayer, MemoryType};
    use memoria_gateways::FakeLlmClient;

    fn aged_memory(user_id: &str, importance: f64, days_old: i64, embedding: Vec<f32>) -> Memory {
        Memory {
            id: new_memory_id(),
            user_id: user_id.to_string(),
            content: "some durable fact".to_string(),
            layer: MemoryLayer::Semantic,
            memory_type: MemoryType::Explicit,
            importance,
            confidence: 0.8,
            relevance_score: 0.5,
            usage_count: 0,
            persona_tags: vec![],
            embedding,
            timestamp: (Utc::now() - chrono::Duration::days(days_old)).to_rfc3339(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn drops_decayed_memories_below_threshold() {
        let stores = Arc::new(Stores::open_in_memory().unwrap());
        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::failing());
        let low_importance = aged_memory("u1", 0.01, 200, vec![1.0, 0.0, 0.0]);
        stores
            .with_conn(|conn| memoria_stores::vector::upsert(conn, &low_importance))
            .unwrap();

        let summary = compact(Arc::clone(&stores), llm, "u1", false).await;
        assert_eq!(summary.dropped, 1);
        assert!(stores
            .with_conn(|conn| memoria_stores::vector::get(conn, &low_importance.id))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn critical_tag_survives_decay() {
        let stores = Arc::new(Stores::open_in_memory().unwrap());
        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::failing());
        let mut pinned = aged_memory("u1", 0.01, 200, vec![1.0, 0.0, 0.0]);
        pinned.persona_tags.push("critical".to_string());
        stores.with_conn(|conn| memoria_stores::vector::upsert(conn, &pinned)).unwrap();

        let summary = compact(Arc::clone(&stores), llm, "u1", false).await;
        assert_eq!(summary.dropped, 0);
        assert!(stores
            .with_conn(|conn| memoria_stores::vector::get(conn, &pinned.id))
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn dry_run_skips_deletes() {
        let stores = Arc::new(Stores::open_in_memory().unwrap());
        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::failing());
        let low_importance = aged_memory("u1", 0.01, 200, vec![1.0, 0.0, 0.0]);
        stores
            .with_conn(|conn| memoria_stores::vector::upsert(conn, &low_importance))
            .unwrap();

        let summary = compact(Arc::clone(&stores), llm, "u1", true).await;
        assert_eq!(summary.dropped, 1);
        assert!(stores
            .with_conn(|conn| memoria_stores::vector::get(conn, &low_importance.id))
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn consolidates_cluster_of_three_or_more() {
        let stores = Arc::new(Stores::open_in_memory().unwrap());
        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::returning(serde_json::json!({
            "content": "user consistently drinks dark roast coffee",
        })));
        for _ in 0..3 {
            let m = aged_memory("u1", 0.9, 10, vec![1.0, 0.0, 0.0]);
            stores.with_conn(|conn| memoria_stores::vector::upsert(conn, &m)).unwrap();
        }

        let summary = compact(Arc::clone(&stores), llm, "u1", false).await;
        assert_eq!(summary.clusters_consolidated, 1);
        assert_eq!(summary.memories_created, 1);
        assert_eq!(summary.memories_deleted, 3);
    }
}
