use std::collections::HashMap;
use std::sync::Arc;

use memoria_core::MemoryLayer;
use memoria_stores::Stores;
use tracing::warn;

use crate::error::IngestionError;
use crate::types::MemoryBundle;

/// Per-backend success map returned by `store`/`delete` (§4.3).
pub type BackendOutcome = HashMap<String, bool>;

/// C7 — routes one logical memory to a deterministic subset of C3–C6 in
/// parallel, then returns a per-backend success map. The vector store is
/// the source of truth for existence: its write happens last so the
/// `stored_in_*` flags baked into the vector record reflect exactly which
/// typed writes actually landed (§4.3).
pub async fn store(
    stores: Arc<Stores>,
    mut bundle: MemoryBundle,
) -> Result<(BackendOutcome, memoria_stores::types::Memory), IngestionError> {
    let mut outcome = BackendOutcome::new();
    let mut tasks: Vec<(&'static str, tokio::task::JoinHandle<bool>)> = Vec::new();

    if let Some(episodic) = bundle.episodic.clone() {
        let s = Arc::clone(&stores);
        tasks.push((
            "episodic",
            tokio::task::spawn_blocking(move || {
                s.with_conn(|conn| memoria_stores::timeseries::insert_episodic(conn, &episodic))
                    .is_ok()
            }),
        ));
    }

    if let Some(emotional) = bundle.emotional.clone() {
        let s = Arc::clone(&stores);
        tasks.push((
            "emotional",
            tokio::task::spawn_blocking(move || {
                s.with_conn(|conn| memoria_stores::timeseries::insert_emotional(conn, &emotional))
                    .is_ok()
            }),
        ));
    }

    if let Some(procedural) = bundle.procedural.clone() {
        let s = Arc::clone(&stores);
        tasks.push((
            "procedural",
            tokio::task::spawn_blocking(move || {
                s.with_conn(|conn| memoria_stores::relational::upsert_procedural(conn, &procedural))
                    .is_ok()
            }),
        ));
    }

    if let Some(holding) = bundle.portfolio.clone() {
        let s = Arc::clone(&stores);
        tasks.push((
            "portfolio",
            tokio::task::spawn_blocking(move || {
                s.with_conn(|conn| memoria_stores::relational::upsert_holding(conn, &holding))
                    .is_ok()
            }),
        ));
    }

    if bundle.memory.layer == MemoryLayer::ShortTerm {
        let s = Arc::clone(&stores);
        let user_id = bundle.memory.user_id.clone();
        let mem_id = bundle.memory.id.clone();
        let value = serde_json::json!({ "content": bundle.memory.content });
        tasks.push((
            "cache",
            tokio::task::spawn_blocking(move || {
                s.with_conn(|conn| {
                    memoria_stores::cache::set_short_term(conn, &user_id, &mem_id, &value, 3600)
                })
                .is_ok()
            }),
        ));
    }

    for (backend, task) in tasks {
        let ok = match task.await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(backend, error = %e, "backend write task panicked");
                false
            }
        };
        outcome.insert(backend.to_string(), ok);
        bundle.memory.set_stored_in(backend_flag(backend), ok);
    }

    let memory = bundle.memory;
    let vector_result = {
        let s = Arc::clone(&stores);
        let memory = memory.clone();
        tokio::task::spawn_blocking(move || s.with_conn(|conn| memoria_stores::vector::upsert(conn, &memory)))
            .await
    };

    match vector_result {
        Ok(Ok(())) => {
            outcome.insert("vector".to_string(), true);
            Ok((outcome, memory))
        }
        Ok(Err(e)) => {
            outcome.insert("vector".to_string(), false);
            Err(IngestionError::Store(e))
        }
        Err(join_err) => {
            outcome.insert("vector".to_string(), false);
            Err(IngestionError::Store(memoria_stores::StoreError::NotFound(format!(
                "vector write task panicked: {join_err}"
            ))))
        }
    }
}

/// `delete(memory_id, user_id) -> {backend -> ok|err}` (§4.3). Reads the
/// `stored_in_*` flags off the existing vector record so it only attempts
/// deletes against backends that actually hold a copy.
pub async fn delete(
    stores: Arc<Stores>,
    memory_id: String,
    user_id: String,
) -> Result<BackendOutcome, IngestionError> {
    let existing = {
        let s = Arc::clone(&stores);
        let id = memory_id.clone();
        tokio::task::spawn_blocking(move || s.with_conn(|conn| memoria_stores::vector::get(conn, &id)))
            .await
            .map_err(|e| memoria_stores::StoreError::NotFound(e.to_string()))??
    };

    let Some(memory) = existing else {
        return Err(IngestionError::Store(memoria_stores::StoreError::NotFound(memory_id)));
    };
    if memory.user_id != user_id {
        return Err(IngestionError::UnauthorizedCrossUser { memory_id, user_id });
    }

    let mut outcome = BackendOutcome::new();

    if memory.stored_in("stored_in_episodic") {
        let s = Arc::clone(&stores);
        let (id, user) = (memory.id.clone(), memory.user_id.clone());
        let ok = tokio::task::spawn_blocking(move || {
            s.with_conn(|conn| memoria_stores::timeseries::delete_episodic(conn, &id, &user))
                .is_ok()
        })
        .await
        .unwrap_or(false);
        outcome.insert("episodic".to_string(), ok);
    }

    if memory.stored_in("stored_in_emotional") {
        let s = Arc::clone(&stores);
        let (id, user) = (memory.id.clone(), memory.user_id.clone());
        let ok = tokio::task::spawn_blocking(move || {
            s.with_conn(|conn| memoria_stores::timeseries::delete_emotional(conn, &id, &user))
                .is_ok()
        })
        .await
        .unwrap_or(false);
        outcome.insert("emotional".to_string(), ok);
    }

    if memory.stored_in("stored_in_procedural") {
        let s = Arc::clone(&stores);
        let (id, user) = (memory.id.clone(), memory.user_id.clone());
        let ok = tokio::task::spawn_blocking(move || {
            s.with_conn(|conn| memoria_stores::relational::delete_procedural(conn, &id, &user))
                .is_ok()
        })
        .await
        .unwrap_or(false);
        outcome.insert("procedural".to_string(), ok);
    }

    let s = Arc::clone(&stores);
    let (id, user) = (memory.id.clone(), memory.user_id.clone());
    let vector_ok = tokio::task::spawn_blocking(move || {
        s.with_conn(|conn| memoria_stores::vector::delete(conn, &id, &user))
    })
    .await
    .map_err(|e| memoria_stores::StoreError::NotFound(e.to_string()))??;
    outcome.insert("vector".to_string(), vector_ok);

    Ok(outcome)
}

fn backend_flag(backend: &str) -> &'static str {
    match backend {
        "episodic" => "stored_in_episodic",
        "emotional" => "stored_in_emotional",
        "procedural" => "stored_in_procedural",
        "portfolio" => "stored_in_portfolio",
        "cache" => "stored_in_cache",
        _ => "stored_in_other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::{new_memory_id, now_iso, MemoryType};
    use memoria_stores::types::Memory;

    fn sample_memory(layer: MemoryLayer) -> Memory {
        Memory {
            id: new_memory_id(),
            user_id: "u1".to_string(),
            content: "likes tea".to_string(),
            layer,
            memory_type: MemoryType::Explicit,
            importance: 0.8,
            confidence: 0.9,
            relevance_score: 0.8,
            usage_count: 0,
            persona_tags: vec![],
            embedding: vec![1.0, 0.0, 0.0],
            timestamp: now_iso(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn store_always_writes_vector_and_sets_flags() {
        let stores = Arc::new(Stores::open_in_memory().unwrap());
        let bundle = MemoryBundle::bare(sample_memory(MemoryLayer::Semantic));
        let (outcome, memory) = store(Arc::clone(&stores), bundle).await.unwrap();
        assert_eq!(outcome.get("vector"), Some(&true));
        assert!(!memory.stored_in("stored_in_episodic"));
    }

    #[tokio::test]
    async fn short_term_layer_routes_to_cache() {
        let stores = Arc::new(Stores::open_in_memory().unwrap());
        let bundle = MemoryBundle::bare(sample_memory(MemoryLayer::ShortTerm));
        let (outcome, memory) = store(Arc::clone(&stores), bundle).await.unwrap();
        assert_eq!(outcome.get("cache"), Some(&true));
        assert!(memory.stored_in("stored_in_cache"));
    }

    #[tokio::test]
    async fn delete_removes_vector_record() {
        let stores = Arc::new(Stores::open_in_memory().unwrap());
        let bundle = MemoryBundle::bare(sample_memory(MemoryLayer::Semantic));
        let (_, memory) = store(Arc::clone(&stores), bundle).await.unwrap();

        let outcome = delete(Arc::clone(&stores), memory.id.clone(), "u1".to_string())
            .await
            .unwrap();
        assert_eq!(outcome.get("vector"), Some(&true));

        let fetched = stores
            .with_conn(|conn| memoria_stores::vector::get(conn, &memory.id))
            .unwrap();
        assert!(fetched.is_none());
    }
}
