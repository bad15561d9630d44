use memoria_stores::types::Memory;
use memoria_stores::vector::cosine_similarity;

/// Greedy single-link clustering: each memory joins the first existing
/// cluster whose seed (first member) it is within `threshold` cosine of,
/// else starts a new cluster (§4.8 "cluster remaining memories by embedding
/// cosine >= 0.88").
pub fn cluster_by_cosine(memories: &[Memory], threshold: f64) -> Vec<Vec<usize>> {
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for (idx, memory) in memories.iter().enumerate() {
        let home = clusters.iter_mut().find(|cluster| {
            let seed = &memories[cluster[0]];
            cosine_similarity(&seed.embedding, &memory.embedding) >= threshold
        });
        match home {
            Some(cluster) => cluster.push(idx),
            None => clusters.push(vec![idx]),
        }
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::{new_memory_id, now_iso, MemoryLayer, MemoryType};

    fn memory_with_embedding(embedding: Vec<f32>) -> Memory {
        Memory {
            id: new_memory_id(),
            user_id: "u1".to_string(),
            content: "x".to_string(),
            layer: MemoryLayer::Semantic,
            memory_type: MemoryType::Explicit,
            importance: 0.5,
            confidence: 0.8,
            relevance_score: 0.5,
            usage_count: 0,
            persona_tags: vec![],
            embedding,
            timestamp: now_iso(),
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn groups_similar_embeddings_together() {
        let memories = vec![
            memory_with_embedding(vec![1.0, 0.0, 0.0]),
            memory_with_embedding(vec![0.99, 0.01, 0.0]),
            memory_with_embedding(vec![0.0, 1.0, 0.0]),
        ];
        let clusters = cluster_by_cosine(&memories, 0.95);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 2);
    }
}
