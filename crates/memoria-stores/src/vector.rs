use rusqlite::{params, Connection, OptionalExtension};

use memoria_core::{MemoryLayer, MemoryType};

use crate::error::StoreError;
use crate::types::Memory;

/// C3 — user-partitioned vector index. No external vector database is part
/// of this stack, so similarity search is a brute-force cosine scan over
/// the rows already narrowed by the indexed `user_id`/`layer` columns and
/// whatever metadata filters the caller supplies. At MVP scale (thousands,
/// not millions, of memories per user) this is the same tradeoff the
/// reference stack makes by keeping everything in one SQLite file.
#[derive(Debug, Clone, Default)]
pub struct VectorFilters {
    pub layer: Option<MemoryLayer>,
    pub memory_type: Option<MemoryType>,
    pub tags: Vec<String>,
}

pub fn upsert(conn: &Connection, memory: &Memory) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO memories
            (id, user_id, content, layer, type, importance, confidence,
             relevance_score, usage_count, persona_tags, embedding, timestamp, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(id) DO UPDATE SET
            content = excluded.content,
            layer = excluded.layer,
            type = excluded.type,
            importance = excluded.importance,
            confidence = excluded.confidence,
            relevance_score = excluded.relevance_score,
            usage_count = excluded.usage_count,
            persona_tags = excluded.persona_tags,
            embedding = excluded.embedding,
            timestamp = excluded.timestamp,
            metadata = excluded.metadata",
        params![
            memory.id,
            memory.user_id,
            memory.content,
            memory.layer.to_string(),
            memory.memory_type.to_string(),
            memory.importance,
            memory.confidence,
            memory.relevance_score,
            memory.usage_count as i64,
            serde_json::to_string(&memory.persona_tags)?,
            encode_embedding(&memory.embedding),
            memory.timestamp,
            memory.metadata.to_string(),
        ],
    )?;

    let rowid: i64 = conn.query_row(
        "SELECT rowid FROM memories WHERE id = ?1",
        params![memory.id],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO memories_fts(memories_fts, rowid, content) VALUES('delete', ?1, ?2)",
        params![rowid, memory.content],
    )
    .ok();
    conn.execute(
        "INSERT INTO memories_fts(rowid, content) VALUES(?1, ?2)",
        params![rowid, memory.content],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<Memory>, StoreError> {
    conn.query_row(
        "SELECT id, user_id, content, layer, type, importance, confidence,
                relevance_score, usage_count, persona_tags, embedding, timestamp, metadata
         FROM memories WHERE id = ?1",
        params![id],
        row_to_memory,
    )
    .optional()
    .map_err(StoreError::from)
}

pub fn delete(conn: &Connection, id: &str, user_id: &str) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "DELETE FROM memories WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(changed > 0)
}

/// Cosine ANN with metadata filters (§4.6 simple retrieval). Returns
/// `(memory, score)` sorted by score descending, score in `[0, 1]`.
/// Bounded existing-memory context for ingestion's `init` step (§4.4):
/// top `limit` memories for a user ordered by recency, then relevance.
pub fn top_recent_relevant(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> Result<Vec<Memory>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, content, layer, type, importance, confidence,
                relevance_score, usage_count, persona_tags, embedding, timestamp, metadata
         FROM memories WHERE user_id = ?1
         ORDER BY timestamp DESC, relevance_score DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit as i64], row_to_memory)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Compaction candidate set (§4.8): memories older than `cutoff`, oldest
/// first, capped at `limit` per run.
pub fn candidates_older_than(
    conn: &Connection,
    user_id: &str,
    cutoff: &str,
    limit: usize,
) -> Result<Vec<Memory>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, content, layer, type, importance, confidence,
                relevance_score, usage_count, persona_tags, embedding, timestamp, metadata
         FROM memories WHERE user_id = ?1 AND timestamp < ?2
         ORDER BY timestamp ASC
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![user_id, cutoff, limit as i64], row_to_memory)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn query(
    conn: &Connection,
    user_id: &str,
    query_vector: &[f32],
    filters: &VectorFilters,
    limit: usize,
) -> Result<Vec<(Memory, f64)>, StoreError> {
    let mut sql = String::from(
        "SELECT id, user_id, content, layer, type, importance, confidence,
                relevance_score, usage_count, persona_tags, embedding, timestamp, metadata
         FROM memories WHERE user_id = ?1",
    );
    if filters.layer.is_some() {
        sql.push_str(" AND layer = ?2");
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<Memory> = if let Some(layer) = filters.layer {
        stmt.query_map(params![user_id, layer.to_string()], row_to_memory)?
            .filter_map(|r| r.ok())
            .collect()
    } else {
        stmt.query_map(params![user_id], row_to_memory)?
            .filter_map(|r| r.ok())
            .collect()
    };

    let mut scored: Vec<(Memory, f64)> = rows
        .into_iter()
        .filter(|m| {
            filters
                .memory_type
                .map(|t| t == m.memory_type)
                .unwrap_or(true)
        })
        .filter(|m| {
            filters.tags.is_empty()
                || filters.tags.iter().any(|t| m.persona_tags.contains(t))
        })
        .map(|m| {
            let score = cosine_to_unit(cosine_similarity(query_vector, &m.embedding));
            (m, score)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.0.timestamp.cmp(&a.0.timestamp))
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    scored.truncate(limit);
    Ok(scored)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Map cosine's `[-1, 1]` range onto the `[0, 1]` stable score space (§4.6).
fn cosine_to_unit(cosine: f64) -> f64 {
    ((cosine + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let layer_str: String = row.get(3)?;
    let type_str: String = row.get(4)?;
    let tags_str: String = row.get(9)?;
    let embedding_bytes: Vec<u8> = row.get(10)?;
    let metadata_str: String = row.get(12)?;
    Ok(Memory {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        layer: layer_str.parse().unwrap_or(MemoryLayer::Semantic),
        memory_type: type_str.parse().unwrap_or(MemoryType::Implicit),
        importance: row.get(5)?,
        confidence: row.get(6)?,
        relevance_score: row.get(7)?,
        usage_count: row.get::<_, i64>(8)? as u64,
        persona_tags: serde_json::from_str(&tags_str).unwrap_or_default(),
        embedding: decode_embedding(&embedding_bytes),
        timestamp: row.get(11)?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({})),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::{new_memory_id, now_iso};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    fn sample_memory(user_id: &str, embedding: Vec<f32>) -> Memory {
        Memory {
            id: new_memory_id(),
            user_id: user_id.to_string(),
            content: "likes hiking".to_string(),
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

    #[test]
    fn upsert_then_get_round_trips() {
        let conn = test_conn();
        let mem = sample_memory("u1", vec![1.0, 0.0, 0.0]);
        upsert(&conn, &mem).unwrap();
        let fetched = get(&conn, &mem.id).unwrap().unwrap();
        assert_eq!(fetched.id, mem.id);
        assert_eq!(fetched.embedding, mem.embedding);
    }

    #[test]
    fn query_ranks_by_cosine_similarity() {
        let conn = test_conn();
        let close = sample_memory("u1", vec![1.0, 0.0, 0.0]);
        let far = sample_memory("u1", vec![0.0, 1.0, 0.0]);
        upsert(&conn, &close).unwrap();
        upsert(&conn, &far).unwrap();

        let results = query(&conn, "u1", &[1.0, 0.0, 0.0], &VectorFilters::default(), 10).unwrap();
        assert_eq!(results[0].0.id, close.id);
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn delete_requires_matching_user() {
        let conn = test_conn();
        let mem = sample_memory("u1", vec![1.0, 0.0, 0.0]);
        upsert(&conn, &mem).unwrap();
        assert!(!delete(&conn, &mem.id, "other-user").unwrap());
        assert!(delete(&conn, &mem.id, "u1").unwrap());
        assert!(get(&conn, &mem.id).unwrap().is_none());
    }
}
