use rusqlite::{params, Connection};

use crate::error::StoreError;
use crate::types::{EmotionalRow, EpisodicRow, PortfolioSnapshot};

/// C4 — append-heavy time-partitioned tables. Inserts are append/upsert by
/// `(id, timestamp)`; reads are range scans by `user_id` + a time window.
pub fn insert_episodic(conn: &Connection, row: &EpisodicRow) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO episodic_rows
            (id, user_id, event_timestamp, event_type, content, location,
             participants, emotional_valence, emotional_arousal, importance_score, tags, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id, event_timestamp) DO UPDATE SET
            event_type = excluded.event_type,
            content = excluded.content,
            location = excluded.location,
            participants = excluded.participants,
            emotional_valence = excluded.emotional_valence,
            emotional_arousal = excluded.emotional_arousal,
            importance_score = excluded.importance_score,
            tags = excluded.tags,
            metadata = excluded.metadata",
        params![
            row.id,
            row.user_id,
            row.event_timestamp,
            row.event_type,
            row.content,
            row.location.as_ref().map(|v| v.to_string()),
            serde_json::to_string(&row.participants)?,
            row.emotional_valence,
            row.emotional_arousal,
            row.importance_score,
            serde_json::to_string(&row.tags)?,
            row.metadata.to_string(),
        ],
    )?;
    Ok(())
}

pub fn episodic_in_window(
    conn: &Connection,
    user_id: &str,
    from: &str,
    to: &str,
    limit: usize,
) -> Result<Vec<EpisodicRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, event_timestamp, event_type, content, location,
                participants, emotional_valence, emotional_arousal, importance_score,
                tags, metadata
         FROM episodic_rows
         WHERE user_id = ?1 AND event_timestamp BETWEEN ?2 AND ?3
         ORDER BY event_timestamp DESC
         LIMIT ?4",
    )?;
    let rows = stmt.query_map(params![user_id, from, to, limit as i64], |row| {
        let location_str: Option<String> = row.get(5)?;
        let participants_str: String = row.get(6)?;
        let tags_str: String = row.get(10)?;
        let metadata_str: String = row.get(11)?;
        Ok(EpisodicRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            event_timestamp: row.get(2)?,
            event_type: row.get(3)?,
            content: row.get(4)?,
            location: location_str.and_then(|s| serde_json::from_str(&s).ok()),
            participants: serde_json::from_str(&participants_str).unwrap_or_default(),
            emotional_valence: row.get(7)?,
            emotional_arousal: row.get(8)?,
            importance_score: row.get(9)?,
            tags: serde_json::from_str(&tags_str).unwrap_or_default(),
            metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({})),
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn insert_emotional(conn: &Connection, row: &EmotionalRow) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO emotional_rows
            (id, user_id, timestamp, emotional_state, valence, arousal,
             dominance, context, trigger_event, intensity, duration_minutes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id, timestamp) DO UPDATE SET
            emotional_state = excluded.emotional_state,
            valence = excluded.valence,
            arousal = excluded.arousal,
            dominance = excluded.dominance,
            context = excluded.context,
            trigger_event = excluded.trigger_event,
            intensity = excluded.intensity,
            duration_minutes = excluded.duration_minutes",
        params![
            row.id,
            row.user_id,
            row.timestamp,
            row.emotional_state,
            row.valence,
            row.arousal,
            row.dominance,
            row.context,
            row.trigger_event,
            row.intensity,
            row.duration_minutes,
        ],
    )?;
    Ok(())
}

pub fn delete_episodic(conn: &Connection, id: &str, user_id: &str) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM episodic_rows WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(())
}

pub fn delete_emotional(conn: &Connection, id: &str, user_id: &str) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM emotional_rows WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(())
}

pub fn insert_portfolio_snapshot(
    conn: &Connection,
    snapshot: &PortfolioSnapshot,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO portfolio_snapshots (user_id, snapshot_timestamp, total_value, holdings)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id, snapshot_timestamp) DO UPDATE SET
            total_value = excluded.total_value,
            holdings = excluded.holdings",
        params![
            snapshot.user_id,
            snapshot.snapshot_timestamp,
            snapshot.total_value,
            snapshot.holdings.to_string(),
        ],
    )?;
    Ok(())
}

pub fn latest_portfolio_snapshot(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<PortfolioSnapshot>, StoreError> {
    use rusqlite::OptionalExtension;
    conn.query_row(
        "SELECT user_id, snapshot_timestamp, total_value, holdings
         FROM portfolio_snapshots WHERE user_id = ?1
         ORDER BY snapshot_timestamp DESC LIMIT 1",
        params![user_id],
        |row| {
            let holdings_str: String = row.get(3)?;
            Ok(PortfolioSnapshot {
                user_id: row.get(0)?,
                snapshot_timestamp: row.get(1)?,
                total_value: row.get(2)?,
                holdings: serde_json::from_str(&holdings_str).unwrap_or(serde_json::json!({})),
            })
        },
    )
    .optional()
    .map_err(StoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn episodic_window_scan_respects_bounds() {
        let conn = test_conn();
        let row = EpisodicRow {
            id: "mem_abc".to_string(),
            user_id: "u1".to_string(),
            event_timestamp: "2026-01-05T00:00:00Z".to_string(),
            event_type: Some("trip".to_string()),
            content: "went hiking".to_string(),
            location: None,
            participants: vec![],
            emotional_valence: Some(0.5),
            emotional_arousal: Some(0.4),
            importance_score: 0.7,
            tags: vec![],
            metadata: serde_json::json!({}),
        };
        insert_episodic(&conn, &row).unwrap();

        let in_window =
            episodic_in_window(&conn, "u1", "2026-01-01T00:00:00Z", "2026-01-10T00:00:00Z", 10)
                .unwrap();
        assert_eq!(in_window.len(), 1);

        let out_of_window =
            episodic_in_window(&conn, "u1", "2026-02-01T00:00:00Z", "2026-02-10T00:00:00Z", 10)
                .unwrap();
        assert!(out_of_window.is_empty());
    }
}
