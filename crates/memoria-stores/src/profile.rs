use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use memoria_core::PROFILE_TOTAL_FIELDS;

use crate::error::StoreError;
use crate::types::{ProfileConfidence, ProfileField, ProfileSource, ProfileUpdate, UserProfile};

/// §4.5 — `upsert_profile_fields`: one transaction per update. Manual API
/// edits pass `confidence = 100` and a `source_type` of `Explicit` to get
/// the "direct write wins" override behavior for free through the normal
/// confidence recompute (a single source at max recency/frequency/
/// explicitness dominates the weighted average).
pub fn upsert_profile_fields(
    conn: &mut Connection,
    user_id: &str,
    updates: &[ProfileUpdate],
) -> Result<(), StoreError> {
    for update in updates {
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        ensure_user_profile_row(&tx, user_id, &now)?;

        let category = update.category.to_string();
        tx.execute(
            "INSERT INTO profile_fields (user_id, category, field_name, field_value, value_type)
             VALUES (?1, ?2, ?3, ?4, 'string')
             ON CONFLICT(user_id, category, field_name) DO UPDATE SET
                field_value = excluded.field_value",
            params![user_id, category, update.field_name, update.field_value],
        )?;

        tx.execute(
            "INSERT INTO profile_sources
                (user_id, category, field_name, source_memory_id, source_type, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                category,
                update.field_name,
                update.source_memory_id,
                update.source_type.to_string(),
                now,
            ],
        )?;

        recompute_confidence(&tx, user_id, &category, &update.field_name)?;
        recompute_completeness(&tx, user_id, &now)?;

        tx.commit()?;
    }
    Ok(())
}

fn ensure_user_profile_row(conn: &Connection, user_id: &str, now: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO user_profiles (user_id, completeness_pct, total_fields, populated_fields, created_at, last_updated)
         VALUES (?1, 0, ?2, 0, ?3, ?3)
         ON CONFLICT(user_id) DO NOTHING",
        params![user_id, PROFILE_TOTAL_FIELDS as i64, now],
    )?;
    Ok(())
}

/// `overall = 0.30*freq + 0.25*rec + 0.25*expl + 0.20*div` (§4.5).
fn recompute_confidence(
    conn: &Connection,
    user_id: &str,
    category: &str,
    field_name: &str,
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT source_memory_id, source_type, extracted_at FROM profile_sources
         WHERE user_id = ?1 AND category = ?2 AND field_name = ?3",
    )?;
    let sources: Vec<(Option<String>, String, String)> = stmt
        .query_map(params![user_id, category, field_name], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .filter_map(|r| r.ok())
        .collect();

    let mention_count = sources.len() as i64;
    let last_mentioned = sources
        .iter()
        .map(|(_, _, ts)| ts.clone())
        .max()
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    let frequency = (mention_count as f64 / 10.0).min(1.0) * 100.0;

    let latest = chrono::DateTime::parse_from_rfc3339(&last_mentioned)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let recency = {
        let age_days = (Utc::now() - latest).num_seconds() as f64 / 86_400.0;
        (1.0 - age_days / 30.0).max(0.0) * 100.0
    };

    let explicitness = if sources.is_empty() {
        0.0
    } else {
        let sum: f64 = sources
            .iter()
            .map(|(_, source_type, _)| {
                source_type
                    .parse::<memoria_core::SourceType>()
                    .map(|t| t.explicitness_score())
                    .unwrap_or(0.4)
            })
            .sum();
        (sum / sources.len() as f64) * 100.0
    };

    let distinct_sources: std::collections::HashSet<&str> = sources
        .iter()
        .filter_map(|(id, _, _)| id.as_deref())
        .collect();
    let source_diversity = (distinct_sources.len() as f64 / 5.0).min(1.0) * 100.0;

    let overall = 0.30 * frequency + 0.25 * recency + 0.25 * explicitness + 0.20 * source_diversity;

    conn.execute(
        "INSERT INTO profile_confidence_scores
            (user_id, category, field_name, overall_confidence, frequency, recency,
             explicitness, source_diversity, mention_count, last_mentioned)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(user_id, category, field_name) DO UPDATE SET
            overall_confidence = excluded.overall_confidence,
            frequency = excluded.frequency,
            recency = excluded.recency,
            explicitness = excluded.explicitness,
            source_diversity = excluded.source_diversity,
            mention_count = excluded.mention_count,
            last_mentioned = excluded.last_mentioned",
        params![
            user_id,
            category,
            field_name,
            overall,
            frequency,
            recency,
            explicitness,
            source_diversity,
            mention_count,
            last_mentioned,
        ],
    )?;
    Ok(())
}

/// A manual API edit sets confidence to 100 directly, bypassing the
/// source-derived computation (§4.5 "direct write wins").
pub fn set_manual_override(
    conn: &mut Connection,
    user_id: &str,
    category: memoria_core::ProfileCategory,
    field_name: &str,
    field_value: &str,
) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    let now = Utc::now().to_rfc3339();
    ensure_user_profile_row(&tx, user_id, &now)?;

    let category_str = category.to_string();
    tx.execute(
        "INSERT INTO profile_fields (user_id, category, field_name, field_value, value_type)
         VALUES (?1, ?2, ?3, ?4, 'string')
         ON CONFLICT(user_id, category, field_name) DO UPDATE SET field_value = excluded.field_value",
        params![user_id, category_str, field_name, field_value],
    )?;
    tx.execute(
        "INSERT INTO profile_confidence_scores
            (user_id, category, field_name, overall_confidence, frequency, recency,
             explicitness, source_diversity, mention_count, last_mentioned)
         VALUES (?1, ?2, ?3, 100, 100, 100, 100, 100, 1, ?4)
         ON CONFLICT(user_id, category, field_name) DO UPDATE SET
            overall_confidence = 100, frequency = 100, recency = 100,
            explicitness = 100, source_diversity = 100, last_mentioned = excluded.last_mentioned",
        params![user_id, category_str, field_name, now],
    )?;
    recompute_completeness(&tx, user_id, &now)?;
    tx.commit()?;
    Ok(())
}

fn recompute_completeness(conn: &Connection, user_id: &str, now: &str) -> Result<(), StoreError> {
    let populated: i64 = conn.query_row(
        "SELECT COUNT(*) FROM profile_fields WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    let pct = (populated as f64 / PROFILE_TOTAL_FIELDS as f64) * 100.0;
    conn.execute(
        "UPDATE user_profiles SET completeness_pct = ?1, populated_fields = ?2, last_updated = ?3
         WHERE user_id = ?4",
        params![pct, populated, now, user_id],
    )?;
    Ok(())
}

pub fn get_user_profile(conn: &Connection, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
    conn.query_row(
        "SELECT user_id, completeness_pct, total_fields, populated_fields, created_at, last_updated
         FROM user_profiles WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(UserProfile {
                user_id: row.get(0)?,
                completeness_pct: row.get(1)?,
                total_fields: row.get(2)?,
                populated_fields: row.get(3)?,
                created_at: row.get(4)?,
                last_updated: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(StoreError::from)
}

pub fn list_profile_fields(conn: &Connection, user_id: &str) -> Result<Vec<ProfileField>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT user_id, category, field_name, field_value, value_type
         FROM profile_fields WHERE user_id = ?1 ORDER BY category, field_name",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        let category_str: String = row.get(1)?;
        Ok(ProfileField {
            user_id: row.get(0)?,
            category: category_str.parse().unwrap_or(memoria_core::ProfileCategory::Basics),
            field_name: row.get(2)?,
            field_value: row.get(3)?,
            value_type: row.get(4)?,
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn list_confidence_scores(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<ProfileConfidence>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT user_id, category, field_name, overall_confidence, frequency, recency,
                explicitness, source_diversity, mention_count, last_mentioned
         FROM profile_confidence_scores WHERE user_id = ?1",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        let category_str: String = row.get(1)?;
        Ok(ProfileConfidence {
            user_id: row.get(0)?,
            category: category_str.parse().unwrap_or(memoria_core::ProfileCategory::Basics),
            field_name: row.get(2)?,
            overall_confidence: row.get(3)?,
            frequency: row.get(4)?,
            recency: row.get(5)?,
            explicitness: row.get(6)?,
            source_diversity: row.get(7)?,
            mention_count: row.get(8)?,
            last_mentioned: row.get(9)?,
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn list_profile_sources(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<ProfileSource>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, category, field_name, source_memory_id, source_type, extracted_at
         FROM profile_sources WHERE user_id = ?1 ORDER BY extracted_at DESC",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        let category_str: String = row.get(2)?;
        let source_type_str: String = row.get(5)?;
        Ok(ProfileSource {
            id: row.get(0)?,
            user_id: row.get(1)?,
            category: category_str.parse().unwrap_or(memoria_core::ProfileCategory::Basics),
            field_name: row.get(3)?,
            source_memory_id: row.get(4)?,
            source_type: source_type_str.parse().unwrap_or(memoria_core::SourceType::Inferred),
            extracted_at: row.get(6)?,
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Cascading delete (§3 invariant): removing a profile drops fields, scores
/// and sources together.
pub fn delete_profile(conn: &mut Connection, user_id: &str) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM profile_sources WHERE user_id = ?1", params![user_id])?;
    tx.execute(
        "DELETE FROM profile_confidence_scores WHERE user_id = ?1",
        params![user_id],
    )?;
    tx.execute("DELETE FROM profile_fields WHERE user_id = ?1", params![user_id])?;
    tx.execute("DELETE FROM user_profiles WHERE user_id = ?1", params![user_id])?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::{ProfileCategory, SourceType};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn completeness_reflects_populated_fields() {
        let mut conn = test_conn();
        upsert_profile_fields(
            &mut conn,
            "u1",
            &[ProfileUpdate {
                category: ProfileCategory::Basics,
                field_name: "name".to_string(),
                field_value: "Alex".to_string(),
                confidence: 80.0,
                source_type: SourceType::Explicit,
                source_memory_id: Some("mem_1".to_string()),
            }],
        )
        .unwrap();

        let profile = get_user_profile(&conn, "u1").unwrap().unwrap();
        assert_eq!(profile.populated_fields, 1);
        assert!((profile.completeness_pct - (1.0 / 25.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn manual_override_sets_confidence_to_100() {
        let mut conn = test_conn();
        set_manual_override(&mut conn, "u1", ProfileCategory::Basics, "name", "Alex").unwrap();
        let scores = list_confidence_scores(&conn, "u1").unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].overall_confidence, 100.0);
    }

    #[test]
    fn delete_profile_cascades() {
        let mut conn = test_conn();
        upsert_profile_fields(
            &mut conn,
            "u1",
            &[ProfileUpdate {
                category: ProfileCategory::Basics,
                field_name: "name".to_string(),
                field_value: "Alex".to_string(),
                confidence: 80.0,
                source_type: SourceType::Explicit,
                source_memory_id: None,
            }],
        )
        .unwrap();
        delete_profile(&mut conn, "u1").unwrap();
        assert!(get_user_profile(&conn, "u1").unwrap().is_none());
        assert!(list_profile_fields(&conn, "u1").unwrap().is_empty());
    }
}
