use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::types::*;

// ---- procedural skills ----

pub fn upsert_procedural(conn: &Connection, row: &ProceduralRow) -> Result<(), StoreError> {
    let previous: Option<String> = conn
        .query_row(
            "SELECT proficiency_level FROM procedural_rows WHERE id = ?1",
            params![row.id],
            |r| r.get(0),
        )
        .optional()?;

    conn.execute(
        "INSERT INTO procedural_rows
            (id, user_id, skill_name, proficiency_level, prerequisites,
             practice_count, success_rate, last_practiced)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            skill_name = excluded.skill_name,
            proficiency_level = excluded.proficiency_level,
            prerequisites = excluded.prerequisites,
            practice_count = excluded.practice_count,
            success_rate = excluded.success_rate,
            last_practiced = excluded.last_practiced",
        params![
            row.id,
            row.user_id,
            row.skill_name,
            row.proficiency_level.to_string(),
            serde_json::to_string(&row.prerequisites)?,
            row.practice_count as i64,
            row.success_rate,
            row.last_practiced,
        ],
    )?;

    if let Some(prev) = previous {
        if prev != row.proficiency_level.to_string() {
            conn.execute(
                "INSERT INTO skill_progressions (skill_id, from_level, to_level, transitioned_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.id, prev, row.proficiency_level.to_string(), memoria_core::now_iso()],
            )?;
        }
    }
    Ok(())
}

pub fn get_procedural(conn: &Connection, id: &str) -> Result<Option<ProceduralRow>, StoreError> {
    conn.query_row(
        "SELECT id, user_id, skill_name, proficiency_level, prerequisites,
                practice_count, success_rate, last_practiced
         FROM procedural_rows WHERE id = ?1",
        params![id],
        row_to_procedural,
    )
    .optional()
    .map_err(StoreError::from)
}

fn row_to_procedural(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProceduralRow> {
    let level_str: String = row.get(3)?;
    let prereq_str: String = row.get(4)?;
    Ok(ProceduralRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        skill_name: row.get(2)?,
        proficiency_level: level_str.parse().unwrap_or(ProficiencyLevel::Beginner),
        prerequisites: serde_json::from_str(&prereq_str).unwrap_or_default(),
        practice_count: row.get::<_, i64>(5)? as u64,
        success_rate: row.get(6)?,
        last_practiced: row.get(7)?,
    })
}

pub fn procedural_for_user(conn: &Connection, user_id: &str) -> Result<Vec<ProceduralRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, skill_name, proficiency_level, prerequisites,
                practice_count, success_rate, last_practiced
         FROM procedural_rows WHERE user_id = ?1 ORDER BY skill_name",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_procedural)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn delete_procedural(conn: &Connection, id: &str, user_id: &str) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM procedural_rows WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(())
}

// ---- portfolio ----

pub fn upsert_holding(conn: &Connection, holding: &PortfolioHolding) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO portfolio_holdings
            (user_id, ticker, shares, avg_price, asset_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(user_id, ticker) DO UPDATE SET
            shares = excluded.shares,
            avg_price = excluded.avg_price,
            asset_name = excluded.asset_name,
            updated_at = excluded.updated_at",
        params![
            holding.user_id,
            holding.ticker,
            holding.shares,
            holding.avg_price,
            holding.asset_name,
            holding.created_at,
            holding.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_holding(
    conn: &Connection,
    user_id: &str,
    ticker: &str,
) -> Result<Option<PortfolioHolding>, StoreError> {
    conn.query_row(
        "SELECT user_id, ticker, shares, avg_price, asset_name, created_at, updated_at
         FROM portfolio_holdings WHERE user_id = ?1 AND ticker = ?2",
        params![user_id, ticker],
        |row| {
            Ok(PortfolioHolding {
                user_id: row.get(0)?,
                ticker: row.get(1)?,
                shares: row.get(2)?,
                avg_price: row.get(3)?,
                asset_name: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        },
    )
    .optional()
    .map_err(StoreError::from)
}

pub fn list_holdings(conn: &Connection, user_id: &str) -> Result<Vec<PortfolioHolding>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT user_id, ticker, shares, avg_price, asset_name, created_at, updated_at
         FROM portfolio_holdings WHERE user_id = ?1 ORDER BY ticker",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(PortfolioHolding {
            user_id: row.get(0)?,
            ticker: row.get(1)?,
            shares: row.get(2)?,
            avg_price: row.get(3)?,
            asset_name: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn delete_holding(conn: &Connection, user_id: &str, ticker: &str) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "DELETE FROM portfolio_holdings WHERE user_id = ?1 AND ticker = ?2",
        params![user_id, ticker],
    )?;
    Ok(changed > 0)
}

pub fn insert_transaction(conn: &Connection, tx: &PortfolioTransaction) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO portfolio_transactions (user_id, ticker, action, shares, price, executed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![tx.user_id, tx.ticker, tx.action, tx.shares, tx.price, tx.executed_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn upsert_preference(
    conn: &Connection,
    pref: &PortfolioPreference,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO portfolio_preferences (user_id, pref_key, pref_value)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id, pref_key) DO UPDATE SET pref_value = excluded.pref_value",
        params![pref.user_id, pref.pref_key, pref.pref_value.to_string()],
    )?;
    Ok(())
}

// ---- scheduled intents (C12 storage) ----

pub fn insert_intent(conn: &Connection, intent: &ScheduledIntentRow) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO scheduled_intents
            (id, user_id, trigger_kind, trigger_config, action, enabled, next_check,
             claimed_at, last_checked, last_executed, last_condition_fire,
             execution_count, max_executions, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            intent.id,
            intent.user_id,
            intent.trigger_kind,
            intent.trigger_config.to_string(),
            intent.action.to_string(),
            intent.enabled,
            intent.next_check,
            intent.claimed_at,
            intent.last_checked,
            intent.last_executed,
            intent.last_condition_fire,
            intent.execution_count,
            intent.max_executions,
            intent.expires_at,
            intent.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_intent(conn: &Connection, id: &str) -> Result<Option<ScheduledIntentRow>, StoreError> {
    conn.query_row(
        "SELECT id, user_id, trigger_kind, trigger_config, action, enabled, next_check,
                claimed_at, last_checked, last_executed, last_condition_fire,
                execution_count, max_executions, expires_at, created_at
         FROM scheduled_intents WHERE id = ?1",
        params![id],
        row_to_intent,
    )
    .optional()
    .map_err(StoreError::from)
}

pub fn list_intents(conn: &Connection, user_id: &str) -> Result<Vec<ScheduledIntentRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, trigger_kind, trigger_config, action, enabled, next_check,
                claimed_at, last_checked, last_executed, last_condition_fire,
                execution_count, max_executions, expires_at, created_at
         FROM scheduled_intents WHERE user_id = ?1 ORDER BY created_at",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_intent)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn count_active_intents(conn: &Connection, user_id: &str) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT COUNT(*) FROM scheduled_intents WHERE user_id = ?1 AND enabled = 1",
        params![user_id],
        |row| row.get(0),
    )
    .map_err(StoreError::from)
}

pub fn delete_intent(conn: &Connection, id: &str, user_id: &str) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "DELETE FROM scheduled_intents WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(changed > 0)
}

pub fn update_intent(conn: &Connection, intent: &ScheduledIntentRow) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE scheduled_intents SET
            trigger_kind = ?2, trigger_config = ?3, action = ?4, enabled = ?5,
            next_check = ?6, claimed_at = ?7, last_checked = ?8, last_executed = ?9,
            last_condition_fire = ?10, execution_count = ?11, max_executions = ?12,
            expires_at = ?13
         WHERE id = ?1",
        params![
            intent.id,
            intent.trigger_kind,
            intent.trigger_config.to_string(),
            intent.action.to_string(),
            intent.enabled,
            intent.next_check,
            intent.claimed_at,
            intent.last_checked,
            intent.last_executed,
            intent.last_condition_fire,
            intent.execution_count,
            intent.max_executions,
            intent.expires_at,
        ],
    )?;
    Ok(())
}

/// `enabled AND next_check <= now AND (claimed_at IS NULL OR claimed_at < now - claim_timeout)`
/// (§4.9 `pending`). Read-only.
pub fn pending_intents(
    conn: &Connection,
    user_id: Option<&str>,
    now: &str,
    claim_cutoff: &str,
    limit: usize,
) -> Result<Vec<ScheduledIntentRow>, StoreError> {
    let sql = "SELECT id, user_id, trigger_kind, trigger_config, action, enabled, next_check,
                      claimed_at, last_checked, last_executed, last_condition_fire,
                      execution_count, max_executions, expires_at, created_at
               FROM scheduled_intents
               WHERE enabled = 1
                 AND next_check IS NOT NULL AND next_check <= ?1
                 AND (claimed_at IS NULL OR claimed_at < ?2)
                 AND (?3 IS NULL OR user_id = ?3)
               ORDER BY next_check
               LIMIT ?4";
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![now, claim_cutoff, user_id, limit as i64], row_to_intent)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// `BEGIN IMMEDIATE`-guarded claim: SQLite has no `SELECT ... FOR UPDATE
/// SKIP LOCKED`, so a single-winner claim is achieved with an immediate
/// write transaction plus the `claimed_at` guard column (documented
/// substitution — see the project notes).
pub fn claim_intent(
    conn: &mut Connection,
    id: &str,
    now: &str,
    claim_cutoff: &str,
) -> Result<Option<ScheduledIntentRow>, StoreError> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    let existing: Option<(bool, Option<String>)> = tx
        .query_row(
            "SELECT enabled, claimed_at FROM scheduled_intents WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((enabled, claimed_at)) = existing else {
        return Ok(None);
    };

    let already_claimed = claimed_at
        .as_deref()
        .map(|c| c >= claim_cutoff)
        .unwrap_or(false);

    if !enabled || already_claimed {
        tx.commit()?;
        return Ok(None);
    }

    tx.execute(
        "UPDATE scheduled_intents SET claimed_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;

    let intent = tx
        .query_row(
            "SELECT id, user_id, trigger_kind, trigger_config, action, enabled, next_check,
                    claimed_at, last_checked, last_executed, last_condition_fire,
                    execution_count, max_executions, expires_at, created_at
             FROM scheduled_intents WHERE id = ?1",
            params![id],
            row_to_intent,
        )
        .optional()?;

    tx.commit()?;
    Ok(intent)
}

pub fn insert_execution(conn: &Connection, exec: &IntentExecution) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO intent_executions
            (intent_id, started_at, finished_at, result, gate_result, detail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            exec.intent_id,
            exec.started_at,
            exec.finished_at,
            exec.result,
            exec.gate_result,
            exec.detail,
        ],
    )?;
    Ok(())
}

pub fn intent_history(
    conn: &Connection,
    intent_id: &str,
    limit: usize,
) -> Result<Vec<IntentExecution>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, intent_id, started_at, finished_at, result, gate_result, detail
         FROM intent_executions WHERE intent_id = ?1 ORDER BY started_at DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![intent_id, limit as i64], |row| {
        Ok(IntentExecution {
            id: row.get(0)?,
            intent_id: row.get(1)?,
            started_at: row.get(2)?,
            finished_at: row.get(3)?,
            result: row.get(4)?,
            gate_result: row.get(5)?,
            detail: row.get(6)?,
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn row_to_intent(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledIntentRow> {
    let trigger_config_str: String = row.get(3)?;
    let action_str: String = row.get(4)?;
    Ok(ScheduledIntentRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        trigger_kind: row.get(2)?,
        trigger_config: serde_json::from_str(&trigger_config_str).unwrap_or(serde_json::json!({})),
        action: serde_json::from_str(&action_str).unwrap_or(serde_json::json!({})),
        enabled: row.get(5)?,
        next_check: row.get(6)?,
        claimed_at: row.get(7)?,
        last_checked: row.get(8)?,
        last_executed: row.get(9)?,
        last_condition_fire: row.get(10)?,
        execution_count: row.get(11)?,
        max_executions: row.get(12)?,
        expires_at: row.get(13)?,
        created_at: row.get(14)?,
    })
}

// ---- hook consents (C13 storage) ----

pub fn set_hook_consent(conn: &Connection, consent: &HookConsent) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO hook_consents (user_id, hook_kind, granted, granted_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id, hook_kind) DO UPDATE SET
            granted = excluded.granted, granted_at = excluded.granted_at",
        params![consent.user_id, consent.hook_kind, consent.granted, consent.granted_at],
    )?;
    Ok(())
}

pub fn get_hook_consent(
    conn: &Connection,
    user_id: &str,
    hook_kind: &str,
) -> Result<Option<HookConsent>, StoreError> {
    conn.query_row(
        "SELECT user_id, hook_kind, granted, granted_at FROM hook_consents
         WHERE user_id = ?1 AND hook_kind = ?2",
        params![user_id, hook_kind],
        |row| {
            Ok(HookConsent {
                user_id: row.get(0)?,
                hook_kind: row.get(1)?,
                granted: row.get(2)?,
                granted_at: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(StoreError::from)
}

// ---- hook event dedup (C13 storage) ----

/// Records a source-message-id as seen. Returns `true` if this call is the
/// one that actually inserted the row (i.e. the event is new) and `false`
/// if it was already present — a redelivered webhook or re-polled item.
pub fn record_hook_event_seen(
    conn: &Connection,
    user_id: &str,
    hook_kind: &str,
    source_message_id: &str,
    seen_at: &str,
) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO hook_events_seen (user_id, hook_kind, source_message_id, seen_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, hook_kind, source_message_id, seen_at],
    )?;
    Ok(inserted > 0)
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
    fn claim_intent_is_single_winner() {
        let mut conn = test_conn();
        let now = memoria_core::now_iso();
        let intent = ScheduledIntentRow {
            id: "intent_1".to_string(),
            user_id: "u1".to_string(),
            trigger_kind: "interval".to_string(),
            trigger_config: serde_json::json!({"interval_minutes": 30}),
            action: serde_json::json!({}),
            enabled: true,
            next_check: Some(now.clone()),
            claimed_at: None,
            last_checked: None,
            last_executed: None,
            last_condition_fire: None,
            execution_count: 0,
            max_executions: None,
            expires_at: None,
            created_at: now.clone(),
        };
        insert_intent(&conn, &intent).unwrap();

        let cutoff = "0000-01-01T00:00:00Z";
        let first = claim_intent(&mut conn, "intent_1", &now, cutoff).unwrap();
        assert!(first.is_some());

        let second = claim_intent(&mut conn, "intent_1", &now, cutoff).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn skill_progression_logged_on_level_change() {
        let conn = test_conn();
        let mut row = ProceduralRow {
            id: "skill_1".to_string(),
            user_id: "u1".to_string(),
            skill_name: "rust".to_string(),
            proficiency_level: ProficiencyLevel::Beginner,
            prerequisites: vec![],
            practice_count: 1,
            success_rate: 0.5,
            last_practiced: None,
        };
        upsert_procedural(&conn, &row).unwrap();
        row.proficiency_level = ProficiencyLevel::Intermediate;
        upsert_procedural(&conn, &row).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM skill_progressions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn hook_event_dedup_only_accepts_once() {
        let conn = test_conn();
        let now = memoria_core::now_iso();
        let first = record_hook_event_seen(&conn, "u1", "email", "msg-1", &now).unwrap();
        assert!(first);
        let second = record_hook_event_seen(&conn, "u1", "email", "msg-1", &now).unwrap();
        assert!(!second);
        let other_user = record_hook_event_seen(&conn, "u2", "email", "msg-1", &now).unwrap();
        assert!(other_user);
    }
}
