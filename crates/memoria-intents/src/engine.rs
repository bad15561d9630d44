use std::sync::Arc;

use chrono::{Duration, Utc};
use memoria_core::new_intent_id;
use memoria_stores::types::{IntentExecution, ScheduledIntentRow};
use memoria_stores::Stores;
use tracing::info;

use crate::error::{IntentsError, Result};
use crate::schedule::{initial_next_check, next_check_after_fire, validate_trigger};
use crate::types::{
    cooldown_hours, CreateIntentRequest, FireResult, PendingIntent, TriggerKind, CLAIM_TIMEOUT_MINUTES,
    MAX_ACTIVE_INTENTS,
};

/// Scheduled-intent engine (C12, §4.9): create/list/get/update/delete the
/// persisted intents and drive the `pending -> claim -> fire` worker
/// contract. Holds no state of its own beyond the shared `Stores` handle —
/// every method is a thin, validated wrapper over `memoria_stores::relational`.
pub struct IntentsEngine {
    stores: Arc<Stores>,
}

impl IntentsEngine {
    pub fn new(stores: Arc<Stores>) -> Self {
        Self { stores }
    }

    pub async fn create(&self, req: CreateIntentRequest) -> Result<ScheduledIntentRow> {
        validate_trigger(req.trigger_kind, &req.trigger_config)?;

        let stores = Arc::clone(&self.stores);
        let user_id = req.user_id.clone();
        let active = tokio::task::spawn_blocking(move || {
            stores.with_conn(|conn| memoria_stores::relational::count_active_intents(conn, &user_id))
        })
        .await
        .map_err(|e| IntentsError::NotFound(e.to_string()))??;
        if active >= MAX_ACTIVE_INTENTS {
            return Err(IntentsError::LimitExceeded(active));
        }

        let now = memoria_core::now_iso();
        let next_check = initial_next_check(req.trigger_kind, &req.trigger_config)?.to_rfc3339();
        let row = ScheduledIntentRow {
            id: new_intent_id(),
            user_id: req.user_id,
            trigger_kind: req.trigger_kind.as_str().to_string(),
            trigger_config: req.trigger_config,
            action: req.action,
            enabled: true,
            next_check: Some(next_check),
            claimed_at: None,
            last_checked: None,
            last_executed: None,
            last_condition_fire: None,
            execution_count: 0,
            max_executions: req.max_executions,
            expires_at: req.expires_at,
            created_at: now,
        };

        let stores = Arc::clone(&self.stores);
        let to_insert = row.clone();
        tokio::task::spawn_blocking(move || {
            stores.with_conn(|conn| memoria_stores::relational::insert_intent(conn, &to_insert))
        })
        .await
        .map_err(|e| IntentsError::NotFound(e.to_string()))??;

        info!(intent_id = %row.id, trigger = %row.trigger_kind, "scheduled intent created");
        Ok(row)
    }

    pub async fn list(&self, user_id: String) -> Result<Vec<ScheduledIntentRow>> {
        let stores = Arc::clone(&self.stores);
        let rows = tokio::task::spawn_blocking(move || {
            stores.with_conn(|conn| memoria_stores::relational::list_intents(conn, &user_id))
        })
        .await
        .map_err(|e| IntentsError::NotFound(e.to_string()))??;
        Ok(rows)
    }

    pub async fn get(&self, id: String) -> Result<ScheduledIntentRow> {
        let stores = Arc::clone(&self.stores);
        let id_for_err = id.clone();
        let row = tokio::task::spawn_blocking(move || {
            stores.with_conn(|conn| memoria_stores::relational::get_intent(conn, &id))
        })
        .await
        .map_err(|e| IntentsError::NotFound(e.to_string()))??;
        row.ok_or(IntentsError::NotFound(id_for_err))
    }

    pub async fn update(&self, intent: ScheduledIntentRow) -> Result<()> {
        let stores = Arc::clone(&self.stores);
        tokio::task::spawn_blocking(move || {
            stores.with_conn(|conn| memoria_stores::relational::update_intent(conn, &intent))
        })
        .await
        .map_err(|e| IntentsError::NotFound(e.to_string()))??;
        Ok(())
    }

    pub async fn delete(&self, id: String, user_id: String) -> Result<()> {
        let stores = Arc::clone(&self.stores);
        let id_for_err = id.clone();
        let deleted = tokio::task::spawn_blocking(move || {
            stores.with_conn(|conn| memoria_stores::relational::delete_intent(conn, &id, &user_id))
        })
        .await
        .map_err(|e| IntentsError::NotFound(e.to_string()))??;
        if !deleted {
            return Err(IntentsError::NotFound(id_for_err));
        }
        Ok(())
    }

    /// `pending()` (§4.9): read-only, excludes claimed-and-not-timed-out
    /// rows and anything still inside its own cooldown window.
    pub async fn pending(&self, user_id: Option<String>, limit: usize) -> Result<Vec<PendingIntent>> {
        let stores = Arc::clone(&self.stores);
        let now = memoria_core::now_iso();
        let claim_cutoff = (Utc::now() - Duration::minutes(CLAIM_TIMEOUT_MINUTES)).to_rfc3339();
        let rows = tokio::task::spawn_blocking(move || {
            stores.with_conn(|conn| {
                memoria_stores::relational::pending_intents(
                    conn,
                    user_id.as_deref(),
                    &now,
                    &claim_cutoff,
                    limit,
                )
            })
        })
        .await
        .map_err(|e| IntentsError::NotFound(e.to_string()))??;

        let now = Utc::now();
        let survivors = rows
            .into_iter()
            .filter(|row| !is_in_cooldown(row, now))
            .map(|intent| PendingIntent { intent, in_cooldown: false })
            .collect();
        Ok(survivors)
    }

    /// `claim()` (§4.9): `BEGIN IMMEDIATE` transaction under the hood.
    /// `Ok(None)` distinguishes "missing" from "already claimed" so the
    /// server layer can map to 404 vs 409.
    pub async fn claim(&self, id: String) -> Result<ScheduledIntentRow> {
        let stores = Arc::clone(&self.stores);
        let id_for_err = id.clone();
        let now = memoria_core::now_iso();
        let claim_cutoff = (Utc::now() - Duration::minutes(CLAIM_TIMEOUT_MINUTES)).to_rfc3339();

        let existing = self.get(id.clone()).await;
        let claimed = tokio::task::spawn_blocking(move || {
            stores.with_conn_mut(|conn| memoria_stores::relational::claim_intent(conn, &id, &now, &claim_cutoff))
        })
        .await
        .map_err(|e| IntentsError::NotFound(e.to_string()))??;

        match claimed {
            Some(row) => Ok(row),
            None => match existing {
                Ok(_) => Err(IntentsError::AlreadyClaimed(id_for_err)),
                Err(_) => Err(IntentsError::NotFound(id_for_err)),
            },
        }
    }

    /// `fire()` (§4.9): always clears `claimed_at`, always appends an
    /// `intent_executions` row, always bumps `last_checked`. On success,
    /// also bumps `last_executed`/`execution_count` and `last_condition_fire`.
    pub async fn fire(
        &self,
        id: String,
        result: FireResult,
        gate_result: Option<String>,
        detail: Option<String>,
    ) -> Result<ScheduledIntentRow> {
        let mut row = self.get(id.clone()).await?;

        let kind = TriggerKind::parse(&row.trigger_kind)
            .ok_or_else(|| IntentsError::InvalidTrigger(row.trigger_kind.clone()))?;
        let now = Utc::now();
        let now_iso = now.to_rfc3339();

        let started_at = row.claimed_at.clone().unwrap_or_else(|| row.last_checked.clone().unwrap_or_else(|| now_iso.clone()));

        row.last_checked = Some(now_iso.clone());
        row.claimed_at = None;
        if !matches!(result, FireResult::ConditionNotMet) {
            row.last_condition_fire = Some(now_iso.clone());
        }
        if matches!(result, FireResult::Success) {
            row.last_executed = Some(now_iso.clone());
            row.execution_count += 1;
        }

        row.next_check = next_check_after_fire(kind, &row.trigger_config, result, now)?
            .map(|dt| dt.to_rfc3339());

        let max_reached = row.max_executions.is_some_and(|max| row.execution_count >= max);
        let expired = row
            .expires_at
            .as_deref()
            .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
            .is_some_and(|ts| now >= ts);
        if max_reached || expired || row.next_check.is_none() {
            row.enabled = false;
            row.next_check = None;
        }

        let execution = IntentExecution {
            id: 0,
            intent_id: row.id.clone(),
            started_at,
            finished_at: now_iso,
            result: result.as_str().to_string(),
            gate_result,
            detail,
        };

        let stores = Arc::clone(&self.stores);
        let to_update = row.clone();
        tokio::task::spawn_blocking(move || {
            stores.with_conn(|conn| {
                memoria_stores::relational::update_intent(conn, &to_update)?;
                memoria_stores::relational::insert_execution(conn, &execution)
            })
        })
        .await
        .map_err(|e| IntentsError::NotFound(e.to_string()))??;

        info!(intent_id = %row.id, result = result.as_str(), "scheduled intent fired");
        Ok(row)
    }

    pub async fn history(&self, intent_id: String, limit: usize) -> Result<Vec<IntentExecution>> {
        let stores = Arc::clone(&self.stores);
        let rows = tokio::task::spawn_blocking(move || {
            stores.with_conn(|conn| memoria_stores::relational::intent_history(conn, &intent_id, limit))
        })
        .await
        .map_err(|e| IntentsError::NotFound(e.to_string()))??;
        Ok(rows)
    }
}

fn is_in_cooldown(row: &ScheduledIntentRow, now: chrono::DateTime<Utc>) -> bool {
    let hours = cooldown_hours(&row.trigger_config);
    if hours <= 0.0 {
        return false;
    }
    row.last_condition_fire
        .as_deref()
        .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
        .is_some_and(|last| now - last.with_timezone(&Utc) < Duration::minutes((hours * 60.0) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> IntentsEngine {
        IntentsEngine::new(Arc::new(Stores::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn create_rejects_interval_below_minimum() {
        let engine = engine();
        let req = CreateIntentRequest {
            user_id: "u1".to_string(),
            trigger_kind: TriggerKind::Interval,
            trigger_config: serde_json::json!({ "interval_minutes": 1 }),
            action: serde_json::json!({}),
            max_executions: None,
            expires_at: None,
        };
        assert!(engine.create(req).await.is_err());
    }

    #[tokio::test]
    async fn create_enforces_active_cap() {
        let engine = engine();
        for _ in 0..25 {
            let req = CreateIntentRequest {
                user_id: "u1".to_string(),
                trigger_kind: TriggerKind::Interval,
                trigger_config: serde_json::json!({ "interval_minutes": 30 }),
                action: serde_json::json!({}),
                max_executions: None,
                expires_at: None,
            };
            engine.create(req).await.unwrap();
        }
        let req = CreateIntentRequest {
            user_id: "u1".to_string(),
            trigger_kind: TriggerKind::Interval,
            trigger_config: serde_json::json!({ "interval_minutes": 30 }),
            action: serde_json::json!({}),
            max_executions: None,
            expires_at: None,
        };
        assert!(matches!(engine.create(req).await, Err(IntentsError::LimitExceeded(25))));
    }

    #[tokio::test]
    async fn claim_then_claim_again_conflicts() {
        let engine = engine();
        let req = CreateIntentRequest {
            user_id: "u1".to_string(),
            trigger_kind: TriggerKind::Interval,
            trigger_config: serde_json::json!({ "interval_minutes": 30 }),
            action: serde_json::json!({}),
            max_executions: None,
            expires_at: None,
        };
        let row = engine.create(req).await.unwrap();
        let mut to_ready = row.clone();
        to_ready.next_check = Some(memoria_core::now_iso());
        engine.update(to_ready).await.unwrap();

        engine.claim(row.id.clone()).await.unwrap();
        let second = engine.claim(row.id.clone()).await;
        assert!(matches!(second, Err(IntentsError::AlreadyClaimed(_))));
    }

    #[tokio::test]
    async fn claim_missing_is_not_found() {
        let engine = engine();
        let result = engine.claim("does-not-exist".to_string()).await;
        assert!(matches!(result, Err(IntentsError::NotFound(_))));
    }

    #[tokio::test]
    async fn fire_once_success_disables_intent() {
        let engine = engine();
        let req = CreateIntentRequest {
            user_id: "u1".to_string(),
            trigger_kind: TriggerKind::Once,
            trigger_config: serde_json::json!({ "at": (Utc::now() + Duration::minutes(1)).to_rfc3339() }),
            action: serde_json::json!({}),
            max_executions: None,
            expires_at: None,
        };
        let row = engine.create(req).await.unwrap();
        let fired = engine.fire(row.id, FireResult::Success, None, None).await.unwrap();
        assert!(!fired.enabled);
        assert!(fired.next_check.is_none());
        assert_eq!(fired.execution_count, 1);
    }

    #[tokio::test]
    async fn fire_max_executions_reached_disables() {
        let engine = engine();
        let req = CreateIntentRequest {
            user_id: "u1".to_string(),
            trigger_kind: TriggerKind::Interval,
            trigger_config: serde_json::json!({ "interval_minutes": 30 }),
            action: serde_json::json!({}),
            max_executions: Some(1),
            expires_at: None,
        };
        let row = engine.create(req).await.unwrap();
        let fired = engine.fire(row.id, FireResult::Success, None, None).await.unwrap();
        assert!(!fired.enabled);
        assert_eq!(fired.execution_count, 1);
    }

    #[tokio::test]
    async fn history_records_every_fire() {
        let engine = engine();
        let req = CreateIntentRequest {
            user_id: "u1".to_string(),
            trigger_kind: TriggerKind::Interval,
            trigger_config: serde_json::json!({ "interval_minutes": 30 }),
            action: serde_json::json!({}),
            max_executions: None,
            expires_at: None,
        };
        let row = engine.create(req).await.unwrap();
        engine.fire(row.id.clone(), FireResult::ConditionNotMet, None, None).await.unwrap();
        engine.fire(row.id.clone(), FireResult::Success, None, None).await.unwrap();
        let history = engine.history(row.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
    }
}
