use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule as CronSchedule;

use crate::error::{IntentsError, Result};
use crate::types::{
    FireResult, TriggerKind, CRON_MAX_FIRES_PER_DAY, CRON_MIN_INTERVAL_SECS, MIN_INTERVAL_MINUTES,
};

/// Validates `trigger_config` against the caps from §4.9 for the given kind.
/// Called once at `create`, before the row is ever persisted.
pub fn validate_trigger(
    kind: TriggerKind,
    trigger_config: &serde_json::Value,
) -> Result<()> {
    match kind {
        TriggerKind::Cron => {
            let expr = cron_expression(trigger_config)?;
            let schedule = parse_cron(expr)?;

            let now = Utc::now();
            let window_end = now + Duration::days(1);
            let occurrences: Vec<DateTime<Utc>> = schedule
                .after(&now)
                .take_while(|dt| *dt <= window_end)
                .take(CRON_MAX_FIRES_PER_DAY + 1)
                .collect();

            if occurrences.len() > CRON_MAX_FIRES_PER_DAY {
                return Err(IntentsError::InvalidTrigger(format!(
                    "cron schedule fires more than {CRON_MAX_FIRES_PER_DAY} times per day"
                )));
            }
            if let Some(gap) = occurrences
                .windows(2)
                .map(|w| (w[1] - w[0]).num_seconds())
                .min()
            {
                if gap < CRON_MIN_INTERVAL_SECS {
                    return Err(IntentsError::InvalidTrigger(format!(
                        "cron schedule interval below {CRON_MIN_INTERVAL_SECS}s minimum"
                    )));
                }
            }
            Ok(())
        }
        TriggerKind::Interval => {
            let minutes = interval_minutes(trigger_config)?;
            if minutes < MIN_INTERVAL_MINUTES {
                return Err(IntentsError::InvalidTrigger(format!(
                    "interval must be at least {MIN_INTERVAL_MINUTES} minutes"
                )));
            }
            Ok(())
        }
        TriggerKind::Once => {
            let at = once_at(trigger_config)?;
            if at <= Utc::now() {
                return Err(IntentsError::InvalidTrigger(
                    "once trigger must be scheduled in the future".to_string(),
                ));
            }
            Ok(())
        }
        TriggerKind::Price | TriggerKind::Event => {
            let minutes = check_interval_minutes(trigger_config)?;
            if minutes < MIN_INTERVAL_MINUTES {
                return Err(IntentsError::InvalidTrigger(format!(
                    "check interval must be at least {MIN_INTERVAL_MINUTES} minutes"
                )));
            }
            Ok(())
        }
    }
}

/// Initial `next_check` for a freshly created intent.
pub fn initial_next_check(
    kind: TriggerKind,
    trigger_config: &serde_json::Value,
) -> Result<DateTime<Utc>> {
    let now = Utc::now();
    match kind {
        TriggerKind::Cron => next_cron_fire(trigger_config, now),
        TriggerKind::Interval => Ok(now + Duration::minutes(interval_minutes(trigger_config)?)),
        TriggerKind::Once => once_at(trigger_config),
        TriggerKind::Price | TriggerKind::Event => {
            Ok(now + Duration::minutes(check_interval_minutes(trigger_config)?))
        }
    }
}

/// The `fire()` next_check table (§4.9): trigger kind x result determines
/// how soon the intent becomes pending again, or `None` to disable it.
pub fn next_check_after_fire(
    kind: TriggerKind,
    trigger_config: &serde_json::Value,
    result: FireResult,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    match result {
        FireResult::ConditionNotMet | FireResult::GateBlocked => {
            Ok(Some(now + Duration::minutes(5)))
        }
        FireResult::Failed => Ok(Some(now + Duration::minutes(15))),
        FireResult::Success => match kind {
            TriggerKind::Cron => Ok(Some(next_cron_fire(trigger_config, now)?)),
            TriggerKind::Interval => Ok(Some(now + Duration::minutes(interval_minutes(trigger_config)?))),
            TriggerKind::Once => Ok(None),
            TriggerKind::Price | TriggerKind::Event => {
                Ok(Some(now + Duration::minutes(check_interval_minutes(trigger_config)?)))
            }
        },
    }
}

fn next_cron_fire(trigger_config: &serde_json::Value, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let expr = cron_expression(trigger_config)?;
    let schedule = parse_cron(expr)?;
    schedule
        .after(&from)
        .next()
        .ok_or_else(|| IntentsError::InvalidTrigger("cron schedule has no future occurrence".to_string()))
}

/// `cron` requires a seconds-leading 6/7-field expression; `trigger_config`
/// accepts the standard 5-field form (minute-leading) too, since that's
/// what callers write by habit. A 5-field expression gets `"0 "` prepended
/// before parsing so `"0 9 * * 1"` (every Monday at 09:00) is accepted as-is.
fn parse_cron(expr: &str) -> Result<CronSchedule> {
    let normalized = match expr.split_whitespace().count() {
        5 => format!("0 {expr}"),
        _ => expr.to_string(),
    };
    CronSchedule::from_str(&normalized)
        .map_err(|e| IntentsError::InvalidTrigger(format!("bad cron expression: {e}")))
}

fn cron_expression(trigger_config: &serde_json::Value) -> Result<&str> {
    trigger_config
        .get("expression")
        .and_then(|v| v.as_str())
        .ok_or_else(|| IntentsError::InvalidTrigger("missing trigger_config.expression".to_string()))
}

fn interval_minutes(trigger_config: &serde_json::Value) -> Result<i64> {
    trigger_config
        .get("interval_minutes")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| IntentsError::InvalidTrigger("missing trigger_config.interval_minutes".to_string()))
}

fn check_interval_minutes(trigger_config: &serde_json::Value) -> Result<i64> {
    trigger_config
        .get("check_interval_minutes")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| {
            IntentsError::InvalidTrigger("missing trigger_config.check_interval_minutes".to_string())
        })
}

fn once_at(trigger_config: &serde_json::Value) -> Result<DateTime<Utc>> {
    let raw = trigger_config
        .get("at")
        .and_then(|v| v.as_str())
        .ok_or_else(|| IntentsError::InvalidTrigger("missing trigger_config.at".to_string()))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| IntentsError::InvalidTrigger(format!("bad trigger_config.at: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_cron_faster_than_60s() {
        let cfg = serde_json::json!({ "expression": "* * * * * *" });
        assert!(validate_trigger(TriggerKind::Cron, &cfg).is_err());
    }

    #[test]
    fn accepts_hourly_cron() {
        let cfg = serde_json::json!({ "expression": "0 0 * * * *" });
        assert!(validate_trigger(TriggerKind::Cron, &cfg).is_ok());
    }

    #[test]
    fn accepts_standard_five_field_cron() {
        let cfg = serde_json::json!({ "expression": "0 9 * * 1" });
        assert!(validate_trigger(TriggerKind::Cron, &cfg).is_ok());
    }

    #[test]
    fn rejects_interval_under_five_minutes() {
        let cfg = serde_json::json!({ "interval_minutes": 1 });
        assert!(validate_trigger(TriggerKind::Interval, &cfg).is_err());
    }

    #[test]
    fn rejects_once_in_the_past() {
        let cfg = serde_json::json!({ "at": "2000-01-01T00:00:00Z" });
        assert!(validate_trigger(TriggerKind::Once, &cfg).is_err());
    }

    #[test]
    fn fire_table_success_once_disables() {
        let cfg = serde_json::json!({ "at": "2099-01-01T00:00:00Z" });
        let next = next_check_after_fire(TriggerKind::Once, &cfg, FireResult::Success, Utc::now()).unwrap();
        assert!(next.is_none());
    }

    #[test]
    fn fire_table_condition_not_met_retries_in_five_minutes() {
        let cfg = serde_json::json!({ "interval_minutes": 30 });
        let now = Utc::now();
        let next = next_check_after_fire(TriggerKind::Interval, &cfg, FireResult::ConditionNotMet, now)
            .unwrap()
            .unwrap();
        assert_eq!((next - now).num_minutes(), 5);
    }

    #[test]
    fn fire_table_failed_retries_in_fifteen_minutes() {
        let cfg = serde_json::json!({ "interval_minutes": 30 });
        let now = Utc::now();
        let next = next_check_after_fire(TriggerKind::Interval, &cfg, FireResult::Failed, now)
            .unwrap()
            .unwrap();
        assert_eq!((next - now).num_minutes(), 15);
    }
}
