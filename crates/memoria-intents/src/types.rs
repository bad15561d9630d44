use serde::{Deserialize, Serialize};

pub use memoria_stores::types::{IntentExecution, ScheduledIntentRow};

/// Caps and minimums enforced at `create` (§4.9).
pub const MAX_ACTIVE_INTENTS: i64 = 25;
pub const CRON_MIN_INTERVAL_SECS: i64 = 60;
pub const CRON_MAX_FIRES_PER_DAY: usize = 96;
pub const MIN_INTERVAL_MINUTES: i64 = 5;
pub const CLAIM_TIMEOUT_MINUTES: i64 = 5;

/// Trigger kinds a scheduled intent can fire on (§4.9). Stored as the
/// lower-case form in `ScheduledIntentRow::trigger_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Cron,
    Interval,
    Once,
    Price,
    Event,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Cron => "cron",
            TriggerKind::Interval => "interval",
            TriggerKind::Once => "once",
            TriggerKind::Price => "price",
            TriggerKind::Event => "event",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cron" => Some(TriggerKind::Cron),
            "interval" => Some(TriggerKind::Interval),
            "once" => Some(TriggerKind::Once),
            "price" => Some(TriggerKind::Price),
            "event" => Some(TriggerKind::Event),
            _ => None,
        }
    }
}

/// Outcome a worker reports back via `fire()` (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireResult {
    Success,
    ConditionNotMet,
    GateBlocked,
    Failed,
}

impl FireResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            FireResult::Success => "success",
            FireResult::ConditionNotMet => "condition_not_met",
            FireResult::GateBlocked => "gate_blocked",
            FireResult::Failed => "failed",
        }
    }
}

/// A row from `pending()`, annotated with whether it's still inside its own
/// cooldown window. The predicate already excludes cooled-down rows, so a
/// survivor always carries `in_cooldown: false`; the field stays on the wire
/// for callers relying on its presence rather than its absence.
#[derive(Debug, Clone, Serialize)]
pub struct PendingIntent {
    #[serde(flatten)]
    pub intent: ScheduledIntentRow,
    pub in_cooldown: bool,
}

/// Request body for `create()`.
#[derive(Debug, Clone)]
pub struct CreateIntentRequest {
    pub user_id: String,
    pub trigger_kind: TriggerKind,
    pub trigger_config: serde_json::Value,
    pub action: serde_json::Value,
    pub max_executions: Option<i64>,
    pub expires_at: Option<String>,
}

pub(crate) fn cooldown_hours(trigger_config: &serde_json::Value) -> f64 {
    trigger_config
        .get("cooldown_hours")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
}
