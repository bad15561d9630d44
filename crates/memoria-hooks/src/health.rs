//! Hook connector health — passive monitoring based on real poll/webhook
//! outcomes, mirroring the reference stack's `HealthTracker` for LLM
//! providers but tracking connectors instead (§4.10, supplemented feature:
//! surfaced through `GET /health/full`).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

const WINDOW_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Ok,
    Degraded,
    Down,
    Unknown,
}

impl std::fmt::Display for HookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HookStatus::Ok => "ok",
            HookStatus::Degraded => "degraded",
            HookStatus::Down => "down",
            HookStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HookHealthEntry {
    pub connector: String,
    pub status: HookStatus,
    pub last_success_at: Option<i64>,
    pub last_error_at: Option<i64>,
    pub last_error: Option<String>,
    pub requests_ok: u32,
    pub requests_err: u32,
    pub total_events: u64,
}

struct InternalEntry {
    window: VecDeque<(Instant, bool)>,
    last_success_at: Option<i64>,
    last_error_at: Option<i64>,
    last_error: Option<String>,
    total_events: u64,
}

impl InternalEntry {
    fn new() -> Self {
        Self {
            window: VecDeque::new(),
            last_success_at: None,
            last_error_at: None,
            last_error: None,
            total_events: 0,
        }
    }

    fn prune(&mut self) {
        let cutoff = Instant::now() - std::time::Duration::from_secs(WINDOW_SECS);
        while self.window.front().is_some_and(|(t, _)| *t < cutoff) {
            self.window.pop_front();
        }
    }

    fn derive_status(&self) -> HookStatus {
        if self.window.is_empty() {
            return HookStatus::Unknown;
        }
        let total = self.window.len() as f64;
        let ok = self.window.iter().filter(|(_, ok)| *ok).count() as f64;
        let rate = ok / total;
        if rate > 0.8 {
            HookStatus::Ok
        } else if rate >= 0.5 {
            HookStatus::Degraded
        } else {
            HookStatus::Down
        }
    }

    fn to_entry(&self, connector: &str) -> HookHealthEntry {
        HookHealthEntry {
            connector: connector.to_string(),
            status: self.derive_status(),
            last_success_at: self.last_success_at,
            last_error_at: self.last_error_at,
            last_error: self.last_error.clone(),
            requests_ok: self.window.iter().filter(|(_, ok)| *ok).count() as u32,
            requests_err: self.window.iter().filter(|(_, ok)| !*ok).count() as u32,
            total_events: self.total_events,
        }
    }
}

/// Concurrent tracker, one entry per connector (e.g. `"email:poll"`,
/// `"calendar:webhook"`).
pub struct HookHealthTracker {
    entries: DashMap<String, InternalEntry>,
}

impl HookHealthTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { entries: DashMap::new() })
    }

    pub fn record_success(&self, connector: &str) {
        let mut entry = self.entries.entry(connector.to_string()).or_insert_with(InternalEntry::new);
        entry.prune();
        entry.window.push_back((Instant::now(), true));
        entry.last_success_at = Some(chrono::Utc::now().timestamp());
        entry.total_events += 1;
    }

    pub fn record_error(&self, connector: &str, error: &str) {
        let mut entry = self.entries.entry(connector.to_string()).or_insert_with(InternalEntry::new);
        entry.prune();
        entry.window.push_back((Instant::now(), false));
        entry.last_error_at = Some(chrono::Utc::now().timestamp());
        entry.last_error = Some(error.to_string());
        entry.total_events += 1;
    }

    pub fn all_entries(&self) -> Vec<HookHealthEntry> {
        self.entries.iter().map(|e| e.value().to_entry(e.key())).collect()
    }
}

impl Default for HookHealthTracker {
    fn default() -> Self {
        Self { entries: DashMap::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successes_derive_ok_status() {
        let tracker = HookHealthTracker::new();
        for _ in 0..5 {
            tracker.record_success("email:poll");
        }
        let entries = tracker.all_entries();
        assert_eq!(entries[0].status, HookStatus::Ok);
        assert_eq!(entries[0].requests_ok, 5);
    }

    #[test]
    fn mixed_outcomes_derive_degraded() {
        let tracker = HookHealthTracker::new();
        for _ in 0..6 {
            tracker.record_success("calendar:webhook");
        }
        for _ in 0..4 {
            tracker.record_error("calendar:webhook", "timeout");
        }
        let entries = tracker.all_entries();
        assert_eq!(entries[0].status, HookStatus::Degraded);
    }
}
