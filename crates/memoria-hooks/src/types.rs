use serde::{Deserialize, Serialize};

/// Connector families under hook ingress (§4.10). Matches
/// `memoria_stores::types::HookConsent::hook_kind` string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    Email,
    Calendar,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Email => "email",
            HookKind::Calendar => "calendar",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(HookKind::Email),
            "calendar" => Some(HookKind::Calendar),
            _ => None,
        }
    }
}

/// One item as a connector (webhook body or poll page) hands it to us,
/// before normalization or dedup.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    /// Stable id from the source system — the dedup key.
    pub source_message_id: String,
    pub occurred_at: String,
    pub payload: serde_json::Value,
}

/// What a raw event becomes once accepted: transcript-shaped text ready
/// for C8, never bypassing its extraction rules (§4.10).
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub user_id: String,
    pub hook_kind: HookKind,
    pub source_message_id: String,
    pub channel: String,
    pub transcript: String,
}
