use crate::error::{HookError, Result};
use crate::types::{HookKind, NormalizedEvent, RawEvent};

/// Turns a raw connector event into the transcript-shaped text C8 expects.
/// Nothing here extracts memories itself — that stays C8's job (§4.10
/// "nothing bypasses C8's extraction rules").
pub fn normalize(user_id: &str, hook_kind: HookKind, channel: &str, raw: &RawEvent) -> Result<NormalizedEvent> {
    let transcript = match hook_kind {
        HookKind::Email => normalize_email(&raw.payload)?,
        HookKind::Calendar => normalize_calendar(&raw.payload)?,
    };

    Ok(NormalizedEvent {
        user_id: user_id.to_string(),
        hook_kind,
        source_message_id: raw.source_message_id.clone(),
        channel: channel.to_string(),
        transcript,
    })
}

fn normalize_email(payload: &serde_json::Value) -> Result<String> {
    let from = field_str(payload, "from")?;
    let subject = payload.get("subject").and_then(|v| v.as_str()).unwrap_or("(no subject)");
    let body = field_str(payload, "body")?;
    Ok(format!("[email from {from}] subject: {subject}\n{body}"))
}

fn normalize_calendar(payload: &serde_json::Value) -> Result<String> {
    let title = field_str(payload, "title")?;
    let start = field_str(payload, "start")?;
    let attendees = payload
        .get("attendees")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>().join(", "))
        .unwrap_or_default();
    Ok(format!("[calendar event] {title} at {start} with {attendees}"))
}

fn field_str<'a>(payload: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HookError::InvalidPayload(format!("missing field: {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_email_payload() {
        let raw = RawEvent {
            source_message_id: "msg-1".to_string(),
            occurred_at: "2026-01-01T00:00:00Z".to_string(),
            payload: serde_json::json!({
                "from": "alice@example.com",
                "subject": "Lunch?",
                "body": "Want to grab lunch Friday?",
            }),
        };
        let event = normalize("u1", HookKind::Email, "gmail", &raw).unwrap();
        assert!(event.transcript.contains("alice@example.com"));
        assert!(event.transcript.contains("Lunch?"));
    }

    #[test]
    fn rejects_email_missing_body() {
        let raw = RawEvent {
            source_message_id: "msg-1".to_string(),
            occurred_at: "2026-01-01T00:00:00Z".to_string(),
            payload: serde_json::json!({ "from": "alice@example.com" }),
        };
        assert!(normalize("u1", HookKind::Email, "gmail", &raw).is_err());
    }

    #[test]
    fn normalizes_calendar_payload() {
        let raw = RawEvent {
            source_message_id: "evt-1".to_string(),
            occurred_at: "2026-01-01T00:00:00Z".to_string(),
            payload: serde_json::json!({
                "title": "Dentist",
                "start": "2026-02-01T09:00:00Z",
                "attendees": ["alice@example.com"],
            }),
        };
        let event = normalize("u1", HookKind::Calendar, "google-calendar", &raw).unwrap();
        assert!(event.transcript.contains("Dentist"));
    }
}
