//! Signature verification for incoming webhooks. `memoria-server` owns the
//! actual HTTP route; this module is the transport-agnostic auth check
//! plus the consent/dedup/normalize handoff into `ingress::accept_event`.

use hmac::{Hmac, Mac};
use memoria_core::config::{WebhookAuthMode, WebhookSourceConfig};
use sha2::Sha256;

use crate::error::{HookError, Result};
use crate::health::HookHealthTracker;
use crate::ingress::{accept_event, IngressDeps};
use crate::types::{HookKind, RawEvent};

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook request against its configured source, then run it
/// through the shared ingress path. `signature_header` / `auth_header` are
/// the raw header values the HTTP layer extracted (`X-Hub-Signature-256`,
/// `Authorization`), already lower-cased per header convention.
pub async fn handle_webhook(
    deps: &IngressDeps,
    health: &HookHealthTracker,
    source: &WebhookSourceConfig,
    hook_kind: HookKind,
    user_id: &str,
    body: &[u8],
    signature_header: Option<&str>,
    auth_header: Option<&str>,
    raw: RawEvent,
) -> Result<Option<memoria_ingestion::IngestSummary>> {
    let connector = format!("{}:webhook", hook_kind.as_str());

    let verified = match &source.auth_mode {
        WebhookAuthMode::HmacSha256 => verify_hmac_sha256(body, signature_header, source.secret.as_deref()),
        WebhookAuthMode::BearerToken => verify_bearer_token(auth_header, source.secret.as_deref()),
        WebhookAuthMode::None => Ok(()),
    };
    if let Err(reason) = verified {
        health.record_error(&connector, &reason);
        return Err(HookError::AuthFailed(reason));
    }

    let result = accept_event(deps, user_id, hook_kind, &source.name, raw).await;
    match &result {
        Ok(_) => health.record_success(&connector),
        Err(e) => health.record_error(&connector, &e.to_string()),
    }
    result
}

fn verify_hmac_sha256(body: &[u8], signature_header: Option<&str>, secret: Option<&str>) -> std::result::Result<(), String> {
    let secret = secret.ok_or_else(|| "no HMAC secret configured for this source".to_string())?;
    let sig_header = signature_header.ok_or_else(|| "missing signature header".to_string())?;
    let sig_hex = sig_header
        .strip_prefix("sha256=")
        .ok_or_else(|| "malformed signature header".to_string())?;
    let expected = hex::decode(sig_hex).map_err(|_| "signature header is not valid hex".to_string())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "invalid HMAC key length".to_string())?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| "HMAC signature mismatch".to_string())
}

fn verify_bearer_token(auth_header: Option<&str>, secret: Option<&str>) -> std::result::Result<(), String> {
    let expected = secret.ok_or_else(|| "no bearer token configured for this source".to_string())?;
    let auth_header = auth_header.ok_or_else(|| "missing Authorization header".to_string())?;
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| "Authorization header must use Bearer scheme".to_string())?;
    if token == expected {
        Ok(())
    } else {
        Err("bearer token mismatch".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_verification_accepts_matching_signature() {
        let secret = "sekret";
        let body = b"{\"hello\":\"world\"}";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        assert!(verify_hmac_sha256(body, Some(&sig), Some(secret)).is_ok());
    }

    #[test]
    fn hmac_verification_rejects_wrong_secret() {
        let body = b"{\"hello\":\"world\"}";
        let mut mac = HmacSha256::new_from_slice(b"right").unwrap();
        mac.update(body);
        let sig = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        assert!(verify_hmac_sha256(body, Some(&sig), Some("wrong")).is_err());
    }

    #[test]
    fn bearer_token_mismatch_is_rejected() {
        assert!(verify_bearer_token(Some("Bearer abc"), Some("xyz")).is_err());
        assert!(verify_bearer_token(Some("Bearer abc"), Some("abc")).is_ok());
    }
}
