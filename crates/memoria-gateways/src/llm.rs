use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::GatewayError;

const WALLCLOCK_BUDGET: Duration = Duration::from_secs(30);
const STRICTER_SUFFIX: &str =
    "\n\nYour previous response did not match the required JSON schema. \
     Respond with ONLY a single JSON object matching the schema, no prose, no markdown fences.";

/// C2 — prompt + schema to validated JSON, with one schema-retry.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// `call_structured(prompt, input, schema) -> object | ⊥` (§4.2).
    async fn call_structured(
        &self,
        prompt: &str,
        input: &serde_json::Value,
        schema: &serde_json::Value,
    ) -> Option<serde_json::Value>;
}

pub struct HttpLlmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(api_key: String, base_url: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            model,
        }
    }

    async fn call_once(
        &self,
        system_prompt: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 4096,
            "system": system_prompt,
            "messages": [
                { "role": "user", "content": input.to_string() }
            ],
        });

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api { status, message });
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .find_map(|b| b.text)
            .ok_or_else(|| GatewayError::Parse("no text block in response".to_string()))?;

        extract_json(&text)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn call_structured(
        &self,
        prompt: &str,
        input: &serde_json::Value,
        schema: &serde_json::Value,
    ) -> Option<serde_json::Value> {
        let system_prompt = format!(
            "{prompt}\n\nRespond with ONLY a JSON object matching this schema:\n{schema}"
        );

        let attempt = tokio::time::timeout(
            WALLCLOCK_BUDGET,
            self.call_once(&system_prompt, input),
        )
        .await;

        let first = match attempt {
            Ok(Ok(value)) if matches_schema(&value, schema) => return Some(value),
            Ok(Ok(value)) => {
                warn!("llm response did not match schema, retrying with stricter instruction");
                Some(value)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "llm call failed, retrying once");
                None
            }
            Err(_) => {
                warn!("llm call timed out");
                None
            }
        };
        let _ = first;

        let stricter_prompt = format!("{system_prompt}{STRICTER_SUFFIX}");
        match tokio::time::timeout(WALLCLOCK_BUDGET, self.call_once(&stricter_prompt, input)).await
        {
            Ok(Ok(value)) if matches_schema(&value, schema) => Some(value),
            Ok(Ok(_)) => {
                warn!("llm retry still failed schema validation");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "llm retry failed");
                None
            }
            Err(_) => {
                warn!("llm retry timed out");
                None
            }
        }
    }
}

/// Find a JSON object in the model's text output, tolerating markdown
/// fences or leading/trailing prose by scanning for the outermost braces.
fn extract_json(text: &str) -> Result<serde_json::Value, GatewayError> {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(text.trim()) {
        return Ok(v);
    }
    let start = text.find('{').ok_or_else(|| GatewayError::Parse("no JSON object found".into()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| GatewayError::Parse("no JSON object found".into()))?;
    if end < start {
        return Err(GatewayError::Parse("no JSON object found".into()));
    }
    serde_json::from_str(&text[start..=end]).map_err(|e| GatewayError::Parse(e.to_string()))
}

/// Shallow schema check: every property listed in the schema's top-level
/// `required` array must be present. Full JSON-Schema validation is out of
/// scope — the gateway only needs to catch gross shape mismatches before
/// handing the object to a typed caller.
fn matches_schema(value: &serde_json::Value, schema: &serde_json::Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return true;
    };
    required
        .iter()
        .filter_map(|r| r.as_str())
        .all(|key| obj.contains_key(key))
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Deterministic stand-in for tests: echoes back whatever value the caller
/// configured, regardless of prompt/input.
pub struct FakeLlmClient {
    pub response: Option<serde_json::Value>,
}

impl FakeLlmClient {
    pub fn returning(value: serde_json::Value) -> Self {
        Self {
            response: Some(value),
        }
    }

    pub fn failing() -> Self {
        Self { response: None }
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn call_structured(
        &self,
        _prompt: &str,
        _input: &serde_json::Value,
        _schema: &serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.response.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_handles_markdown_fences() {
        let text = "```json\n{\"a\": 1}\n```";
        let v = extract_json(text).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn matches_schema_checks_required_keys() {
        let schema = serde_json::json!({ "required": ["memories", "profile_updates"] });
        let good = serde_json::json!({ "memories": [], "profile_updates": [] });
        let bad = serde_json::json!({ "memories": [] });
        assert!(matches_schema(&good, &schema));
        assert!(!matches_schema(&bad, &schema));
    }

    #[tokio::test]
    async fn fake_client_returns_configured_value() {
        let client = FakeLlmClient::returning(serde_json::json!({ "ok": true }));
        let result = client
            .call_structured("prompt", &serde_json::json!({}), &serde_json::json!({}))
            .await;
        assert_eq!(result.unwrap()["ok"], true);
    }
}
