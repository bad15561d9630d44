use thiserror::Error;

/// Internal gateway failure. Never escapes the gateway boundary: callers
/// only ever see `Option::None` (§4.1, §4.2) — this type exists so the
/// gateway itself can log *why* before collapsing to ⊥.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("timed out")]
    Timeout,

    #[error("schema validation failed: {0}")]
    SchemaInvalid(String),
}
