use thiserror::Error;

/// Top-level error taxonomy shared by every crate (§7).
///
/// Each subsystem crate defines its own narrower error enum and converts
/// into this one at its public boundary, the same way the reference stack's
/// per-crate errors (`MemoryError`, `SchedulerError`, ...) stay local while
/// `SkynetError` is the one surfaced over the wire.
#[derive(Debug, Error)]
pub enum MemoriaError {
    /// Input schema, range, or cap violated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The id belongs to a different user_id than the caller supplied.
    #[error("cross-user access denied: {0}")]
    UnauthorizedCrossUser(String),

    /// Conflicting state change (e.g. intent already claimed).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The embedder gateway (C1) failed after its single retry.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The LLM gateway (C2) failed or returned schema-invalid JSON twice.
    #[error("llm error: {0}")]
    Llm(String),

    /// The vector store write failed — the logical store fails overall (§4.3).
    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MemoriaError {
    /// Error taxonomy code from §7, surfaced as `error_code` in responses.
    pub fn code(&self) -> &'static str {
        match self {
            MemoriaError::Validation(_) => "VALIDATION_ERROR",
            MemoriaError::NotFound(_) => "NOT_FOUND",
            MemoriaError::UnauthorizedCrossUser(_) => "UNAUTHORIZED_CROSS_USER",
            MemoriaError::Conflict(_) => "CONFLICT",
            MemoriaError::Embedding(_) => "EMBEDDING_ERROR",
            MemoriaError::Llm(_) => "LLM_ERROR",
            MemoriaError::Storage(_) => "STORAGE_ERROR",
            MemoriaError::Config(_) => "INTERNAL_ERROR",
            MemoriaError::Serialization(_) => "VALIDATION_ERROR",
            MemoriaError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the server maps this error to (§7).
    pub fn status_code(&self) -> u16 {
        match self {
            MemoriaError::Validation(_) | MemoriaError::Serialization(_) => 422,
            MemoriaError::NotFound(_) => 404,
            MemoriaError::UnauthorizedCrossUser(_) => 403,
            MemoriaError::Conflict(_) => 409,
            MemoriaError::Embedding(_) | MemoriaError::Llm(_) => 503,
            MemoriaError::Storage(_) => 500,
            MemoriaError::Config(_) | MemoriaError::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoriaError>;
