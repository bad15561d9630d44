use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for memoria_core::MemoriaError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => memoria_core::MemoriaError::NotFound(msg),
            other => memoria_core::MemoriaError::Storage(other.to_string()),
        }
    }
}
