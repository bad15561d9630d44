use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error(transparent)]
    Store(#[from] memoria_stores::StoreError),

    #[error("cross-user access to memory {memory_id} by {user_id}")]
    UnauthorizedCrossUser { memory_id: String, user_id: String },
}

impl From<IngestionError> for memoria_core::MemoriaError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::Embedding(msg) => memoria_core::MemoriaError::Embedding(msg),
            IngestionError::Llm(msg) => memoria_core::MemoriaError::Llm(msg),
            IngestionError::Store(e) => e.into(),
            IngestionError::UnauthorizedCrossUser { memory_id, user_id } => {
                memoria_core::MemoriaError::UnauthorizedCrossUser(format!(
                    "user {user_id} does not own memory {memory_id}"
                ))
            }
        }
    }
}
