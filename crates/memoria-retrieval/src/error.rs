use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("store error: {0}")]
    Store(#[from] memoria_stores::StoreError),
    #[error("embedding provider unavailable")]
    EmbeddingUnavailable,
}

impl From<RetrievalError> for memoria_core::MemoriaError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Store(e) => e.into(),
            RetrievalError::EmbeddingUnavailable => {
                memoria_core::MemoriaError::Embedding("embedder unavailable".to_string())
            }
        }
    }
}
