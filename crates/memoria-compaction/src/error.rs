use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("store error: {0}")]
    Store(#[from] memoria_stores::StoreError),
    #[error("ingestion error: {0}")]
    Ingestion(#[from] memoria_ingestion::IngestionError),
}

impl From<CompactionError> for memoria_core::MemoriaError {
    fn from(err: CompactionError) -> Self {
        match err {
            CompactionError::Store(e) => e.into(),
            CompactionError::Ingestion(e) => e.into(),
        }
    }
}
