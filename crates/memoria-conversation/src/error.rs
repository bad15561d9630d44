use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation actor is no longer running")]
    ActorUnavailable,
}

impl From<ConversationError> for memoria_core::MemoriaError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::ActorUnavailable => {
                memoria_core::MemoriaError::Internal("conversation actor unavailable".to_string())
            }
        }
    }
}
