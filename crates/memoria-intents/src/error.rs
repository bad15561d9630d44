use thiserror::Error;

/// Errors surfaced by the scheduled-intent engine (§4.9). `Conflict` and
/// `NotFound` carry the HTTP-status distinction `claim()` needs (409 / 404)
/// up to the server layer without hard-coding status codes here.
#[derive(Debug, Error)]
pub enum IntentsError {
    #[error("store error: {0}")]
    Store(#[from] memoria_stores::StoreError),

    #[error("intent not found: {0}")]
    NotFound(String),

    #[error("intent already claimed: {0}")]
    AlreadyClaimed(String),

    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("active intent limit reached ({0} active)")]
    LimitExceeded(i64),

    #[error("cross-user access to intent {intent_id} by {user_id}")]
    UnauthorizedCrossUser { intent_id: String, user_id: String },
}

pub type Result<T> = std::result::Result<T, IntentsError>;

impl From<IntentsError> for memoria_core::MemoriaError {
    fn from(err: IntentsError) -> Self {
        match err {
            IntentsError::Store(e) => e.into(),
            IntentsError::NotFound(id) => memoria_core::MemoriaError::NotFound(id),
            IntentsError::AlreadyClaimed(id) => {
                memoria_core::MemoriaError::Conflict(format!("intent {id} already claimed"))
            }
            IntentsError::InvalidTrigger(msg) => memoria_core::MemoriaError::Validation(msg),
            IntentsError::LimitExceeded(n) => {
                memoria_core::MemoriaError::Validation(format!("active intent limit reached ({n} active)"))
            }
            IntentsError::UnauthorizedCrossUser { intent_id, user_id } => {
                memoria_core::MemoriaError::UnauthorizedCrossUser(format!(
                    "user {user_id} does not own intent {intent_id}"
                ))
            }
        }
    }
}
