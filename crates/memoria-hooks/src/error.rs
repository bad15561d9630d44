use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("store error: {0}")]
    Store(#[from] memoria_stores::StoreError),

    #[error("webhook authentication failed: {0}")]
    AuthFailed(String),

    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("user has not granted consent for {hook_kind} ingress")]
    ConsentNotGranted { hook_kind: String },

    #[error("unknown hook source: {0}")]
    UnknownSource(String),
}

pub type Result<T> = std::result::Result<T, HookError>;

impl From<HookError> for memoria_core::MemoriaError {
    fn from(err: HookError) -> Self {
        match err {
            HookError::Store(e) => e.into(),
            HookError::AuthFailed(msg) => memoria_core::MemoriaError::UnauthorizedCrossUser(msg),
            HookError::InvalidPayload(msg) => memoria_core::MemoriaError::Validation(msg),
            HookError::ConsentNotGranted { hook_kind } => {
                memoria_core::MemoriaError::Validation(format!("consent not granted for {hook_kind}"))
            }
            HookError::UnknownSource(src) => memoria_core::MemoriaError::NotFound(src),
        }
    }
}
