pub mod config;
pub mod error;
pub mod types;

pub use config::MemoriaConfig;
pub use error::{MemoriaError, Result};
pub use types::{
    new_intent_id, new_memory_id, now_iso, ConversationId, MemoryLayer, MemoryType,
    ProfileCategory, SourceType, UserId, PROFILE_FIELDS_PER_CATEGORY, PROFILE_TOTAL_FIELDS,
};
