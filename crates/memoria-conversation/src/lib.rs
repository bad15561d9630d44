pub mod actor;
pub mod error;
pub mod registry;
pub mod state;
pub mod types;

pub use actor::{ConversationCmd, ConversationDeps, ConversationHandle};
pub use error::ConversationError;
pub use registry::ConversationRegistry;
pub use state::ConversationState;
pub use types::{ConversationPolicy, Injection, Phase, Turn, TurnResult};
