pub mod embedder;
pub mod error;
pub mod llm;

pub use embedder::{DeterministicEmbedder, Embedder, HttpEmbedder};
pub use error::GatewayError;
pub use llm::{FakeLlmClient, HttpLlmClient, LlmClient};
