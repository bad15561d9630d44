pub mod engine;
pub mod error;
pub mod scoring;
pub mod types;

pub use engine::{hybrid_retrieve, narrative, persona_retrieve, simple_retrieve, structured_retrieve};
pub use error::RetrievalError;
pub use types::{
    detect_persona, weights_for_persona, Explainability, Hit, HitSource, Weights,
    STRUCTURED_CATEGORIES,
};
