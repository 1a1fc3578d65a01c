// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod generation;
pub mod render;
pub mod secrets;
pub mod sse;
pub mod tokens;
pub mod transcript;
pub mod types;

mod observability;

// Re-exports
pub use client::{DeepSeek, DeltaCallback, DeltaStream, TextGenerator};
pub use error::{Error, Result};
pub use generation::{
    CancelSignal, Generation, GenerationEvent, GenerationOutcome, GenerationState, StreamSession,
    generate_with_callback,
};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use secrets::{EnvSecrets, LayeredSecrets, SecretStore, YamlSecrets};
pub use tokens::TokenEstimator;
pub use transcript::{ContextWindow, Transcript};
pub use types::*;
