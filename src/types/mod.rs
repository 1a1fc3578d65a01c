// Public modules
pub mod chat_completion;
pub mod chat_completion_chunk;
pub mod finish_reason;
pub mod generation_options;
pub mod role;
pub mod turn;
pub mod usage;

// Re-exports
pub use chat_completion::{ChatCompletion, ChatCompletionRequest, ChatMessage, Choice, StreamOptions};
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
pub use finish_reason::FinishReason;
pub use generation_options::{DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE, GenerationOptions};
pub use role::{Role, RoleParseError};
pub use turn::Turn;
pub use usage::Usage;
