use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the remote service stopped generating.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model reached a natural stopping point.
    Stop,

    /// The response hit `max_tokens`.
    Length,

    /// Output was withheld by the provider's content filter.
    ContentFilter,

    /// The model asked to call a tool.
    ToolCalls,

    /// The provider ran out of capacity mid-generation.
    InsufficientSystemResource,

    /// A reason this crate does not know about.
    #[serde(other)]
    Other,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::ContentFilter => write!(f, "content_filter"),
            FinishReason::ToolCalls => write!(f, "tool_calls"),
            FinishReason::InsufficientSystemResource => {
                write!(f, "insufficient_system_resource")
            }
            FinishReason::Other => write!(f, "other"),
        }
    }
}
