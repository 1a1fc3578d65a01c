use serde::{Deserialize, Serialize};

use crate::types::{FinishReason, Role, Usage};

/// The incremental part of a streamed choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Set on the first chunk only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// The text fragment, if this chunk carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One candidate inside a streamed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Position of this choice.
    #[serde(default)]
    pub index: u32,

    /// The fragment delivered by this chunk.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Set on the last content chunk.
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// One `data:` payload of a streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Provider-assigned response id, repeated on every chunk.
    #[serde(default)]
    pub id: Option<String>,

    /// Streamed candidates. Empty on the trailing usage chunk.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Token usage; only on the trailing chunk.
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionChunk {
    /// The non-empty text fragment of the first choice, if any.
    pub fn delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|text| !text.is_empty())
    }

    /// Finish reason of the first choice.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices.first().and_then(|choice| choice.finish_reason)
    }
}
