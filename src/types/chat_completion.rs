use serde::{Deserialize, Serialize};

use crate::types::{FinishReason, GenerationOptions, Role, Turn, Usage};

/// A message as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who produced the message.
    pub role: Role,

    /// The message text. Providers send `null` for empty assistant messages.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    /// Creates a wire message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self::new(turn.role(), turn.content())
    }
}

/// Asks the provider to append a usage chunk to the stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Whether the final chunk carries [`Usage`].
    pub include_usage: bool,
}

/// Body of `POST /chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model identifier, e.g. `deepseek-chat`.
    pub model: String,

    /// The context window, oldest first.
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum number of tokens to generate.
    pub max_tokens: u32,

    /// Whether the response is delivered as server-sent events.
    pub stream: bool,

    /// Streaming options; only sent for streaming requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

impl ChatCompletionRequest {
    /// Builds a request for `turns` with the given options.
    pub fn new<'a, I>(model: impl Into<String>, turns: I, options: &GenerationOptions) -> Self
    where
        I: IntoIterator<Item = &'a Turn>,
    {
        Self {
            model: model.into(),
            messages: turns.into_iter().map(ChatMessage::from).collect(),
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
            stream: options.stream,
            stream_options: options.stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }
}

/// One candidate in a non-streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Position of this choice.
    #[serde(default)]
    pub index: u32,

    /// The generated message.
    pub message: ChatMessage,

    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// A complete, non-streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Provider-assigned response id.
    #[serde(default)]
    pub id: Option<String>,

    /// The model that served the request.
    #[serde(default)]
    pub model: Option<String>,

    /// Generated candidates; deepchat only ever asks for one.
    pub choices: Vec<Choice>,

    /// Token usage, when reported.
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// Text of the first choice, or the empty string when there is none.
    pub fn text(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .unwrap_or("")
    }

    /// Finish reason of the first choice.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices.first().and_then(|choice| choice.finish_reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_from_turns() {
        let turns = vec![Turn::system("be brief", 2), Turn::user("hi", 1)];
        let options = GenerationOptions::new().with_max_output_tokens(32);
        let request = ChatCompletionRequest::new("deepseek-chat", &turns, &options);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "deepseek-chat");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert_eq!(value["max_tokens"], 32);
        assert_eq!(value["stream"], true);
        assert_eq!(value["stream_options"]["include_usage"], true);
    }

    #[test]
    fn non_streaming_request_omits_stream_options() {
        let turns = vec![Turn::user("hi", 1)];
        let options = GenerationOptions::new().with_stream(false);
        let request = ChatCompletionRequest::new("deepseek-chat", &turns, &options);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], false);
        assert!(value.get("stream_options").is_none());
    }

    #[test]
    fn completion_text() {
        let json = r#"{
            "id": "abc",
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        }"#;
        let completion: ChatCompletion = serde_json::from_str(json).unwrap();
        assert_eq!(completion.text(), "Hello!");
        assert_eq!(completion.finish_reason(), Some(FinishReason::Stop));
        assert_eq!(completion.usage, Some(Usage::new(5, 2)));
    }

    #[test]
    fn completion_without_choices_is_empty() {
        let completion: ChatCompletion = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert_eq!(completion.text(), "");
    }
}
