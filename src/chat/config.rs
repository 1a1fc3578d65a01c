//! Configuration types for the chat application.
//!
//! `ChatArgs` is parsed from the command line by `arrrg`; `ChatConfig` holds
//! the resolved values the session runs with.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::{DEFAULT_MODEL, DEFAULT_TIMEOUT};
use crate::transcript::DEFAULT_CONTEXT_TURNS;
use crate::types::{DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE, GenerationOptions};

/// System prompt used when none is given.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Command-line arguments for the deepchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: deepseek-chat)", "MODEL")]
    pub model: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 1024)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature, kept as text until validated.
    #[arrrg(optional, "Sampling temperature 0.0-2.0 (default: 0.7)", "TEMP")]
    pub temperature: Option<String>,

    /// Number of recent turns sent as context, or `all`.
    #[arrrg(optional, "Turns of context to send, or 'all' (default: 3)", "N")]
    pub context_turns: Option<String>,

    /// Endpoint root of the OpenAI-compatible API.
    #[arrrg(optional, "API base URL (default: https://api.deepseek.com/)", "URL")]
    pub base_url: Option<String>,

    /// Secrets file holding `openai.api_key`.
    #[arrrg(optional, "Secrets file (default: secrets.yaml)", "PATH")]
    pub secrets: Option<String>,

    /// Connect, response and stream-idle timeout.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Hide per-turn token annotations.
    #[arrrg(flag, "Hide token counts")]
    pub hide_tokens: bool,

    /// Wait for whole responses instead of streaming.
    #[arrrg(flag, "Disable streaming")]
    pub no_stream: bool,
}

/// A command-line value that could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatArgsError {
    /// The offending option, without dashes.
    pub option: &'static str,
    /// What was wrong with it.
    pub message: String,
}

impl fmt::Display for ChatArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--{}: {}", self.option.replace('_', "-"), self.message)
    }
}

impl std::error::Error for ChatArgsError {}

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: String,

    /// System prompt placed at the start of every transcript.
    pub system_prompt: String,

    /// Maximum tokens per response.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Non-system turns sent per request; `None` sends the whole transcript.
    pub context_turns: Option<usize>,

    /// Whether responses are streamed delta by delta.
    pub stream: bool,

    /// Whether token annotations are shown after each turn.
    pub show_tokens: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Endpoint root; `None` uses the client default.
    pub base_url: Option<String>,

    /// Secrets file; `None` uses `secrets.yaml` if present.
    pub secrets_path: Option<PathBuf>,

    /// Connect, response and stream-idle timeout.
    pub timeout: Duration,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: deepseek-chat
    /// - Max tokens: 1024
    /// - Temperature: 0.7
    /// - Context: last 3 turns
    /// - Streaming, token display and color: enabled
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            context_turns: Some(DEFAULT_CONTEXT_TURNS),
            stream: true,
            show_tokens: true,
            use_color: true,
            base_url: None,
            secrets_path: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the context window size; `None` sends everything.
    pub fn with_context_turns(mut self, turns: Option<usize>) -> Self {
        self.context_turns = turns;
        self
    }

    /// Enables or disables streaming.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Shows or hides token annotations.
    pub fn with_show_tokens(mut self, show: bool) -> Self {
        self.show_tokens = show;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The per-request generation options.
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions::new()
            .with_temperature(self.temperature)
            .with_max_output_tokens(self.max_tokens)
            .with_stream(self.stream)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = ChatArgsError;

    fn try_from(args: ChatArgs) -> Result<Self, Self::Error> {
        let defaults = ChatConfig::new();
        let temperature = match args.temperature.as_deref() {
            Some(value) => parse_temperature(value).map_err(|message| ChatArgsError {
                option: "temperature",
                message,
            })?,
            None => defaults.temperature,
        };
        let context_turns = match args.context_turns.as_deref() {
            Some(value) => parse_context_turns(value).map_err(|message| ChatArgsError {
                option: "context_turns",
                message,
            })?,
            None => defaults.context_turns,
        };
        if args.max_tokens == Some(0) {
            return Err(ChatArgsError {
                option: "max_tokens",
                message: "must be at least 1".to_string(),
            });
        }
        let timeout = match args.timeout_secs {
            Some(0) => {
                return Err(ChatArgsError {
                    option: "timeout_secs",
                    message: "must be at least 1".to_string(),
                });
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.timeout,
        };

        Ok(ChatConfig {
            model: args.model.unwrap_or(defaults.model),
            system_prompt: args.system.unwrap_or(defaults.system_prompt),
            max_tokens: args.max_tokens.unwrap_or(defaults.max_tokens),
            temperature,
            context_turns,
            stream: !args.no_stream,
            show_tokens: !args.hide_tokens,
            use_color: !args.no_color,
            base_url: args.base_url,
            secrets_path: args.secrets.map(PathBuf::from),
            timeout,
        })
    }
}

/// Parses a temperature in `0.0..=2.0`.
pub fn parse_temperature(value: &str) -> Result<f32, String> {
    let parsed: f32 = value
        .trim()
        .parse()
        .map_err(|_| "expects a value between 0 and 2".to_string())?;
    if parsed.is_finite() && (0.0..=2.0).contains(&parsed) {
        Ok(parsed)
    } else {
        Err("expects a value between 0 and 2".to_string())
    }
}

/// Parses a context size: a non-negative integer or `all`.
pub fn parse_context_turns(value: &str) -> Result<Option<usize>, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|_| "expects a number of turns or 'all'".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.model, "deepseek-chat");
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.context_turns, Some(3));
        assert!(config.stream);
        assert!(config.show_tokens);
        assert!(config.use_color);
        assert!(config.base_url.is_none());
        assert!(config.secrets_path.is_none());
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            model: Some("deepseek-reasoner".to_string()),
            system: Some("You are terse.".to_string()),
            max_tokens: Some(256),
            temperature: Some("1.3".to_string()),
            context_turns: Some("all".to_string()),
            base_url: Some("http://localhost:8080/v1/".to_string()),
            secrets: Some("/etc/deepchat/secrets.yaml".to_string()),
            timeout_secs: Some(5),
            no_color: true,
            hide_tokens: true,
            no_stream: true,
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.model, "deepseek-reasoner");
        assert_eq!(config.system_prompt, "You are terse.");
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.temperature, 1.3);
        assert_eq!(config.context_turns, None);
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1/"));
        assert_eq!(
            config.secrets_path,
            Some(PathBuf::from("/etc/deepchat/secrets.yaml"))
        );
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.use_color);
        assert!(!config.show_tokens);
        assert!(!config.stream);
    }

    #[test]
    fn config_from_args_rejects_bad_values() {
        let args = ChatArgs {
            temperature: Some("hot".to_string()),
            ..ChatArgs::default()
        };
        let err = ChatConfig::try_from(args).unwrap_err();
        assert_eq!(err.option, "temperature");
        assert!(err.to_string().starts_with("--temperature:"));

        let args = ChatArgs {
            context_turns: Some("-1".to_string()),
            ..ChatArgs::default()
        };
        assert_eq!(
            ChatConfig::try_from(args).unwrap_err().option,
            "context_turns"
        );

        let args = ChatArgs {
            max_tokens: Some(0),
            ..ChatArgs::default()
        };
        assert_eq!(ChatConfig::try_from(args).unwrap_err().option, "max_tokens");

        let args = ChatArgs {
            timeout_secs: Some(0),
            ..ChatArgs::default()
        };
        let err = ChatConfig::try_from(args).unwrap_err();
        assert_eq!(err.to_string(), "--timeout-secs: must be at least 1");
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_model("deepseek-reasoner")
            .with_system_prompt("Test prompt")
            .with_max_tokens(2048)
            .with_temperature(0.2)
            .with_context_turns(Some(5))
            .with_stream(false)
            .with_show_tokens(false)
            .without_color()
            .with_timeout(Duration::from_secs(10));

        assert_eq!(config.model, "deepseek-reasoner");
        assert_eq!(config.system_prompt, "Test prompt");
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.context_turns, Some(5));
        assert!(!config.stream);
        assert!(!config.show_tokens);
        assert!(!config.use_color);
        assert_eq!(config.timeout, Duration::from_secs(10));

        let options = config.generation_options();
        assert_eq!(options.temperature, 0.2);
        assert_eq!(options.max_output_tokens, 2048);
        assert!(!options.stream);
    }

    #[test]
    fn context_turn_parsing() {
        assert_eq!(parse_context_turns("3"), Ok(Some(3)));
        assert_eq!(parse_context_turns(" ALL "), Ok(None));
        assert_eq!(parse_context_turns("0"), Ok(Some(0)));
        assert!(parse_context_turns("three").is_err());
    }

    #[test]
    fn temperature_parsing() {
        assert_eq!(parse_temperature("0"), Ok(0.0));
        assert_eq!(parse_temperature("2.0"), Ok(2.0));
        assert!(parse_temperature("2.1").is_err());
        assert!(parse_temperature("NaN").is_err());
    }
}
