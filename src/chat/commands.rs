//! Slash command parsing for the chat application.
//!
//! Input starting with `/` controls the session and is never sent to the
//! remote service.

use crate::chat::config::{parse_context_turns, parse_temperature};

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Replace the transcript with a fresh system turn.
    Reset,

    /// Change the model.
    Model(String),

    /// Replace the system prompt; takes effect on reset.
    System(String),

    /// Set the maximum tokens per response.
    MaxTokens(u32),

    /// Set the sampling temperature.
    Temperature(f32),

    /// Set the context window; `None` sends the whole transcript.
    Context(Option<usize>),

    /// Show or hide token annotations.
    Tokens(bool),

    /// Enable or disable streaming.
    Stream(bool),

    /// Replay the transcript.
    History,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics.
    Stats,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use deepchat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/context 5").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "reset" | "clear" => ChatCommand::Reset,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "system" => match argument {
            Some(prompt) => ChatCommand::System(prompt.to_string()),
            None => ChatCommand::Invalid("/system requires a prompt".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "history" => ChatCommand::History,
        "max_tokens" => match argument.map(str::parse::<u32>) {
            Some(Ok(value)) if value > 0 => ChatCommand::MaxTokens(value),
            Some(_) => ChatCommand::Invalid("/max_tokens expects a positive integer".to_string()),
            None => ChatCommand::Invalid("/max_tokens requires a value".to_string()),
        },
        "temperature" => match argument {
            Some(arg) => match parse_temperature(arg) {
                Ok(value) => ChatCommand::Temperature(value),
                Err(err) => ChatCommand::Invalid(format!("/temperature {err}")),
            },
            None => ChatCommand::Invalid("/temperature requires a value".to_string()),
        },
        "context" => match argument {
            Some(arg) => match parse_context_turns(arg) {
                Ok(turns) => ChatCommand::Context(turns),
                Err(err) => ChatCommand::Invalid(format!("/context {err}")),
            },
            None => ChatCommand::Invalid("/context requires a number or 'all'".to_string()),
        },
        "tokens" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Tokens(value),
            None => ChatCommand::Invalid("/tokens expects 'on' or 'off'".to_string()),
        },
        "stream" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Stream(value),
            None => ChatCommand::Invalid("/stream expects 'on' or 'off'".to_string()),
        },
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /reset                 Start over with a fresh system prompt (alias: /clear)
  /history               Show the conversation so far
  /context <n>|all       Send the last n turns as context, or everything
  /tokens on|off         Show or hide token counts
  /stream on|off         Stream responses or wait for the whole reply
  /model <name>          Change the model (e.g., /model deepseek-chat)
  /system <prompt>       Set the system prompt used from the next /reset
  /max_tokens <n>        Set maximum response tokens
  /temperature <v>       Set temperature 0.0-2.0
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the chat
Press Ctrl-C while a response is streaming to stop it."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_reset() {
        assert_eq!(parse_command("/reset"), Some(ChatCommand::Reset));
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Reset));
        assert_eq!(parse_command("/RESET"), Some(ChatCommand::Reset));
    }

    #[test]
    fn parse_model() {
        assert_eq!(
            parse_command("/model   deepseek-reasoner  "),
            Some(ChatCommand::Model("deepseek-reasoner".to_string()))
        );
        assert_eq!(
            parse_command("/model"),
            Some(ChatCommand::Invalid(
                "/model requires a model name".to_string()
            ))
        );
    }

    #[test]
    fn parse_system() {
        assert_eq!(
            parse_command("/system You are a pirate"),
            Some(ChatCommand::System("You are a pirate".to_string()))
        );
        assert!(matches!(
            parse_command("/system"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
    }

    #[test]
    fn parse_context() {
        assert_eq!(parse_command("/context 5"), Some(ChatCommand::Context(Some(5))));
        assert_eq!(parse_command("/context all"), Some(ChatCommand::Context(None)));
        assert!(matches!(
            parse_command("/context many"),
            Some(ChatCommand::Invalid(msg)) if msg.starts_with("/context")
        ));
    }

    #[test]
    fn parse_temperature() {
        assert_eq!(
            parse_command("/temperature 0.5"),
            Some(ChatCommand::Temperature(0.5))
        );
        assert!(matches!(
            parse_command("/temperature 3"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("between")
        ));
        assert!(matches!(
            parse_command("/temperature"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
    }

    #[test]
    fn parse_max_tokens() {
        assert_eq!(parse_command("/max_tokens 64"), Some(ChatCommand::MaxTokens(64)));
        assert!(matches!(
            parse_command("/max_tokens 0"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_toggles() {
        assert_eq!(parse_command("/tokens off"), Some(ChatCommand::Tokens(false)));
        assert_eq!(parse_command("/tokens ON"), Some(ChatCommand::Tokens(true)));
        assert_eq!(parse_command("/stream no"), Some(ChatCommand::Stream(false)));
        assert!(matches!(
            parse_command("/stream maybe"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("expects")
        ));
    }

    #[test]
    fn parse_history_and_stats() {
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello there!"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
        assert_eq!(parse_command("what does /reset do?"), None);
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/bogus"),
            Some(ChatCommand::Invalid("Unknown command: /bogus".to_string()))
        );
    }

    #[test]
    fn help_mentions_every_command() {
        for name in [
            "/reset", "/history", "/context", "/tokens", "/stream", "/model", "/system",
            "/max_tokens", "/temperature", "/stats", "/help", "/quit",
        ] {
            assert!(help_text().contains(name), "{name} missing from help");
        }
    }
}
