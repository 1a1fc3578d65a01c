//! Chat application module for interactive conversations.
//!
//! This module provides the REPL-facing pieces built on top of the client
//! library:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: the conversation session and its transcript
//! - [`commands`]: slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    ChatArgs, ChatArgsError, ChatConfig, DEFAULT_SYSTEM_PROMPT, parse_context_turns,
    parse_temperature,
};
pub use session::{ChatSession, SessionStats};
