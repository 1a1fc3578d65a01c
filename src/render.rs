//! Output rendering for the chat session.
//!
//! The session never writes to the terminal directly; everything visible
//! goes through a [`Renderer`], so transport and display stay separate.

use std::io::{self, Stdout, Write};

use crate::types::{Role, Turn};

/// ANSI escape code for dim text (used for token annotations).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for speaker labels).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for the interruption marker).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
///
/// Deltas arrive through [`Renderer::print_text`] in generation order and
/// must be shown in that order.
pub trait Renderer: Send {
    /// Called before the first delta of an assistant response.
    fn start_response(&mut self) {}

    /// Print a chunk of response text.
    ///
    /// This is called incrementally as tokens are streamed from the API.
    fn print_text(&mut self, text: &str);

    /// Called when a response completed normally.
    fn finish_response(&mut self);

    /// Called when the user cancelled the response mid-stream.
    fn print_interrupted(&mut self);

    /// Print the approximate token count of a finished turn.
    fn print_token_usage(&mut self, role: Role, tokens: usize);

    /// Print a whole turn, e.g. when replaying the transcript.
    fn print_turn(&mut self, turn: &Turn, show_tokens: bool) {
        match turn.role() {
            Role::System => self.print_info(&format!("[system] {}", turn.content())),
            Role::User | Role::Assistant => {
                self.print_info(&format!("{}: {}", speaker(turn.role()), turn.content()));
            }
        }
        if show_tokens {
            self.print_token_usage(turn.role(), turn.tokens());
        }
    }

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Display label for a role.
pub fn speaker(role: Role) -> &'static str {
    match role {
        Role::System => "System",
        Role::User => "You",
        Role::Assistant => "Assistant",
    }
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            line_start: true,
        }
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.stdout.write_all(text.as_bytes());
        let _ = self.stdout.flush();
        self.line_start = text.ends_with('\n');
    }

    fn end_line(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self) {
        self.end_line();
        let label = self.styled(ANSI_CYAN, &format!("{}:", speaker(Role::Assistant)));
        self.write(&format!("{label}\n"));
    }

    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn finish_response(&mut self) {
        self.end_line();
    }

    fn print_interrupted(&mut self) {
        self.end_line();
        let marker = self.styled(ANSI_YELLOW, "[interrupted]");
        self.write(&format!("{marker}\n"));
    }

    fn print_token_usage(&mut self, role: Role, tokens: usize) {
        self.end_line();
        let who = match role {
            Role::System => "system",
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        let note = self.styled(ANSI_DIM, &format!("[{who}: {tokens} tokens]"));
        self.write(&format!("{note}\n"));
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        let _ = self.stdout.flush();
        let message = self.styled(ANSI_RED, &format!("Error: {error}"));
        eprintln!("{message}");
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        self.write(&format!("{info}\n"));
    }
}

/// A renderer that records everything it is asked to show.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingRenderer {
    pub text: String,
    pub deltas: Vec<String>,
    pub finished: usize,
    pub interrupted: usize,
    pub token_notes: Vec<(Role, usize)>,
    pub errors: Vec<String>,
    pub infos: Vec<String>,
}

#[cfg(test)]
impl Renderer for RecordingRenderer {
    fn print_text(&mut self, text: &str) {
        self.text.push_str(text);
        self.deltas.push(text.to_string());
    }

    fn finish_response(&mut self) {
        self.finished += 1;
    }

    fn print_interrupted(&mut self) {
        self.interrupted += 1;
    }

    fn print_token_usage(&mut self, role: Role, tokens: usize) {
        self.token_notes.push((role, tokens));
    }

    fn print_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }

    fn print_info(&mut self, info: &str) {
        self.infos.push(info.to_string());
    }
}
