//! Interactive chat application for OpenAI-compatible LLM APIs.
//!
//! This binary provides a streaming REPL for chatting with DeepSeek (or any
//! OpenAI-compatible endpoint).
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! deepchat
//!
//! # Specify a model and send the whole conversation as context
//! deepchat --model deepseek-reasoner --context-turns all
//!
//! # Disable colors and token counts (useful for piping output)
//! deepchat --no-color --hide-tokens
//! ```
//!
//! The API key is read from `OPENAI_API_KEY`, or from `openai.api_key` in
//! `secrets.yaml` (override the file with `--secrets`).
//!
//! Press Ctrl-C while a response is streaming to stop it; the text received
//! so far is kept as the assistant's reply. Type `/help` for commands.

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use deepchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use deepchat::secrets::{API_KEY_NAME, API_KEY_NAMESPACE, SecretStore, default_store};
use deepchat::{CancelSignal, DeepSeek, TextGenerator};

/// Main entry point for the deepchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides; warnings only by default so logs stay out of the chat.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deepchat=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let (args, _) = ChatArgs::from_command_line_relaxed("deepchat [OPTIONS]");
    let config = match ChatConfig::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };
    let use_color = config.use_color;

    let secrets = default_store(config.secrets_path.as_deref())?;
    let api_key = secrets.get(API_KEY_NAMESPACE, API_KEY_NAME)?;
    let client = DeepSeek::with_options(
        api_key,
        config.base_url.as_deref(),
        Some(config.model.clone()),
        Some(config.timeout),
    )?;
    tracing::info!(model = client.model(), base_url = %client.base_url(), "starting chat");

    let mut session = ChatSession::new(Arc::new(client.clone()), config);
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    // Ctrl-C outside the line editor lands here and stops the current response.
    let cancel = CancelSignal::new();
    let handler_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        handler_cancel.request();
    })?;

    println!("DeepSeek Chat (model: {})", session.model());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Reset => {
                            session.reset();
                            renderer.print_info("Conversation reset.");
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::History => {
                            if session.transcript().len() <= 1 {
                                renderer.print_info("(no messages yet)");
                            } else {
                                session.replay(&mut renderer);
                            }
                        }
                        ChatCommand::Model(model) => {
                            session.set_generator(Arc::new(client.with_model(model.clone())));
                            renderer.print_info(&format!("Model changed to: {}", model));
                        }
                        ChatCommand::System(prompt) => {
                            session.set_system_prompt(prompt.clone());
                            renderer.print_info(&format!(
                                "System prompt set to: {} (takes effect after /reset)",
                                prompt
                            ));
                        }
                        ChatCommand::MaxTokens(value) => {
                            session.set_max_tokens(value);
                            renderer.print_info(&format!("max_tokens set to {value}"));
                        }
                        ChatCommand::Temperature(value) => {
                            session.set_temperature(value);
                            renderer.print_info(&format!("temperature set to {:.2}", value));
                        }
                        ChatCommand::Context(turns) => {
                            session.set_context_turns(turns);
                            renderer
                                .print_info(&format!("Context set to {}", describe_context(turns)));
                        }
                        ChatCommand::Tokens(show) => {
                            session.set_show_tokens(show);
                            if show {
                                renderer.print_info("Token counts shown.");
                            } else {
                                renderer.print_info("Token counts hidden.");
                            }
                        }
                        ChatCommand::Stream(stream) => {
                            session.set_stream(stream);
                            if stream {
                                renderer.print_info("Streaming enabled.");
                            } else {
                                renderer.print_info("Streaming disabled.");
                            }
                        }
                        ChatCommand::Stats => {
                            print_stats(&session);
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                cancel.clear();
                if let Err(e) = session
                    .send_streaming(line, &mut renderer, cancel.clone())
                    .await
                {
                    tracing::debug!(error = ?e, "turn failed");
                    renderer.print_error(&e.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn print_stats(session: &ChatSession) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Model: {}", stats.model);
    println!("      Turns: {}", stats.turn_count);
    println!(
        "      Tokens: {} in transcript, {} in next context",
        stats.transcript_tokens, stats.context_tokens
    );
    println!("      Context: {}", describe_context(stats.context_turns));
    println!("      Max tokens: {}", stats.max_tokens);
    println!("      Temperature: {:.2}", stats.temperature);
    println!("      Streaming: {}", if stats.stream { "on" } else { "off" });
    println!(
        "      Token counts: {}",
        if stats.show_tokens { "shown" } else { "hidden" }
    );
    println!("      System prompt: {}", stats.system_prompt);
    if stats.estimator_fallback {
        println!("      Tokenizer: cl100k_base (approximate)");
    }
    println!(
        "      Responses: {} completed, {} stopped, {} failed",
        stats.completed, stats.cancelled, stats.failed
    );
}

fn describe_context(turns: Option<usize>) -> String {
    match turns {
        Some(n) => format!("last {n} turns"),
        None => "whole conversation".to_string(),
    }
}
