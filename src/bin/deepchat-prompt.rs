//! One-shot prompt tool: send a single message, print the reply, exit.
//!
//! There is no history; each invocation is a fresh system turn plus one
//! user turn.
//!
//! # Usage
//!
//! ```bash
//! # Prompt from the command line
//! deepchat-prompt "Explain borrow checking in one paragraph"
//!
//! # Prompt from stdin, waiting for the whole reply
//! cat question.txt | deepchat-prompt --no-stream
//!
//! # Show token estimates and timing on stderr
//! deepchat-prompt --verbose "Hello"
//! ```

use std::io::{Read, Write};
use std::time::Instant;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use tracing_subscriber::EnvFilter;

use deepchat::chat::{DEFAULT_SYSTEM_PROMPT, parse_temperature};
use deepchat::secrets::{API_KEY_NAME, API_KEY_NAMESPACE, SecretStore, default_store};
use deepchat::{
    CancelSignal, DeepSeek, GenerationOptions, Role, TextGenerator, TokenEstimator, Turn,
    generate_with_callback,
};

/// Command-line arguments for the deepchat-prompt tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
struct Args {
    /// Model to use.
    #[arrrg(optional, "Model to use (default: deepseek-chat)", "MODEL")]
    model: Option<String>,

    /// System prompt.
    #[arrrg(optional, "System prompt", "PROMPT")]
    system: Option<String>,

    /// Maximum tokens in the reply.
    #[arrrg(optional, "Max tokens in the reply (default: 1024)", "TOKENS")]
    max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature 0.0-2.0 (default: 0.7)", "TEMP")]
    temperature: Option<String>,

    /// Endpoint root.
    #[arrrg(optional, "API base URL", "URL")]
    base_url: Option<String>,

    /// Secrets file.
    #[arrrg(optional, "Secrets file (default: secrets.yaml)", "PATH")]
    secrets: Option<String>,

    /// Wait for the whole reply instead of streaming it.
    #[arrrg(flag, "Disable streaming")]
    no_stream: bool,

    /// Report token estimates and timing on stderr.
    #[arrrg(flag, "Include timing and token estimates")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deepchat=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let (args, free) = Args::from_command_line_relaxed("deepchat-prompt [OPTIONS] [PROMPT]...");

    let prompt = if free.is_empty() {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        input
    } else {
        free.join(" ")
    };
    if prompt.trim().is_empty() {
        eprintln!("Error: no prompt given on the command line or stdin");
        std::process::exit(1);
    }

    let mut options = GenerationOptions::new().with_stream(!args.no_stream);
    if let Some(temperature) = args.temperature.as_deref() {
        match parse_temperature(temperature) {
            Ok(value) => options = options.with_temperature(value),
            Err(err) => {
                eprintln!("Error: --temperature: {err}");
                std::process::exit(1);
            }
        }
    }
    if let Some(max_tokens) = args.max_tokens {
        options = options.with_max_output_tokens(max_tokens);
    }

    let secrets = default_store(args.secrets.as_deref().map(std::path::Path::new))?;
    let api_key = secrets.get(API_KEY_NAMESPACE, API_KEY_NAME)?;
    let client = DeepSeek::with_options(api_key, args.base_url.as_deref(), args.model, None)?;

    let estimator = TokenEstimator::for_model(client.model());
    let system = args.system.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let turns = vec![
        Turn::estimated(Role::System, system, &estimator),
        Turn::estimated(Role::User, prompt.trim(), &estimator),
    ];

    let cancel = CancelSignal::new();
    let handler_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        handler_cancel.request();
    })?;

    let start = Instant::now();
    let mut stdout = std::io::stdout();
    let outcome = generate_with_callback(&client, &turns, &options, &cancel, |delta| {
        let _ = stdout.write_all(delta.as_bytes());
        let _ = stdout.flush();
    })
    .await?;

    if !options.stream {
        print!("{}", outcome.text);
    }
    println!();
    if outcome.is_cancelled() {
        eprintln!("[interrupted]");
    }

    if args.verbose {
        let prompt_tokens: usize = turns.iter().map(Turn::tokens).sum();
        eprintln!("Model: {}", client.model());
        eprintln!("Duration: {:?}", start.elapsed());
        eprintln!("Prompt tokens (approx): {prompt_tokens}");
        eprintln!(
            "Reply tokens (approx): {}",
            estimator.estimate(&outcome.text)
        );
        eprintln!("Deltas: {}", outcome.deltas);
    }

    Ok(())
}
