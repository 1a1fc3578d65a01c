//! Core chat session management.
//!
//! `ChatSession` owns the transcript and the token estimator, builds the
//! context window for each request, and folds the result of each
//! generation back into the transcript.

use std::sync::Arc;

use crate::chat::config::ChatConfig;
use crate::error::Result;
use crate::generation::{CancelSignal, Generation, GenerationOutcome};
use crate::render::Renderer;
use crate::tokens::TokenEstimator;
use crate::transcript::{ContextWindow, Transcript};
use crate::types::{Role, Turn};
use crate::TextGenerator;

/// A chat session that manages conversation state and generation requests.
pub struct ChatSession {
    generator: Arc<dyn TextGenerator>,
    config: ChatConfig,
    estimator: TokenEstimator,
    transcript: Transcript,
    completed: u64,
    cancelled: u64,
    failed: u64,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The model used for the session.
    pub model: String,
    /// Number of turns in the transcript, including the system turn.
    pub turn_count: usize,
    /// Approximate tokens across the whole transcript.
    pub transcript_tokens: usize,
    /// Approximate tokens the next request would send before the new input.
    pub context_tokens: usize,
    /// Non-system turns sent per request; `None` means all of them.
    pub context_turns: Option<usize>,
    /// The maximum tokens per response.
    pub max_tokens: u32,
    /// The sampling temperature.
    pub temperature: f32,
    /// Whether responses are streamed.
    pub stream: bool,
    /// Whether token annotations are shown.
    pub show_tokens: bool,
    /// The configured system prompt.
    pub system_prompt: String,
    /// Whether the token counts come from the fallback tokenizer.
    pub estimator_fallback: bool,
    /// Generations that completed.
    pub completed: u64,
    /// Generations the user stopped.
    pub cancelled: u64,
    /// Generations that failed.
    pub failed: u64,
}

impl ChatSession {
    /// Creates a new chat session whose transcript holds only the system turn.
    pub fn new(generator: Arc<dyn TextGenerator>, config: ChatConfig) -> Self {
        let estimator = TokenEstimator::for_model(generator.model());
        let transcript = Transcript::new(Turn::estimated(
            Role::System,
            config.system_prompt.clone(),
            &estimator,
        ));
        Self {
            generator,
            config,
            estimator,
            transcript,
            completed: 0,
            cancelled: 0,
            failed: 0,
        }
    }

    /// Sends a user message and renders the response as it arrives.
    ///
    /// The user turn is appended first. A completed or cancelled generation
    /// is appended as an assistant turn (a cancelled one holds the text
    /// streamed before the cancel). A failed generation appends nothing and
    /// its error is returned.
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
        cancel: CancelSignal,
    ) -> Result<GenerationOutcome> {
        let user = Turn::estimated(Role::User, user_input, &self.estimator);
        if self.config.show_tokens {
            renderer.print_token_usage(Role::User, user.tokens());
        }
        self.transcript.append(user);

        let window = self.context_window();
        tracing::debug!(
            turns = window.len(),
            tokens = window.token_total(),
            "sending context window"
        );
        let generation = Generation::new(
            Arc::clone(&self.generator),
            window.to_vec(),
            self.config.generation_options(),
            cancel,
        );

        match generation.run(renderer).await {
            Ok(outcome) => {
                if outcome.is_cancelled() {
                    self.cancelled += 1;
                } else {
                    self.completed += 1;
                }
                let assistant =
                    Turn::estimated(Role::Assistant, outcome.text.clone(), &self.estimator);
                if self.config.show_tokens {
                    renderer.print_token_usage(Role::Assistant, assistant.tokens());
                }
                self.transcript.append(assistant);
                Ok(outcome)
            }
            Err(err) => {
                self.failed += 1;
                Err(err)
            }
        }
    }

    /// The turns the next request would send, not counting the new input.
    pub fn context_window(&self) -> ContextWindow<'_> {
        match self.config.context_turns {
            Some(n) => self.transcript.windowed(n),
            None => self.transcript.full(),
        }
    }

    /// Replaces the transcript with a fresh system turn.
    pub fn reset(&mut self) {
        self.transcript.reset(Turn::estimated(
            Role::System,
            self.config.system_prompt.clone(),
            &self.estimator,
        ));
    }

    /// Replays the transcript into `renderer`. The system turn is skipped.
    pub fn replay(&self, renderer: &mut dyn Renderer) {
        for turn in self.transcript.iter().filter(|turn| !turn.is_system()) {
            renderer.print_turn(turn, self.config.show_tokens);
        }
    }

    /// The conversation so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the current model.
    pub fn model(&self) -> &str {
        self.generator.model()
    }

    /// Swaps the generation service, e.g. after a model change.
    ///
    /// The estimator follows the new model; existing turns keep their counts.
    pub fn set_generator(&mut self, generator: Arc<dyn TextGenerator>) {
        self.estimator = TokenEstimator::for_model(generator.model());
        self.config.model = generator.model().to_string();
        self.generator = generator;
    }

    /// Sets the system prompt used by the next [`ChatSession::reset`].
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.config.system_prompt = prompt.into();
    }

    /// Sets the maximum tokens per response.
    pub fn set_max_tokens(&mut self, max_tokens: u32) {
        self.config.max_tokens = max_tokens;
    }

    /// Sets the sampling temperature.
    pub fn set_temperature(&mut self, temperature: f32) {
        self.config.temperature = temperature;
    }

    /// Sets the context window size; `None` sends the whole transcript.
    pub fn set_context_turns(&mut self, turns: Option<usize>) {
        self.config.context_turns = turns;
    }

    /// Shows or hides token annotations.
    pub fn set_show_tokens(&mut self, show: bool) {
        self.config.show_tokens = show;
    }

    /// Enables or disables streaming.
    pub fn set_stream(&mut self, stream: bool) {
        self.config.stream = stream;
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.model().to_string(),
            turn_count: self.transcript.len(),
            transcript_tokens: self.transcript.total_tokens(),
            context_tokens: self.context_window().token_total(),
            context_turns: self.config.context_turns,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: self.config.stream,
            show_tokens: self.config.show_tokens,
            system_prompt: self.config.system_prompt.clone(),
            estimator_fallback: self.estimator.is_fallback(),
            completed: self.completed,
            cancelled: self.cancelled,
            failed: self.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;
    use crate::client::DeltaStream;
    use crate::error::Error;
    use crate::render::RecordingRenderer;
    use crate::types::GenerationOptions;

    struct Echo {
        model: String,
        fail: bool,
    }

    impl Echo {
        fn new() -> Arc<dyn TextGenerator> {
            Arc::new(Self {
                model: "deepseek-chat".to_string(),
                fail: false,
            })
        }

        fn failing() -> Arc<dyn TextGenerator> {
            Arc::new(Self {
                model: "deepseek-chat".to_string(),
                fail: true,
            })
        }
    }

    #[async_trait::async_trait]
    impl TextGenerator for Echo {
        fn model(&self) -> &str {
            &self.model
        }

        async fn complete(&self, turns: &[Turn], _: &GenerationOptions) -> Result<String> {
            if self.fail {
                return Err(Error::authentication("bad key"));
            }
            let last = turns.last().map(Turn::content).unwrap_or_default();
            Ok(format!("echo: {last}"))
        }

        async fn stream(&self, turns: &[Turn], options: &GenerationOptions) -> Result<DeltaStream> {
            let text = self.complete(turns, options).await?;
            let words: Vec<Result<String>> = text
                .split_inclusive(' ')
                .map(|word| Ok(word.to_string()))
                .collect();
            Ok(Box::pin(stream::iter(words)))
        }
    }

    #[test]
    fn new_session_has_system_turn() {
        let session = ChatSession::new(Echo::new(), ChatConfig::default());
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(
            session.transcript().system_prompt(),
            Some(ChatConfig::default().system_prompt.as_str())
        );
        assert_eq!(session.model(), "deepseek-chat");
    }

    #[tokio::test]
    async fn exchange_appends_user_and_assistant() {
        let mut session = ChatSession::new(Echo::new(), ChatConfig::default());
        let mut renderer = RecordingRenderer::default();
        let outcome = session
            .send_streaming("hello there", &mut renderer, CancelSignal::new())
            .await
            .unwrap();
        assert_eq!(outcome.text, "echo: hello there");
        assert_eq!(renderer.text, "echo: hello there");
        assert_eq!(renderer.deltas.len(), 3);

        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].role(), Role::User);
        assert_eq!(turns[2].role(), Role::Assistant);
        assert_eq!(turns[2].content(), "echo: hello there");
        assert_eq!(session.transcript().token_counts().len(), 3);
        assert_eq!(
            renderer.token_notes,
            vec![(Role::User, turns[1].tokens()), (Role::Assistant, turns[2].tokens())]
        );
    }

    #[tokio::test]
    async fn cancelled_generation_is_folded_into_transcript() {
        let mut session = ChatSession::new(Echo::new(), ChatConfig::default());
        let mut renderer = RecordingRenderer::default();
        let cancel = CancelSignal::new();
        cancel.request();
        let outcome = session
            .send_streaming("hello", &mut renderer, cancel)
            .await
            .unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.text, "");
        assert_eq!(session.transcript().len(), 3);
        assert_eq!(session.transcript().turns()[2].content(), "");
        assert_eq!(session.stats().cancelled, 1);
    }

    #[tokio::test]
    async fn failed_generation_keeps_only_the_user_turn() {
        let mut session = ChatSession::new(Echo::failing(), ChatConfig::default());
        let mut renderer = RecordingRenderer::default();
        let err = session
            .send_streaming("hello", &mut renderer, CancelSignal::new())
            .await
            .unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript().last().map(Turn::role), Some(Role::User));
        assert_eq!(session.stats().failed, 1);
    }

    #[tokio::test]
    async fn context_window_follows_configuration() {
        let config = ChatConfig::default().with_context_turns(Some(1));
        let mut session = ChatSession::new(Echo::new(), config);
        let mut renderer = RecordingRenderer::default();
        for input in ["one", "two"] {
            session
                .send_streaming(input, &mut renderer, CancelSignal::new())
                .await
                .unwrap();
        }
        let window = session.context_window();
        assert_eq!(window.len(), 2);
        assert!(window.turns()[0].is_system());
        assert_eq!(window.turns()[1].content(), "echo: two");

        session.set_context_turns(None);
        assert_eq!(session.context_window().len(), 5);
    }

    #[tokio::test]
    async fn hidden_tokens_are_not_rendered() {
        let config = ChatConfig::default().with_show_tokens(false).with_stream(false);
        let mut session = ChatSession::new(Echo::new(), config);
        let mut renderer = RecordingRenderer::default();
        session
            .send_streaming("quiet", &mut renderer, CancelSignal::new())
            .await
            .unwrap();
        assert!(renderer.token_notes.is_empty());
        assert_eq!(renderer.deltas, vec!["echo: quiet"]);
    }

    #[tokio::test]
    async fn reset_is_idempotent_and_uses_new_prompt() {
        let mut session = ChatSession::new(Echo::new(), ChatConfig::default());
        let mut renderer = RecordingRenderer::default();
        session
            .send_streaming("hi", &mut renderer, CancelSignal::new())
            .await
            .unwrap();
        session.set_system_prompt("Be brief.");
        session.reset();
        let once = session.transcript().clone();
        session.reset();
        assert_eq!(session.transcript(), &once);
        assert_eq!(once.len(), 1);
        assert_eq!(once.system_prompt(), Some("Be brief."));
        assert_eq!(once.token_counts().len(), 1);
    }

    #[tokio::test]
    async fn replay_skips_system_turn() {
        let mut session = ChatSession::new(Echo::new(), ChatConfig::default());
        let mut renderer = RecordingRenderer::default();
        session
            .send_streaming("hi", &mut renderer, CancelSignal::new())
            .await
            .unwrap();
        let mut replay = RecordingRenderer::default();
        session.replay(&mut replay);
        assert_eq!(replay.infos, vec!["You: hi", "Assistant: echo: hi"]);
        assert_eq!(replay.token_notes.len(), 2);
    }

    #[test]
    fn setters_update_stats() {
        let mut session = ChatSession::new(Echo::new(), ChatConfig::default());
        session.set_max_tokens(32);
        session.set_temperature(1.5);
        session.set_stream(false);
        session.set_show_tokens(false);
        let stats = session.stats();
        assert_eq!(stats.max_tokens, 32);
        assert_eq!(stats.temperature, 1.5);
        assert!(!stats.stream);
        assert!(!stats.show_tokens);
        assert_eq!(stats.turn_count, 1);
        assert_eq!(stats.context_tokens, stats.transcript_tokens);
        assert!(stats.estimator_fallback);
    }
}
