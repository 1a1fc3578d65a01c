//! Streaming generation with cooperative cancellation.
//!
//! A [`Generation`] drives one request to a [`TextGenerator`] and exposes it
//! as a stream of [`GenerationEvent`]s: any number of [`GenerationEvent::Delta`]
//! values followed by exactly one terminal event. The stream is pull-based,
//! so the [`CancelSignal`] is read each time a delta is about to be
//! committed: a delta that arrives after cancellation was requested is
//! discarded, the remote stream is dropped, and the text accumulated so far
//! is returned as [`GenerationEvent::Cancelled`]. A request that is waiting
//! on the network wakes up as soon as cancellation is requested, so a
//! stalled stream does not hold the prompt hostage.
//!
//! ```text
//! Idle -> Requesting -> (Streaming)* -> Completed | Cancelled | Failed
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::stream::{self, Stream, StreamExt};
use tokio::sync::Notify;

use crate::client::{DeltaStream, TextGenerator};
use crate::error::{Error, Result};
use crate::observability::{
    GENERATION_CANCELLED, GENERATION_COMPLETED, GENERATION_DELTAS, GENERATION_DURATION,
    GENERATION_FAILED, GENERATION_TTFD,
};
use crate::render::Renderer;
use crate::types::{GenerationOptions, Turn};

///////////////////////////////////////// CancelSignal /////////////////////////////////////////

/// A shareable cancellation flag.
///
/// Clones observe the same flag. Requesting cancellation is safe from any
/// thread, including a signal handler.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal {
    requested: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl CancelSignal {
    /// Creates a signal that has not been requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// True once cancellation has been requested and not yet cleared.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Clears a previous request. Call before starting the next generation.
    pub fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        // A stale permit from an earlier request only costs one extra loop.
        while !self.is_requested() {
            self.wake.notified().await;
        }
    }
}

///////////////////////////////////////// State /////////////////////////////////////////

/// Lifecycle of one generation request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GenerationState {
    /// Not started.
    Idle,
    /// The request is in flight; nothing has arrived yet.
    Requesting,
    /// At least one delta has been committed.
    Streaming,
    /// The service finished the response.
    Completed,
    /// The user cancelled; the text is a prefix of the full response.
    Cancelled,
    /// The request failed; there is no text.
    Failed,
}

impl GenerationState {
    /// True for `Completed`, `Cancelled` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationState::Completed | GenerationState::Cancelled | GenerationState::Failed
        )
    }
}

/// One step of a generation, as seen by the display.
#[derive(Debug)]
pub enum GenerationEvent {
    /// A fragment of text, already committed to the accumulator.
    Delta(String),
    /// The full response. Equal to the concatenation of all deltas when streaming.
    Completed(String),
    /// Cancellation took effect; carries every committed delta, concatenated.
    Cancelled(String),
    /// The request failed.
    Failed(Error),
}

impl GenerationEvent {
    /// True for the three terminal events.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationEvent::Delta(_))
    }
}

/// The result of a generation that produced text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// Either [`GenerationState::Completed`] or [`GenerationState::Cancelled`].
    pub state: GenerationState,
    /// The finalized text.
    pub text: String,
    /// Number of deltas that were committed.
    pub deltas: usize,
}

impl GenerationOutcome {
    /// True when the text is a cancelled prefix.
    pub fn is_cancelled(&self) -> bool {
        self.state == GenerationState::Cancelled
    }
}

///////////////////////////////////////// StreamSession /////////////////////////////////////////

/// Ephemeral state of one in-flight generation.
#[derive(Debug)]
pub struct StreamSession {
    text: String,
    state: GenerationState,
    deltas: usize,
    cancel: CancelSignal,
    started: Instant,
}

impl StreamSession {
    /// Creates an idle session watching `cancel`.
    pub fn new(cancel: CancelSignal) -> Self {
        Self {
            text: String::new(),
            state: GenerationState::Idle,
            deltas: 0,
            cancel,
            started: Instant::now(),
        }
    }

    /// Text committed so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Number of deltas committed so far.
    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    /// True if cancellation has been requested.
    pub fn cancel_requested(&self) -> bool {
        self.cancel.is_requested()
    }

    /// Marks the request as sent.
    pub fn begin(&mut self) {
        self.started = Instant::now();
        self.state = GenerationState::Requesting;
    }

    /// Appends a delta. Callers check [`StreamSession::cancel_requested`] first.
    pub fn commit(&mut self, delta: &str) {
        if self.deltas == 0 {
            GENERATION_TTFD.add(self.started.elapsed().as_secs_f64());
        }
        GENERATION_DELTAS.click();
        self.deltas += 1;
        self.text.push_str(delta);
        self.state = GenerationState::Streaming;
    }

    /// Finishes with the accumulated text and returns it.
    pub fn complete(&mut self) -> String {
        let text = std::mem::take(&mut self.text);
        self.complete_with(text)
    }

    /// Finishes with text returned in one piece by a non-streaming call.
    pub fn complete_with(&mut self, text: String) -> String {
        self.finish(GenerationState::Completed);
        GENERATION_COMPLETED.click();
        tracing::debug!(deltas = self.deltas, bytes = text.len(), "generation completed");
        text
    }

    /// Finishes with the prefix committed before cancellation and returns it.
    pub fn cancel(&mut self) -> String {
        self.finish(GenerationState::Cancelled);
        GENERATION_CANCELLED.click();
        tracing::info!(deltas = self.deltas, "generation cancelled by user");
        std::mem::take(&mut self.text)
    }

    /// Finishes with an error and hands it back; committed text is discarded.
    ///
    /// If cancellation was requested before the failure the user asked to
    /// stop first, so callers should prefer [`StreamSession::cancel`].
    pub fn fail(&mut self, err: Error) -> Error {
        self.finish(GenerationState::Failed);
        GENERATION_FAILED.click();
        tracing::warn!(deltas = self.deltas, error = %err, "generation failed");
        self.text.clear();
        err
    }

    /// Finishes after `err`, as a cancellation when one was requested.
    fn settle(&mut self, err: Error) -> GenerationEvent {
        if self.cancel_requested() {
            tracing::debug!(error = %err, "error after cancellation was requested");
            GenerationEvent::Cancelled(self.cancel())
        } else {
            GenerationEvent::Failed(self.fail(err))
        }
    }

    fn outcome(&self, text: String) -> GenerationOutcome {
        GenerationOutcome {
            state: self.state,
            text,
            deltas: self.deltas,
        }
    }

    fn finish(&mut self, state: GenerationState) {
        GENERATION_DURATION.add(self.started.elapsed().as_secs_f64());
        self.state = state;
    }
}

///////////////////////////////////////// Generation /////////////////////////////////////////

/// One generation request against a context window.
pub struct Generation {
    generator: Arc<dyn TextGenerator>,
    turns: Vec<Turn>,
    options: GenerationOptions,
    cancel: CancelSignal,
}

enum Step {
    Start(Generation),
    Streaming {
        deltas: DeltaStream,
        session: StreamSession,
    },
    Done,
}

impl Generation {
    /// Prepares a generation; nothing is sent until the events are polled.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        turns: Vec<Turn>,
        options: GenerationOptions,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            generator,
            turns,
            options,
            cancel,
        }
    }

    /// The request as a stream of events ending in exactly one terminal event.
    pub fn events(self) -> impl Stream<Item = GenerationEvent> + Send {
        stream::unfold(Step::Start(self), |step| async move {
            match step {
                Step::Start(generation) => Some(generation.start().await),
                Step::Streaming { deltas, session } => Some(pull(deltas, session).await),
                Step::Done => None,
            }
        })
    }

    async fn start(self) -> (GenerationEvent, Step) {
        let mut session = StreamSession::new(self.cancel.clone());
        if session.cancel_requested() {
            return (GenerationEvent::Cancelled(session.cancel()), Step::Done);
        }
        session.begin();
        tracing::debug!(
            model = self.generator.model(),
            turns = self.turns.len(),
            stream = self.options.stream,
            "starting generation"
        );

        if !self.options.stream {
            let result = tokio::select! {
                result = self.generator.complete(&self.turns, &self.options) => Some(result),
                _ = self.cancel.cancelled() => None,
            };
            let event = match result {
                Some(Ok(text)) => GenerationEvent::Completed(session.complete_with(text)),
                Some(Err(err)) => session.settle(err),
                None => GenerationEvent::Cancelled(session.cancel()),
            };
            return (event, Step::Done);
        }

        let result = tokio::select! {
            result = self.generator.stream(&self.turns, &self.options) => Some(result),
            _ = self.cancel.cancelled() => None,
        };
        match result {
            Some(Ok(deltas)) => pull(deltas, session).await,
            Some(Err(err)) => (session.settle(err), Step::Done),
            None => (GenerationEvent::Cancelled(session.cancel()), Step::Done),
        }
    }

    /// Drives the generation into `renderer` and returns its outcome.
    ///
    /// Cancellation is a successful outcome carrying the partial text;
    /// failures are returned as errors.
    pub async fn run(self, renderer: &mut dyn Renderer) -> Result<GenerationOutcome> {
        let mut events = Box::pin(self.events());
        let mut deltas = 0;
        renderer.start_response();
        while let Some(event) = events.next().await {
            match event {
                GenerationEvent::Delta(text) => {
                    deltas += 1;
                    renderer.print_text(&text);
                }
                GenerationEvent::Completed(text) => {
                    if deltas == 0 {
                        renderer.print_text(&text);
                    }
                    renderer.finish_response();
                    return Ok(GenerationOutcome {
                        state: GenerationState::Completed,
                        text,
                        deltas,
                    });
                }
                GenerationEvent::Cancelled(text) => {
                    renderer.print_interrupted();
                    return Ok(GenerationOutcome {
                        state: GenerationState::Cancelled,
                        text,
                        deltas,
                    });
                }
                GenerationEvent::Failed(err) => {
                    renderer.finish_response();
                    return Err(err);
                }
            }
        }
        Err(Error::streaming(
            "generation ended without a terminal event",
            None,
        ))
    }
}

async fn pull(mut deltas: DeltaStream, mut session: StreamSession) -> (GenerationEvent, Step) {
    let cancel = session.cancel.clone();
    let next = tokio::select! {
        biased;
        next = deltas.next() => Some(next),
        _ = cancel.cancelled() => None,
    };
    match next {
        Some(Some(Ok(delta))) if !session.cancel_requested() => {
            session.commit(&delta);
            (
                GenerationEvent::Delta(delta),
                Step::Streaming { deltas, session },
            )
        }
        // Dropping the stream abandons the HTTP response.
        Some(Some(Ok(_))) | None => (GenerationEvent::Cancelled(session.cancel()), Step::Done),
        Some(Some(Err(err))) => (session.settle(err), Step::Done),
        Some(None) => (GenerationEvent::Completed(session.complete()), Step::Done),
    }
}

///////////////////////////////////////// callback form /////////////////////////////////////////

/// Runs a generation through [`TextGenerator::generate`], calling `on_delta`
/// for each committed fragment.
///
/// The callback handed to the generator checks `cancel` before committing
/// each fragment and answers with [`Error::Abort`] once cancellation was
/// requested; that abort is caught here and turned into a
/// [`GenerationState::Cancelled`] outcome carrying the committed prefix.
/// A request that is still waiting on the network is abandoned as soon as
/// cancellation is requested. Other errors are returned unchanged unless
/// cancellation was requested before they arrived.
pub async fn generate_with_callback<F>(
    generator: &dyn TextGenerator,
    turns: &[Turn],
    options: &GenerationOptions,
    cancel: &CancelSignal,
    mut on_delta: F,
) -> Result<GenerationOutcome>
where
    F: FnMut(&str) + Send,
{
    let session = Arc::new(Mutex::new(StreamSession::new(cancel.clone())));
    if cancel.is_requested() {
        let mut session = lock(&session);
        let text = session.cancel();
        return Ok(session.outcome(text));
    }
    lock(&session).begin();

    let sink = Arc::clone(&session);
    let mut callback = move |delta: &str| -> Result<()> {
        let mut session = lock(&sink);
        if session.cancel_requested() {
            return Err(Error::abort("cancellation requested"));
        }
        session.commit(delta);
        drop(session);
        on_delta(delta);
        Ok(())
    };

    let result = tokio::select! {
        result = generator.generate(turns, options, &mut callback) => result,
        _ = cancel.cancelled() => Err(Error::abort("cancellation requested")),
    };
    let mut session = lock(&session);
    match result {
        Ok(text) => {
            if options.stream {
                debug_assert_eq!(text, session.text(), "streamed text diverged from deltas");
            }
            let text = session.complete_with(text);
            Ok(session.outcome(text))
        }
        // Abort is how the callback reports cancellation; any other error
        // after a request to stop is treated the same way.
        Err(_) if session.cancel_requested() => {
            let text = session.cancel();
            Ok(session.outcome(text))
        }
        Err(err) => Err(session.fail(err)),
    }
}

fn lock(session: &Mutex<StreamSession>) -> std::sync::MutexGuard<'_, StreamSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingRenderer;

    /// Replays a fixed list of deltas, optionally failing after them.
    struct Scripted {
        deltas: Vec<&'static str>,
        fail_after: Option<usize>,
        stall_after: Option<usize>,
        fail_to_start: bool,
    }

    impl Scripted {
        fn new(deltas: Vec<&'static str>) -> Self {
            Self {
                deltas,
                fail_after: None,
                stall_after: None,
                fail_to_start: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl TextGenerator for Scripted {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _: &[Turn], _: &GenerationOptions) -> Result<String> {
            if self.fail_to_start {
                return Err(Error::connection("refused", None));
            }
            Ok(self.deltas.concat())
        }

        async fn stream(&self, _: &[Turn], _: &GenerationOptions) -> Result<DeltaStream> {
            if self.fail_to_start {
                return Err(Error::connection("refused", None));
            }
            let mut items: Vec<Result<String>> =
                self.deltas.iter().map(|d| Ok(d.to_string())).collect();
            if let Some(n) = self.fail_after {
                items.truncate(n);
                items.push(Err(Error::streaming("connection reset", None)));
            }
            if let Some(n) = self.stall_after {
                items.truncate(n);
                return Ok(Box::pin(stream::iter(items).chain(stream::pending())));
            }
            Ok(Box::pin(stream::iter(items)))
        }
    }

    fn generation(generator: Scripted, options: GenerationOptions, cancel: &CancelSignal) -> Generation {
        Generation::new(
            Arc::new(generator),
            vec![Turn::system("sys", 1), Turn::user("hi", 1)],
            options,
            cancel.clone(),
        )
    }

    #[test]
    fn cancel_signal_is_shared() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        assert!(!signal.is_requested());
        clone.request();
        assert!(signal.is_requested());
        signal.clear();
        assert!(!clone.is_requested());
    }

    #[test]
    fn terminal_states() {
        assert!(!GenerationState::Idle.is_terminal());
        assert!(!GenerationState::Streaming.is_terminal());
        assert!(GenerationState::Cancelled.is_terminal());
        assert!(GenerationEvent::Failed(Error::abort("x")).is_terminal());
        assert!(!GenerationEvent::Delta(String::new()).is_terminal());
    }

    #[tokio::test]
    async fn completed_text_equals_concatenated_deltas() {
        let cancel = CancelSignal::new();
        let events: Vec<GenerationEvent> = generation(
            Scripted::new(vec!["Hel", "lo, ", "wor", "ld"]),
            GenerationOptions::new(),
            &cancel,
        )
        .events()
        .collect()
        .await;
        let mut streamed = String::new();
        for event in &events[..events.len() - 1] {
            match event {
                GenerationEvent::Delta(d) => streamed.push_str(d),
                other => panic!("unexpected {other:?}"),
            }
        }
        match events.last() {
            Some(GenerationEvent::Completed(text)) => assert_eq!(text, &streamed),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(streamed, "Hello, world");
    }

    #[tokio::test]
    async fn cancel_after_second_delta_keeps_exact_prefix() {
        let cancel = CancelSignal::new();
        let mut events = Box::pin(
            generation(Scripted::new(vec!["a", "b", "c", "d"]), GenerationOptions::new(), &cancel)
                .events(),
        );
        let mut seen = Vec::new();
        while let Some(event) = events.next().await {
            match event {
                GenerationEvent::Delta(d) => {
                    seen.push(d);
                    if seen.len() == 2 {
                        cancel.request();
                    }
                }
                GenerationEvent::Cancelled(text) => {
                    assert_eq!(text, "ab");
                    assert_eq!(seen, vec!["a", "b"]);
                    assert!(events.next().await.is_none());
                    return;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        panic!("stream ended without cancellation");
    }

    #[tokio::test]
    async fn cancel_before_first_delta_is_empty() {
        let cancel = CancelSignal::new();
        cancel.request();
        let mut renderer = RecordingRenderer::default();
        let outcome = generation(Scripted::new(vec!["never"]), GenerationOptions::new(), &cancel)
            .run(&mut renderer)
            .await
            .unwrap();
        assert_eq!(outcome.state, GenerationState::Cancelled);
        assert_eq!(outcome.text, "");
        assert_eq!(outcome.deltas, 0);
        assert_eq!(renderer.interrupted, 1);
        assert!(renderer.text.is_empty());
    }

    #[tokio::test]
    async fn non_streaming_completes_in_one_piece() {
        let cancel = CancelSignal::new();
        let mut renderer = RecordingRenderer::default();
        let outcome = generation(
            Scripted::new(vec!["one ", "shot"]),
            GenerationOptions::new().with_stream(false),
            &cancel,
        )
        .run(&mut renderer)
        .await
        .unwrap();
        assert_eq!(outcome.state, GenerationState::Completed);
        assert_eq!(outcome.text, "one shot");
        assert_eq!(outcome.deltas, 0);
        assert_eq!(renderer.deltas, vec!["one shot"]);
        assert_eq!(renderer.finished, 1);
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let cancel = CancelSignal::new();
        let mut generator = Scripted::new(vec!["a", "b", "c"]);
        generator.fail_after = Some(2);
        let mut renderer = RecordingRenderer::default();
        let err = generation(generator, GenerationOptions::new(), &cancel)
            .run(&mut renderer)
            .await
            .unwrap_err();
        assert!(err.is_streaming());
        assert_eq!(renderer.text, "ab");
    }

    #[tokio::test]
    async fn error_after_cancel_request_is_a_cancellation() {
        let cancel = CancelSignal::new();
        let mut generator = Scripted::new(vec!["a", "b", "c"]);
        generator.fail_after = Some(2);
        let mut events = Box::pin(generation(generator, GenerationOptions::new(), &cancel).events());
        let mut seen = Vec::new();
        loop {
            match events.next().await {
                Some(GenerationEvent::Delta(d)) => {
                    seen.push(d);
                    if seen.len() == 2 {
                        cancel.request();
                    }
                }
                Some(GenerationEvent::Cancelled(text)) => {
                    assert_eq!(text, "ab");
                    break;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_wakes_a_stalled_stream() {
        let cancel = CancelSignal::new();
        let mut generator = Scripted::new(vec!["a", "b"]);
        generator.stall_after = Some(1);
        let mut events = Box::pin(generation(generator, GenerationOptions::new(), &cancel).events());
        assert!(matches!(events.next().await, Some(GenerationEvent::Delta(d)) if d == "a"));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.request();
        });
        let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.next())
            .await
            .expect("cancellation did not wake the stream");
        assert!(matches!(event, Some(GenerationEvent::Cancelled(text)) if text == "a"));
    }

    #[tokio::test]
    async fn cancelled_resolves_after_request() {
        let cancel = CancelSignal::new();
        let waiter = cancel.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        cancel.request();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn failure_to_start_yields_single_failed_event() {
        let cancel = CancelSignal::new();
        let mut generator = Scripted::new(vec![]);
        generator.fail_to_start = true;
        let events: Vec<GenerationEvent> = generation(generator, GenerationOptions::new(), &cancel)
            .events()
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], GenerationEvent::Failed(err) if err.is_connection()));
    }

    #[tokio::test]
    async fn stream_session_tracks_state() {
        let mut session = StreamSession::new(CancelSignal::new());
        assert_eq!(session.state(), GenerationState::Idle);
        session.begin();
        assert_eq!(session.state(), GenerationState::Requesting);
        session.commit("x");
        session.commit("y");
        assert_eq!(session.state(), GenerationState::Streaming);
        assert_eq!(session.text(), "xy");
        assert_eq!(session.delta_count(), 2);
        assert_eq!(session.complete(), "xy");
        assert_eq!(session.state(), GenerationState::Completed);
    }

    #[tokio::test]
    async fn callback_form_completes() {
        let cancel = CancelSignal::new();
        let generator = Scripted::new(vec!["x", "y", "z"]);
        let mut seen = String::new();
        let outcome = generate_with_callback(
            &generator,
            &[Turn::user("hi", 1)],
            &GenerationOptions::new(),
            &cancel,
            |d| seen.push_str(d),
        )
        .await
        .unwrap();
        assert_eq!(outcome.state, GenerationState::Completed);
        assert_eq!(outcome.text, "xyz");
        assert_eq!(seen, "xyz");
        assert_eq!(outcome.deltas, 3);
    }

    #[tokio::test]
    async fn callback_form_turns_abort_into_prefix() {
        let cancel = CancelSignal::new();
        let generator = Scripted::new(vec!["1", "2", "3", "4"]);
        let trigger = cancel.clone();
        let mut count = 0;
        let outcome = generate_with_callback(
            &generator,
            &[Turn::user("hi", 1)],
            &GenerationOptions::new(),
            &cancel,
            move |_| {
                count += 1;
                if count == 3 {
                    trigger.request();
                }
            },
        )
        .await
        .unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.text, "123");
        assert_eq!(outcome.deltas, 3);
    }

    #[tokio::test]
    async fn callback_form_propagates_transport_errors() {
        let cancel = CancelSignal::new();
        let mut generator = Scripted::new(vec!["1", "2"]);
        generator.fail_after = Some(1);
        let err = generate_with_callback(
            &generator,
            &[Turn::user("hi", 1)],
            &GenerationOptions::new(),
            &cancel,
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(err.is_streaming());
    }

    #[tokio::test]
    async fn callback_form_error_after_cancel_keeps_prefix() {
        let cancel = CancelSignal::new();
        let mut generator = Scripted::new(vec!["1", "2", "3"]);
        generator.fail_after = Some(2);
        let trigger = cancel.clone();
        let mut count = 0;
        let outcome = generate_with_callback(
            &generator,
            &[Turn::user("hi", 1)],
            &GenerationOptions::new(),
            &cancel,
            move |_| {
                count += 1;
                if count == 2 {
                    trigger.request();
                }
            },
        )
        .await
        .unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.text, "12");
        assert_eq!(outcome.deltas, 2);
    }
}
