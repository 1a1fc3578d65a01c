//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! OpenAI-compatible providers send one `data:` line per chunk, separated by
//! blank lines, and finish with `data: [DONE]`. Lines starting with `:` are
//! keep-alive comments. Bytes are buffered until a whole event has arrived,
//! so a multi-byte character split across network reads is decoded intact.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS};
use crate::{ChatCompletionChunk, Error, Result};

/// Sentinel payload that ends a stream.
const DONE_MARKER: &str = "[DONE]";

/// A decoded SSE event.
#[derive(Debug, Clone, PartialEq)]
enum SseData {
    Chunk(Box<ChatCompletionChunk>),
    Done,
}

/// Process a stream of bytes into a stream of completion chunks.
///
/// The returned stream ends after `[DONE]` or when the byte stream ends,
/// whichever comes first. Errors are yielded in place and do not end the
/// stream; callers decide whether to stop.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<ChatCompletionChunk>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result.map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    stream::unfold(
        (stream, Vec::<u8>::new(), false),
        move |(mut stream, mut buffer, mut done)| async move {
            loop {
                if done {
                    return None;
                }
                while let Some(event) = extract_event(&mut buffer) {
                    match parse_event(&event) {
                        None => continue,
                        Some(Ok(SseData::Done)) => {
                            done = true;
                            break;
                        }
                        Some(Ok(SseData::Chunk(chunk))) => {
                            STREAM_EVENTS.click();
                            return Some((Ok(*chunk), (stream, buffer, done)));
                        }
                        Some(Err(err)) => {
                            STREAM_ERRORS.click();
                            return Some((Err(err), (stream, buffer, done)));
                        }
                    }
                }
                if done {
                    return None;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
                    }
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(e), (stream, buffer, done)));
                    }
                    None => {
                        // A final event may arrive without its trailing blank line.
                        done = true;
                        if buffer.iter().any(|b| !b.is_ascii_whitespace()) {
                            let event = std::mem::take(&mut buffer);
                            match parse_event(&event) {
                                Some(Ok(SseData::Chunk(chunk))) => {
                                    STREAM_EVENTS.click();
                                    return Some((Ok(*chunk), (stream, buffer, done)));
                                }
                                Some(Err(err)) => {
                                    STREAM_ERRORS.click();
                                    return Some((Err(err), (stream, buffer, done)));
                                }
                                Some(Ok(SseData::Done)) | None => return None,
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Removes and returns the first complete event from `buffer`.
fn extract_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let mut event: Vec<u8> = buffer.drain(..end + 2).collect();
    event.truncate(end);
    Some(event)
}

/// Parses one event. Returns `None` for comment-only or empty events.
fn parse_event(event: &[u8]) -> Option<Result<SseData>> {
    let text = match std::str::from_utf8(event) {
        Ok(text) => text,
        Err(e) => return Some(Err(e.into())),
    };

    let mut data = Vec::new();
    for line in text.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if data.is_empty() {
        return None;
    }
    let data = data.join("\n");
    let data = data.trim();

    if data == DONE_MARKER {
        return Some(Ok(SseData::Done));
    }

    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorBody,
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(data) {
        let message = envelope
            .error
            .message
            .unwrap_or_else(|| "stream reported an error".to_string());
        return Some(Err(Error::streaming(message, None)));
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => Some(Ok(SseData::Chunk(Box::new(chunk)))),
        Err(e) => Some(Err(Error::serialization(
            format!("Failed to parse stream chunk: {e}"),
            Some(Box::new(e)),
        ))),
    }
}
