//! The remote generation service.
//!
//! [`TextGenerator`] is the seam the conversation session talks to;
//! [`DeepSeek`] implements it for any OpenAI-compatible
//! `/chat/completions` endpoint.

use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::stream::{self, Stream, StreamExt};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse::process_sse;
use crate::types::{ChatCompletion, ChatCompletionRequest, GenerationOptions, Turn};

/// Default endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/";
/// Default model identifier.
pub const DEFAULT_MODEL: &str = "deepseek-chat";
/// Default timeout for connecting, for the response headers, and for the
/// gap between two streamed chunks.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A stream of text fragments, in generation order.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Receives each fragment of a streamed response.
pub type DeltaCallback<'a> = dyn for<'d> FnMut(&'d str) -> Result<()> + Send + 'a;

/// A remote text-generation service.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// The model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Generates a whole response in one call.
    async fn complete(&self, turns: &[Turn], options: &GenerationOptions) -> Result<String>;

    /// Starts a streaming generation and returns its deltas.
    ///
    /// Dropping the returned stream abandons the request.
    async fn stream(&self, turns: &[Turn], options: &GenerationOptions) -> Result<DeltaStream>;

    /// Generates a response, calling `on_delta` with each fragment as it arrives.
    ///
    /// With `options.stream` unset this makes one [`TextGenerator::complete`]
    /// call and `on_delta` never fires. Otherwise `on_delta` sees every
    /// fragment before it is appended to the returned text; if it returns an
    /// error the call stops there and the error is returned, so a callback
    /// that returns [`Error::Abort`] interrupts the generation.
    async fn generate(
        &self,
        turns: &[Turn],
        options: &GenerationOptions,
        on_delta: &mut DeltaCallback<'_>,
    ) -> Result<String> {
        if !options.stream {
            return self.complete(turns, options).await;
        }
        let mut deltas = self.stream(turns, options).await?;
        let mut text = String::new();
        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            on_delta(&delta)?;
            text.push_str(&delta);
        }
        Ok(text)
    }
}

/// Client for DeepSeek and other OpenAI-compatible chat APIs.
#[derive(Debug, Clone)]
pub struct DeepSeek {
    api_key: String,
    client: ReqwestClient,
    base_url: Url,
    model: String,
    timeout: Duration,
}

impl DeepSeek {
    /// Create a client for [`DEFAULT_MODEL`] at [`DEFAULT_BASE_URL`].
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, None, None, None)
    }

    /// Create a client with custom settings.
    pub fn with_options(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        model: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::configuration("API key is empty"));
        }

        let base_url = parse_base_url(base_url.unwrap_or(DEFAULT_BASE_URL))?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        // No whole-request timeout: it would cut off long, healthy streams.
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(format!("Failed to build HTTP client: {e}"), Some(Box::new(e)))
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout,
        })
    }

    /// Returns a copy of this client that targets another model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    /// The endpoint root requests are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self) -> Result<Url> {
        Ok(self.base_url.join("chat/completions")?)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| Error::configuration("API key contains characters not allowed in a header"))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        Ok(headers)
    }

    async fn post(&self, request: &ChatCompletionRequest) -> Result<Response> {
        let mut headers = self.default_headers()?;
        if request.stream {
            headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
        }

        CLIENT_REQUESTS.click();
        let start = Instant::now();
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            stream = request.stream,
            "sending chat completion request"
        );
        let mut builder = self
            .client
            .post(self.endpoint()?)
            .headers(headers)
            .json(request);
        if !request.stream {
            builder = builder.timeout(self.timeout);
        }
        let response = match tokio::time::timeout(self.timeout, builder.send()).await {
            Ok(response) => response.map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                self.send_error(e)
            })?,
            Err(_) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(Error::timeout(
                    format!("No response within {:?}", self.timeout),
                    Some(self.timeout.as_secs_f64()),
                ));
            }
        };
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = process_error_response(response).await;
            tracing::warn!(error = %err, "chat completion request failed");
            return Err(err);
        }
        Ok(response)
    }

    fn send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for DeepSeek {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, turns: &[Turn], options: &GenerationOptions) -> Result<String> {
        let options = options.with_stream(false);
        let request = ChatCompletionRequest::new(&self.model, turns, &options);
        let response = self.post(&request).await?;
        let completion = response.json::<ChatCompletion>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })?;
        tracing::debug!(
            finish_reason = ?completion.finish_reason(),
            usage = ?completion.usage,
            "chat completion finished"
        );
        Ok(completion.text().to_string())
    }

    async fn stream(&self, turns: &[Turn], options: &GenerationOptions) -> Result<DeltaStream> {
        let options = options.with_stream(true);
        let request = ChatCompletionRequest::new(&self.model, turns, &options);
        let response = self.post(&request).await?;
        let chunks = with_idle_timeout(process_sse(response.bytes_stream()), self.timeout);
        let deltas = chunks.filter_map(|chunk| {
            let delta = match chunk {
                Ok(chunk) => {
                    if let Some(reason) = chunk.finish_reason() {
                        tracing::debug!(finish_reason = %reason, "stream finished");
                    }
                    if let Some(usage) = chunk.usage {
                        tracing::debug!(?usage, "stream usage");
                    }
                    chunk.delta_text().map(|text| Ok(text.to_string()))
                }
                Err(err) => Some(Err(err)),
            };
            futures::future::ready(delta)
        });
        Ok(Box::pin(deltas))
    }
}

/// Fails the stream with [`Error::Timeout`] when no item arrives within
/// `idle`. The stream ends after the timeout error.
pub fn with_idle_timeout<S, T>(inner: S, idle: Duration) -> impl Stream<Item = Result<T>> + Send
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let inner = Box::pin(inner);
    stream::unfold(Some(inner), move |inner| async move {
        let mut inner = inner?;
        match tokio::time::timeout(idle, inner.next()).await {
            Ok(Some(item)) => Some((item, Some(inner))),
            Ok(None) => None,
            Err(_) => {
                tracing::warn!(?idle, "stream stalled");
                let err = Error::timeout(
                    format!("No data from the server for {idle:?}"),
                    Some(idle.as_secs_f64()),
                );
                Some((Err(err), None))
            }
        }
    })
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    // Url::join drops the last path segment unless it ends in a slash.
    let base_url = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };
    Ok(Url::parse(&base_url)?)
}

/// Process API response errors and convert to our Error type
async fn process_error_response(response: Response) -> Error {
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .map(String::from);
    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.parse::<u64>().ok());

    match response.text().await {
        Ok(body) => error_from_status(status, &body, request_id, retry_after),
        Err(e) => Error::http_client(
            format!("Failed to read error response: {e}"),
            Some(Box::new(e)),
        ),
    }
}

/// Maps an HTTP status and OpenAI-style error body to an [`Error`].
fn error_from_status(
    status: StatusCode,
    body: &str,
    request_id: Option<String>,
    retry_after: Option<u64>,
) -> Error {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
        param: Option<String>,
    }

    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|parsed| parsed.error);
    let (error_type, message, param) = match detail {
        Some(detail) => (
            detail.error_type,
            detail.message.unwrap_or_else(|| body.to_string()),
            detail.param,
        ),
        None => (None, body.to_string(), None),
    };

    let status_code = status.as_u16();
    match status_code {
        400 | 422 => Error::bad_request(message, param),
        401 => Error::authentication(message),
        402 => Error::rate_limit(format!("insufficient balance: {message}"), None),
        403 => Error::permission(message),
        404 => Error::not_found(message),
        408 => Error::timeout(message, None),
        429 => Error::rate_limit(message, retry_after),
        500..=599 => Error::service_unavailable(message, status_code, retry_after),
        _ => Error::api(status_code, error_type, message, request_id),
    }
}
