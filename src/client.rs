use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::client_logger::ClientLogger;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUESTS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, STREAM_DURATION,
    STREAM_ERRORS, STREAM_FRAGMENTS, STREAM_MALFORMED_FRAMES, STREAM_REQUESTS, STREAM_TTFB,
};
use crate::session::{HISTORY_WINDOW, Session};
use crate::sse::{self, Frame};
use crate::types::{ChatRequest, ChatResponse, Message};

/// The outcome of one exchange with the endpoint.
///
/// Failures never escape as `Err`: they are folded into `text` so that the
/// caller can record them as the assistant's reply, and kept in `error` so the
/// caller can tell a recovered failure from a real answer.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Assistant content to record.
    pub text: String,
    /// The failure folded into `text`, if any.
    pub error: Option<Error>,
}

impl Completion {
    /// A successful reply.
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
        }
    }

    /// A failed blocking exchange, rendered with its failure class.
    pub fn recovered(error: Error) -> Self {
        Self {
            text: error.turn_text(),
            error: Some(error),
        }
    }

    /// Returns true if the exchange failed and `text` describes the failure.
    pub fn is_recovered(&self) -> bool {
        self.error.is_some()
    }
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    config: Arc<ClientConfig>,
    client: ReqwestClient,
    headers: HeaderMap,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl CompletionClient {
    /// Create a new client from `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;
        let headers = default_headers(&config)?;
        Ok(Self {
            config: Arc::new(config),
            client,
            headers,
            logger: None,
        })
    }

    /// Attach an observer that sees every request, reply body and streamed fragment.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Assembles the messages submitted for `user_text`.
    ///
    /// The mode's system prompt (when registered) comes first, then at most
    /// [`HISTORY_WINDOW`] trailing history entries, then the new user message.
    pub fn build_messages(&self, session: &Session, user_text: &str) -> Vec<Message> {
        let window = session.window(HISTORY_WINDOW);
        let mut messages = Vec::with_capacity(window.len() + 2);
        if let Some(prompt) = self.config.modes.system_prompt(&session.mode) {
            messages.push(Message::system(prompt));
        }
        messages.extend_from_slice(window);
        messages.push(Message::user(user_text));
        messages
    }

    pub fn build_request(
        &self,
        session: &Session,
        user_text: &str,
        temperature: f32,
        stream: bool,
    ) -> ChatRequest {
        ChatRequest {
            model: session.model.clone(),
            messages: self.build_messages(session, user_text),
            temperature,
            max_tokens: self.config.max_tokens,
            stream,
        }
    }

    /// Runs one blocking exchange for `user_text` against `session`.
    pub async fn complete(
        &self,
        session: &Session,
        user_text: &str,
        temperature: f32,
    ) -> Completion {
        let request = self.build_request(session, user_text, temperature, false);
        self.execute(&request).await
    }

    /// Runs a prepared blocking request, folding any failure into the completion.
    pub async fn execute(&self, request: &ChatRequest) -> Completion {
        match self.send(request).await {
            Ok(text) => Completion::reply(text),
            Err(err) => {
                tracing::warn!(model = %request.model, error = %err, "completion failed");
                Completion::recovered(err)
            }
        }
    }

    /// Send a request to the endpoint and get the first choice's content.
    pub async fn send(&self, request: &ChatRequest) -> Result<String> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = self.send_inner(request).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if result.is_err() {
            CLIENT_REQUEST_ERRORS.click();
        }
        result
    }

    async fn send_inner(&self, request: &ChatRequest) -> Result<String> {
        let mut request = request.clone();
        request.stream = false;
        self.log_request(&request);
        tracing::debug!(
            model = %request.model,
            messages = request.message_count(),
            "sending completion request"
        );

        let timeout = self.config.timeout;
        let response = self
            .client
            .post(self.config.endpoint.clone())
            .headers(self.headers.clone())
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        if !response.status().is_success() {
            return Err(process_error_response(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, timeout))?;
        if let Some(logger) = &self.logger {
            logger.log_response(&body);
        }
        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {e}"),
                Some(Box::new(e)),
            )
        })?;
        parsed.into_content()
    }

    /// Stream a request, forwarding each content fragment to `on_chunk` in order.
    ///
    /// The stream ends at the `[DONE]` sentinel, when the connection closes, on
    /// a fault, or when `cancel` fires.  On a fault a single error fragment is
    /// forwarded and appended, so the returned text is exactly the
    /// concatenation of everything `on_chunk` saw.
    pub async fn stream<F>(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        mut on_chunk: F,
    ) -> Completion
    where
        F: FnMut(&str),
    {
        STREAM_REQUESTS.click();
        let start = Instant::now();
        let mut text = String::new();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::abort("stream cancelled")),
            result = self.stream_into(request, start, &mut text, &mut on_chunk) => result,
        };
        STREAM_DURATION.add(start.elapsed().as_secs_f64());
        match result {
            Ok(()) => Completion::reply(text),
            Err(err) => {
                STREAM_ERRORS.click();
                tracing::warn!(model = %request.model, error = %err, "stream failed");
                let fragment = if text.is_empty() {
                    err.stream_text()
                } else {
                    format!("\n{}", err.stream_text())
                };
                on_chunk(&fragment);
                text.push_str(&fragment);
                Completion {
                    text,
                    error: Some(err),
                }
            }
        }
    }

    async fn stream_into<F>(
        &self,
        request: &ChatRequest,
        start: Instant,
        text: &mut String,
        on_chunk: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&str),
    {
        let mut request = request.clone();
        request.stream = true;
        self.log_request(&request);
        tracing::debug!(
            model = %request.model,
            messages = request.message_count(),
            "starting completion stream"
        );

        let budget = self.config.stream_timeout;
        let mut headers = self.headers.clone();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let send = self
            .client
            .post(self.config.endpoint.clone())
            .headers(headers)
            .json(&request)
            .send();
        let response = match tokio::time::timeout(budget, send).await {
            Ok(response) => response.map_err(|e| transport_error(e, budget))?,
            Err(_) => {
                return Err(Error::timeout(
                    "stream did not start in time",
                    Some(budget.as_secs_f64()),
                ));
            }
        };

        if !response.status().is_success() {
            return Err(process_error_response(response).await);
        }

        let frames = sse::frames(response.bytes_stream());
        futures::pin_mut!(frames);
        let mut first_fragment = true;
        loop {
            let next = match tokio::time::timeout(budget, frames.next()).await {
                Ok(next) => next,
                Err(_) => {
                    return Err(Error::timeout(
                        "stream stalled",
                        Some(budget.as_secs_f64()),
                    ));
                }
            };
            match next {
                None | Some(Ok(Frame::Done)) => return Ok(()),
                Some(Err(err)) => return Err(err),
                Some(Ok(Frame::Delta(content))) => {
                    if first_fragment {
                        STREAM_TTFB.add(start.elapsed().as_secs_f64());
                        first_fragment = false;
                    }
                    STREAM_FRAGMENTS.click();
                    if let Some(logger) = &self.logger {
                        logger.log_stream_fragment(&content);
                    }
                    on_chunk(&content);
                    text.push_str(&content);
                }
                Some(Ok(Frame::Malformed(payload))) => {
                    STREAM_MALFORMED_FRAMES.click();
                    tracing::trace!(%payload, "skipping malformed stream frame");
                }
                Some(Ok(Frame::Ignored)) => {}
            }
        }
    }

    fn log_request(&self, request: &ChatRequest) {
        if let Some(logger) = &self.logger {
            logger.log_request(request);
        }
    }
}

impl fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionClient")
            .field("config", &self.config)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

/// Create the headers sent with every request.
fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    let mut bearer =
        HeaderValue::from_str(&format!("Bearer {}", config.api_key())).map_err(|_| {
            Error::validation(
                "API key is not a valid header value",
                Some("api_key".to_string()),
            )
        })?;
    bearer.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, bearer);
    headers.insert(
        HeaderName::from_static("http-referer"),
        HeaderValue::from_str(&config.referer)
            .map_err(|_| Error::validation("invalid referer", Some("referer".to_string())))?,
    );
    headers.insert(
        HeaderName::from_static("x-title"),
        HeaderValue::from_str(&config.title)
            .map_err(|_| Error::validation("invalid title", Some("title".to_string())))?,
    );
    Ok(headers)
}

fn transport_error(e: reqwest::Error, budget: Duration) -> Error {
    if e.is_timeout() {
        Error::timeout(
            format!("Request timed out: {e}"),
            Some(budget.as_secs_f64()),
        )
    } else if e.is_connect() {
        Error::connection(e.to_string(), Some(Box::new(e)))
    } else {
        Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
    }
}

/// Process a non-success response and convert it to our Error type.
async fn process_error_response(response: Response) -> Error {
    let status_code = response.status().as_u16();

    // OpenAI-style error body
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
    }

    let error_body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            );
        }
    };

    let detail = serde_json::from_str::<ErrorResponse>(&error_body)
        .ok()
        .and_then(|parsed| parsed.error);
    let error_type = detail.as_ref().and_then(|d| d.error_type.clone());
    let error_message = detail
        .and_then(|d| d.message)
        .unwrap_or_else(|| error_body.trim().to_string());

    match status_code {
        401 => Error::authentication(error_message),
        408 => Error::timeout(error_message, None),
        _ => Error::api(status_code, error_type, error_message),
    }
}
