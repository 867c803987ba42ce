//! # xAI Client
//!
//! [`VerdictProvider`] and [`ModelLister`] over the OpenAI-compatible xAI REST
//! API.
//!
//! - `POST {base}/chat/completions` with the persona as the system message, the
//!   JPEG as an `image_url` data URL, and the verdict schema as
//!   `response_format`. Streaming responses arrive as Server-Sent Events whose
//!   `choices[0].delta.content` deltas feed a [`PartialObjectDecoder`].
//! - `GET {base}/models` for the model directory.
//!
//! No retries. A non-2xx status becomes [`VerdictError::Provider`] carrying the
//! provider's own message when the body has one.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::pin::Pin;
use tracing::{debug, info, warn};

use super::models::{ModelEntry, ModelLister};
use super::provider::{JudgeRequest, PartialStream, ProviderConfig, VerdictProvider};
use super::sse::{SseEvent, SseLineBuffer};
use crate::error::{VerdictError, VerdictResult, classify};
use crate::verdict::{PartialObjectDecoder, PartialVerdict, Verdict, response_format};

/// HTTP client for the xAI API.
#[derive(Debug, Clone)]
pub struct XaiClient {
    http: Client,
    config: ProviderConfig,
}

impl XaiClient {
    pub fn new(config: ProviderConfig) -> VerdictResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| VerdictError::network("build HTTP client", e))?;
        Ok(Self { http, config })
    }

    /// Chat completion body for `request`.
    pub fn completion_body(request: &JudgeRequest, stream: bool) -> Value {
        json!({
            "model": request.model,
            "messages": [
                {
                    "role": "system",
                    "content": request.persona_prompt
                },
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "image_url",
                            "image_url": { "url": request.image.data_url() }
                        }
                    ]
                }
            ],
            "response_format": response_format(),
            "stream": stream
        })
    }

    async fn post_completion(&self, request: &JudgeRequest, stream: bool) -> VerdictResult<Response> {
        let url = self.config.endpoint("chat/completions");
        info!(
            model = %request.model,
            stream,
            image_bytes = request.image.jpeg.len(),
            "sending chat completion"
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&request.api_key)
            .json(&Self::completion_body(request, stream))
            .send()
            .await
            .map_err(|e| VerdictError::network("chat completion", e))?;
        ensure_success(response, "chat completion").await
    }
}

/// Pass 2xx through; turn anything else into a provider error.
async fn ensure_success(response: Response, operation: &str) -> VerdictResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = provider_error_message(&body);
    warn!(status = status.as_u16(), message = ?message, operation, "provider rejected request");
    Err(rejection(status.as_u16(), message, operation))
}

fn rejection(status: u16, message: Option<String>, operation: &str) -> VerdictError {
    let error = VerdictError::provider(status, message).with_operation(operation);
    if classify::is_auth_failure(&error) {
        error.with_recovery_suggestion("Check the saved key with `sop settings show`, or set a new one with `sop settings set --api-key <KEY>`")
    } else {
        error
    }
}

/// The provider's own error text from `error`, `error.message` or `message`.
pub fn provider_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let candidates = [
        value.get("error").and_then(Value::as_str),
        value.pointer("/error/message").and_then(Value::as_str),
        value.get("message").and_then(Value::as_str),
    ];
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|m| !m.is_empty())
        .map(str::to_string)
}

/// Text delta of one streamed chunk, or an error the provider sent in-band.
fn chunk_delta(payload: &str) -> VerdictResult<Option<String>> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| VerdictError::malformed(format!("invalid stream chunk: {e}")))?;
    if value.get("error").is_some() {
        return Err(VerdictError::provider(200, provider_error_message(payload)));
    }
    Ok(value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map(str::to_string))
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// State threaded through the snapshot stream.
struct StreamState {
    body: ByteStream,
    lines: SseLineBuffer,
    decoder: PartialObjectDecoder,
    transport_closed: bool,
    finished: bool,
}

impl StreamState {
    /// Feed one SSE event. Returns an item to emit, if any.
    fn handle(&mut self, event: SseEvent) -> Option<VerdictResult<PartialVerdict>> {
        match event {
            SseEvent::Done => {
                self.transport_closed = true;
                None
            }
            SseEvent::Data(payload) => match chunk_delta(&payload) {
                Ok(Some(delta)) => self.decoder.push(&delta).map(|snapshot| {
                    debug!(fields = snapshot.field_count(), "partial verdict");
                    Ok(snapshot)
                }),
                Ok(None) => None,
                Err(e) => {
                    self.finished = true;
                    Some(Err(e))
                }
            },
        }
    }

    /// Final check once no more text can arrive.
    fn close(&mut self) -> Option<VerdictResult<PartialVerdict>> {
        self.finished = true;
        match self.decoder.finish() {
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, received = self.decoder.buffer().len(), "stream ended without a complete verdict");
                Some(Err(e))
            }
        }
    }

    async fn next_item(&mut self) -> Option<VerdictResult<PartialVerdict>> {
        loop {
            if self.finished {
                return None;
            }
            while let Some(event) = self.lines.next_event() {
                if let Some(item) = self.handle(event) {
                    return Some(item);
                }
                if self.finished {
                    return None;
                }
            }
            if self.transport_closed {
                return self.close();
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.lines.extend(&chunk),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(VerdictError::network("read completion stream", e)));
                }
                None => {
                    self.transport_closed = true;
                    if let Some(item) = self.lines.flush().and_then(|event| self.handle(event)) {
                        return Some(item);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl VerdictProvider for XaiClient {
    async fn judge(&self, request: &JudgeRequest) -> VerdictResult<Verdict> {
        let response = self.post_completion(request, false).await?;
        let completion: Completion = response
            .json()
            .await
            .map_err(|e| VerdictError::malformed(format!("invalid completion body: {e}")))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| VerdictError::malformed("completion has no message content"))?;

        let mut decoder = PartialObjectDecoder::new();
        decoder.push(&content);
        let verdict = decoder.finish()?;
        info!(verdict = %verdict.verdict, rating = %verdict.rating, "verdict received");
        Ok(verdict)
    }

    async fn judge_stream(&self, request: &JudgeRequest) -> VerdictResult<PartialStream> {
        let response = self.post_completion(request, true).await?;
        let state = StreamState {
            body: Box::pin(response.bytes_stream()),
            lines: SseLineBuffer::new(),
            decoder: PartialObjectDecoder::new(),
            transport_closed: false,
            finished: false,
        };
        let snapshots = stream::unfold(state, |mut state| async move {
            let item = state.next_item().await?;
            Some((item, state))
        });
        Ok(Box::pin(snapshots))
    }

    fn name(&self) -> &str {
        "xai"
    }
}

#[async_trait]
impl ModelLister for XaiClient {
    async fn list_models(&self, api_key: &str) -> VerdictResult<Vec<ModelEntry>> {
        let url = self.config.endpoint("models");
        debug!(url = %url, "listing models");
        let response = self
            .http
            .get(&url)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| VerdictError::network("list models", e))?;
        let list: ModelList = ensure_success(response, "list models")
            .await?
            .json()
            .await
            .map_err(|e| VerdictError::malformed(format!("invalid model list: {e}")))?;
        info!(count = list.data.len(), "models listed");
        Ok(list.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HasRecoverySuggestion;
    use crate::processing::PreparedImage;
    use sop_scale::presets::Size;

    fn request() -> JudgeRequest {
        JudgeRequest {
            api_key: "xai-test".into(),
            model: "grok-4".into(),
            persona_prompt: "Be fair.".into(),
            image: PreparedImage {
                jpeg: vec![0xFF, 0xD8, 0xFF],
                size: Size::new(1, 1),
                source: Size::new(1, 1),
            },
        }
    }

    #[test]
    fn test_completion_body_shape() {
        let body = XaiClient::completion_body(&request(), true);
        assert_eq!(body["model"], "grok-4");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Be fair.");
        let part = &body["messages"][1]["content"][0];
        assert_eq!(part["type"], "image_url");
        assert_eq!(part["image_url"]["url"], "data:image/jpeg;base64,/9j/");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }

    #[test]
    fn test_provider_error_message_shapes() {
        assert_eq!(
            provider_error_message(r#"{"code":"x","error":"Incorrect API key provided"}"#).as_deref(),
            Some("Incorrect API key provided")
        );
        assert_eq!(
            provider_error_message(r#"{"error":{"message":"Model not found"}}"#).as_deref(),
            Some("Model not found")
        );
        assert_eq!(
            provider_error_message(r#"{"message":"rate limited"}"#).as_deref(),
            Some("rate limited")
        );
        assert_eq!(provider_error_message("<html>bad gateway</html>"), None);
        assert_eq!(provider_error_message(r#"{"error":""}"#), None);
    }

    #[test]
    fn test_chunk_delta() {
        let chunk = r#"{"choices":[{"index":0,"delta":{"content":"{\"ver"}}]}"#;
        assert_eq!(chunk_delta(chunk).unwrap().as_deref(), Some("{\"ver"));
        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(chunk_delta(role_only).unwrap(), None);
        assert_eq!(chunk_delta("not json").unwrap_err().category(), "malformed_response");
        assert_eq!(
            chunk_delta(r#"{"error":{"message":"overloaded"}}"#)
                .unwrap_err()
                .user_message(),
            "overloaded"
        );
    }

    #[test]
    fn test_rejection_context() {
        let denied = rejection(401, Some("Incorrect API key provided".into()), "list models");
        assert_eq!(denied.context().operation.as_deref(), Some("list models"));
        assert!(denied.recovery_suggestion().unwrap().contains("--api-key"));
        assert_eq!(denied.user_message(), "Incorrect API key provided");

        let overloaded = rejection(503, None, "chat completion");
        assert_eq!(overloaded.context().operation.as_deref(), Some("chat completion"));
        assert_eq!(overloaded.recovery_suggestion(), None);
    }

    #[test]
    fn test_new_without_timeout_names_itself() {
        let client = XaiClient::new(ProviderConfig::default()).unwrap();
        assert_eq!(client.name(), "xai");
    }
}
