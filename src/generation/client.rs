//! Chat completion clients for OpenAI-compatible endpoints.
//!
//! One trait serves every generation task; tasks differ only in the request
//! they assemble (messages, temperature, token budget, response format).

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Settings;
use crate::embeddings::backoff;
use crate::types::RagError;

/// One message on the completion wire.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// A fully assembled completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the endpoint to constrain output to a JSON object.
    pub json_response: bool,
}

/// Issues chat completions, blocking or streamed.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Returns the full completion text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, RagError>;

    /// Streams completion fragments in emission order.
    ///
    /// Dropping the receiver cancels the underlying request.
    async fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<flume::Receiver<Result<String, RagError>>, RagError>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
///
/// Transient failures (timeouts, 429, 5xx) are retried with exponential
/// backoff up to the configured retry budget, same discipline as the
/// embedding client.
#[derive(Clone)]
pub struct OpenAiChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: usize,
}

impl OpenAiChatClient {
    pub fn new(settings: &Settings) -> Result<Self, RagError> {
        if settings.api_key.trim().is_empty() {
            return Err(RagError::Config("missing completion API key".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|err| RagError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                settings.api_base.trim_end_matches('/')
            ),
            api_key: settings.api_key.clone(),
            model: settings.chat_model.clone(),
            max_retries: settings.max_retries,
        })
    }

    fn body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if request.json_response {
            body["response_format"] = json!({"type": "json_object"});
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, RagError> {
        let body = self.body(request, stream);
        let mut attempt = 0usize;
        loop {
            let outcome = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match outcome {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if retryable && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    let detail = resp.text().await.unwrap_or_default();
                    return Err(RagError::Completion(format!(
                        "endpoint returned {status}: {detail}"
                    )));
                }
                Err(err) => {
                    let retryable = err.is_timeout() || err.is_connect();
                    if retryable && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(RagError::Completion(err.to_string()));
                }
            }
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, RagError> {
        let resp = self.send(&request, false).await?;
        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|err| RagError::Completion(err.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.map(|m| m.content))
            .ok_or_else(|| RagError::Completion("endpoint returned no choices".into()))
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<flume::Receiver<Result<String, RagError>>, RagError> {
        let resp = self.send(&request, true).await?;
        let (tx, rx) = flume::bounded(32);

        // A failed send means the receiver is gone; the task returns and the
        // response body is dropped, cancelling the upstream request.
        tokio::spawn(async move {
            let mut body = resp.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        let _ = tx
                            .send_async(Err(RagError::Completion(err.to_string())))
                            .await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(boundary) = buffer.find("\n\n") {
                    let event = buffer[..boundary].to_string();
                    buffer.drain(..boundary + 2);
                    for fragment in sse_event_fragments(&event) {
                        if fragment == SSE_DONE {
                            return;
                        }
                        if let Some(delta) = delta_content(&fragment) {
                            if tx.send_async(Ok(delta)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}

const SSE_DONE: &str = "[DONE]";

/// Extracts the `data:` payloads from one server-sent event block.
fn sse_event_fragments(event: &str) -> Vec<String> {
    event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|payload| payload.trim().to_string())
        .collect()
}

/// Pulls the delta text out of one streamed completion payload, if any.
fn delta_content(payload: &str) -> Option<String> {
    let parsed: StreamChunk = serde_json::from_str(payload).ok()?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty())
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Scripted client for tests: replies are consumed in order.
#[derive(Default)]
pub struct MockChatClient {
    replies: parking_lot::Mutex<std::collections::VecDeque<String>>,
    requests: parking_lot::Mutex<Vec<CompletionRequest>>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        let client = Self::default();
        client.push_reply(reply);
        client
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(reply.into());
    }

    /// Requests seen so far, for asserting on assembled prompts.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    fn next_reply(&self) -> Result<String, RagError> {
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| RagError::Completion("mock client has no scripted reply".into()))
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, RagError> {
        self.requests.lock().push(request);
        self.next_reply()
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<flume::Receiver<Result<String, RagError>>, RagError> {
        self.requests.lock().push(request);
        let reply = self.next_reply()?;
        let (tx, rx) = flume::unbounded();
        // Word-sized fragments exercise reassembly without a live endpoint.
        for fragment in reply.split_inclusive(' ') {
            let _ = tx.send(Ok(fragment.to_string()));
        }
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn settings_for(base: String) -> Settings {
        Settings {
            api_key: "test-key".into(),
            api_base: base,
            chat_model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
            embedding_dimensions: 3,
            namespace: "test".into(),
            similarity_threshold: 0.25,
            upsert_batch_size: 100,
            max_retries: 3,
            mcq_option_count: 4,
            request_timeout_secs: 5,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::user("hello")],
            temperature: 0.7,
            max_tokens: 100,
            json_response: false,
        }
    }

    #[tokio::test]
    async fn complete_returns_first_choice_content() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "the answer"}}]
                }));
            })
            .await;

        let client = OpenAiChatClient::new(&settings_for(server.base_url())).unwrap();
        let text = client.complete(request()).await.unwrap();
        assert_eq!(text, "the answer");
    }

    #[tokio::test]
    async fn server_error_surfaces_after_retries() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(503).body("overloaded");
            })
            .await;

        let client = OpenAiChatClient::new(&settings_for(server.base_url())).unwrap();
        let err = client.complete(request()).await.unwrap_err();
        assert!(matches!(err, RagError::Completion(_)));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn stream_parses_sse_deltas_in_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body(concat!(
                        "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
                        "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
                        "data: [DONE]\n\n",
                    ));
            })
            .await;

        let client = OpenAiChatClient::new(&settings_for(server.base_url())).unwrap();
        let rx = client.complete_stream(request()).await.unwrap();
        let mut assembled = String::new();
        while let Ok(fragment) = rx.recv_async().await {
            assembled.push_str(&fragment.unwrap());
        }
        assert_eq!(assembled, "Hello world");
    }

    #[tokio::test]
    async fn mock_stream_reassembles_to_reply() {
        let client = MockChatClient::with_reply("one two three");
        let rx = client.complete_stream(request()).await.unwrap();
        let mut assembled = String::new();
        while let Ok(fragment) = rx.recv_async().await {
            assembled.push_str(&fragment.unwrap());
        }
        assert_eq!(assembled, "one two three");
    }

    #[test]
    fn sse_done_sentinel_is_detected() {
        let fragments = sse_event_fragments("data: [DONE]");
        assert_eq!(fragments, vec!["[DONE]".to_string()]);
    }
}
