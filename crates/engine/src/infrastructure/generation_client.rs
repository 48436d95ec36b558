//! Streaming client for OpenAI-compatible chat completion APIs.
//!
//! Reads the `text/event-stream` body, yielding the `delta.content` of every
//! `data:` event until `data: [DONE]`.

use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::infrastructure::config::GenerationConfig;
use crate::infrastructure::http_errors::{
    is_transient_send_error, is_transient_status, status_message,
};
use crate::infrastructure::ports::{GenerationError, GenerationPort, TokenStream};

/// Client for an OpenAI-compatible streaming completions endpoint.
#[derive(Clone)]
pub struct OpenAiStreamClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiStreamClient {
    pub fn new(config: &GenerationConfig) -> Self {
        // No total timeout: a long generation is bounded by the idle timeout instead.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

const SYSTEM_PROMPT: &str =
    "You are a marketing copywriter. Produce publish-ready text without commentary.";

#[async_trait]
impl GenerationPort for OpenAiStreamClient {
    async fn stream_tokens(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<TokenStream, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens,
            temperature: self.temperature,
            stream: true,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if is_transient_send_error(&e) {
                GenerationError::Transient(e.to_string())
            } else {
                GenerationError::Terminal(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = status_message(status, &body);
            return Err(if is_transient_status(status) {
                GenerationError::Transient(message)
            } else {
                GenerationError::Terminal(message)
            });
        }

        Ok(Box::pin(sse_fragments(response.bytes_stream())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SseEvent {
    Fragment(String),
    Done,
}

/// Splits a byte stream into complete lines and decodes `data:` events.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = Self::decode_line(line.trim_end_matches(['\n', '\r'])) {
                events.push(event);
            }
        }
        events
    }

    fn decode_line(line: &str) -> Option<SseEvent> {
        let data = line.strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            return Some(SseEvent::Done);
        }
        match serde_json::from_str::<ChatChunk>(data) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .filter(|text| !text.is_empty())
                .map(SseEvent::Fragment),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparseable stream event");
                None
            }
        }
    }
}

/// Adapt a raw response body into a stream of text fragments.
///
/// A body that ends without `[DONE]` is treated as complete.
fn sse_fragments<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, GenerationError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = (
        Box::pin(bytes),
        SseDecoder::default(),
        VecDeque::<String>::new(),
        false,
    );

    stream::unfold(state, |(mut bytes, mut decoder, mut pending, mut done)| async move {
        loop {
            if let Some(fragment) = pending.pop_front() {
                return Some((Ok(fragment), (bytes, decoder, pending, done)));
            }
            if done {
                return None;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in decoder.push(chunk.as_ref()) {
                        match event {
                            SseEvent::Fragment(text) => pending.push_back(text),
                            SseEvent::Done => {
                                done = true;
                                break;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    let error = GenerationError::Transient(format!("stream interrupted: {}", e));
                    return Some((Err(error), (bytes, decoder, pending, true)));
                }
                None => done = true,
            }
        }
    })
}
