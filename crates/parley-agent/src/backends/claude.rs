use super::{LlmBackend, StreamHandle};
use crate::config::ClientConfig;
use crate::llm::{ChatRequest, Completion};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use futures_util::StreamExt;
use parley_core::{ParleyError, ParleyResult, TranscriptEntry};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude (Anthropic) Messages API backend.
pub struct ClaudeBackend {
    config: ClientConfig,
    http: reqwest::Client,
}

impl ClaudeBackend {
    /// Backend using `config` for the key and base URL.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

/// JSON body for a streaming Messages API call.
pub fn request_body(request: &ChatRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": request.model_id,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "messages": wire_messages(&request.messages),
        "stream": true,
    });

    if !request.system.is_empty() {
        body["system"] = serde_json::json!(request.system);
    }

    if let Some(budget) = request.thinking_budget {
        body["thinking"] = serde_json::json!({
            "type": "enabled",
            "budget_tokens": budget,
        });
    }

    body
}

/// Converts transcript entries to API turns. Consecutive entries with the same
/// role are joined with a blank line since the API requires alternation.
fn wire_messages(entries: &[TranscriptEntry]) -> Vec<ClaudeMessage> {
    let mut out: Vec<ClaudeMessage> = Vec::with_capacity(entries.len());
    for entry in entries {
        match out.last_mut() {
            Some(last) if last.role == entry.role.as_str() => {
                last.content.push_str("\n\n");
                last.content.push_str(&entry.content);
            }
            _ => out.push(ClaudeMessage {
                role: entry.role.as_str(),
                content: entry.content.clone(),
            }),
        }
    }
    out
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    async fn chat_stream(&self, request: &ChatRequest) -> ParleyResult<StreamHandle> {
        let url = format!("{}/v1/messages", self.config.base_url());
        let body = request_body(request);

        debug!(
            model = %request.model_id,
            messages = request.messages.len(),
            thinking = request.thinking_budget.is_some(),
            "Sending streaming request"
        );

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ParleyError::Http(format!(
                "Claude API error {status}: {error_body}"
            )));
        }

        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut stream = byte_stream;
            let mut lines = LineBuffer::default();
            let mut decoder = SseDecoder::default();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let message = format!("Stream read error: {e}");
                        let _ = tx
                            .send(StreamEvent::Error {
                                message: message.clone(),
                            })
                            .await;
                        return Err(ParleyError::Stream(message));
                    }
                };

                for line in lines.push(&chunk) {
                    let Some(event) = decoder.feed_line(&line) else {
                        continue;
                    };
                    let failure = match &event {
                        StreamEvent::Error { message } => Some(message.clone()),
                        _ => None,
                    };
                    let _ = tx.send(event).await;
                    if let Some(message) = failure {
                        warn!(error = %message, "Claude stream reported an error");
                        return Err(ParleyError::Stream(message));
                    }
                }
            }

            decoder.finish()
        });

        Ok((rx, handle))
    }
}

/// Splits a byte stream into trimmed text lines.
///
/// Bytes are held until a `\n` arrives, so a character split across network
/// chunks is decoded whole.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends `chunk` and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            match String::from_utf8(raw) {
                Ok(line) => lines.push(line.trim().to_string()),
                Err(e) => warn!(error = %e, "Skipping non-UTF-8 stream line"),
            }
        }
        lines
    }
}

/// Incremental decoder for the Messages API event stream.
///
/// Fed one line at a time; `event:` lines are ignored because every `data:`
/// payload carries its own `type`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    text: String,
    stop_reason: Option<String>,
    stopped: bool,
}

impl SseDecoder {
    /// Handles one trimmed line and returns the event to forward, if any.
    pub fn feed_line(&mut self, line: &str) -> Option<StreamEvent> {
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        let data = line.strip_prefix("data:")?.trim_start();
        let event: serde_json::Value = serde_json::from_str(data).ok()?;
        self.handle_event(&event)
    }

    fn handle_event(&mut self, event: &serde_json::Value) -> Option<StreamEvent> {
        match event["type"].as_str().unwrap_or("") {
            "content_block_delta" => {
                let delta = &event["delta"];
                match delta["type"].as_str().unwrap_or("") {
                    "text_delta" => {
                        let text = delta["text"].as_str()?;
                        self.text.push_str(text);
                        Some(StreamEvent::TextDelta {
                            text: text.to_string(),
                        })
                    }
                    "thinking_delta" => {
                        let text = delta["thinking"].as_str()?;
                        Some(StreamEvent::ThinkingDelta {
                            text: text.to_string(),
                        })
                    }
                    _ => None,
                }
            }

            "message_delta" => {
                if let Some(sr) = event["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(sr.to_string());
                }
                None
            }

            "message_stop" => {
                if self.stopped {
                    return None;
                }
                self.stopped = true;
                Some(StreamEvent::Done)
            }

            "error" => {
                let error = &event["error"];
                let message = match (error["type"].as_str(), error["message"].as_str()) {
                    (Some(kind), Some(msg)) => format!("{kind}: {msg}"),
                    (None, Some(msg)) => msg.to_string(),
                    _ => "Claude stream error".to_string(),
                };
                Some(StreamEvent::Error { message })
            }

            _ => None,
        }
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Resolves the stream once the body has ended.
    pub fn finish(self) -> ParleyResult<Completion> {
        if !self.stopped {
            return Err(ParleyError::Stream(
                "Stream ended before message_stop".into(),
            ));
        }
        Ok(Completion {
            text: self.text,
            stop_reason: self.stop_reason,
        })
    }
}

// -- Claude wire types --

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: &'static str,
    content: String,
}
