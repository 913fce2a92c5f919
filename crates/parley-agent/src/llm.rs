use crate::backends::claude::ClaudeBackend;
use crate::backends::{LlmBackend, StreamHandle};
use crate::config::{ClientConfig, InferenceConfig};
use parley_core::{ParleyResult, TranscriptEntry};
use parley_session::ChatSession;
use std::sync::Arc;

/// Everything the model API needs for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// API model id.
    pub model_id: String,
    /// Rendered system prompt. Omitted from the body when empty.
    pub system: String,
    /// Full transcript, hidden entries included.
    pub messages: Vec<TranscriptEntry>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Set only when extended thinking is on.
    pub thinking_budget: Option<u32>,
}

impl ChatRequest {
    /// Builds a request from the session's full transcript, its model, and
    /// already merged inference parameters.
    pub fn for_session(session: &ChatSession, system: String, params: InferenceConfig) -> Self {
        Self {
            model_id: session.settings.model.api_id().to_string(),
            system,
            messages: session.full().to_vec(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            thinking_budget: params.thinking_budget,
        }
    }
}

/// The assembled result of a finished stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Concatenated text deltas.
    pub text: String,
    /// Reported by `message_delta`, if any.
    pub stop_reason: Option<String>,
}

/// Model API client that dispatches to a provider backend.
///
/// Uses the `LlmBackend` trait so tests and alternative providers can plug in
/// without touching the dispatcher.
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn LlmBackend>,
}

impl LlmClient {
    /// Client backed by the Claude API.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            backend: Arc::new(ClaudeBackend::new(config)),
        }
    }

    /// Create from a pre-built backend (for custom providers and tests).
    pub fn from_backend(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// Streaming chat completion.
    ///
    /// Returns a receiver that yields events as the model generates its
    /// response, plus a handle resolving to the assembled [`Completion`].
    pub async fn chat_stream(&self, request: &ChatRequest) -> ParleyResult<StreamHandle> {
        self.backend.chat_stream(request).await
    }
}
