/// Anthropic Messages API.
pub mod claude;

use crate::llm::{ChatRequest, Completion};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use parley_core::ParleyResult;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Receiver for stream events plus the task that assembles the completion.
///
/// Dropping both abandons the stream.
pub type StreamHandle = (
    mpsc::Receiver<StreamEvent>,
    JoinHandle<ParleyResult<Completion>>,
);

/// Trait for model provider backends.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `LlmBackend` for your struct
/// 3. Hand it to `LlmClient::from_backend`
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Streaming chat completion.
    ///
    /// Errors before the first byte (connection, non-2xx status) are returned
    /// directly; errors mid-stream are sent as [`StreamEvent::Error`] and
    /// returned from the join handle.
    async fn chat_stream(&self, request: &ChatRequest) -> ParleyResult<StreamHandle>;
}
