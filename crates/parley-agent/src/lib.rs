//! Model access and message dispatch for Parley.
//!
//! Talks to the Claude Messages API over server-sent events, renders system
//! prompts from templates, and runs one conversation turn at a time against a
//! [`parley_session::ChatSession`].

/// Provider backends behind the [`backends::LlmBackend`] trait.
pub mod backends;
/// API connection and inference defaults.
pub mod config;
/// Turn orchestration.
pub mod dispatcher;
/// Request and client types.
pub mod llm;
/// System prompt templates.
pub mod prompt;
/// Streaming events.
pub mod stream;

pub use backends::{LlmBackend, StreamHandle};
pub use config::{ClientConfig, InferenceConfig, API_KEY_ENV};
pub use dispatcher::{MessageDispatcher, TurnOutcome};
pub use llm::{ChatRequest, Completion, LlmClient};
pub use prompt::PromptRenderer;
pub use stream::StreamEvent;
