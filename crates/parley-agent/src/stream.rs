use serde::{Deserialize, Serialize};

/// Events emitted during a streaming model response.
///
/// These events allow consumers (the WebSocket handler, the terminal REPL) to
/// render partial results in arrival order while the model is still
/// generating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of answer text.
    TextDelta { text: String },

    /// A chunk of extended-thinking text. Shown, never recorded.
    ThinkingDelta { text: String },

    /// The stream has finished successfully.
    Done,

    /// An error occurred during streaming.
    Error { message: String },
}
