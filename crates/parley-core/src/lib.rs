//! Core types and error definitions for Parley.
//!
//! This crate provides the foundational types shared across all Parley crates,
//! including error handling, transcript entries and the enumerated model and
//! response-style selections.
//!
//! # Main types
//!
//! - [`ParleyError`]: Unified error enum for all Parley subsystems.
//! - [`ParleyResult`]: Convenience alias for `Result<T, ParleyError>`.
//! - [`Role`]: Transcript role (user or assistant).
//! - [`TranscriptEntry`]: A single role-tagged turn in a conversation.
//! - [`ModelChoice`]: The finite set of selectable models.
//! - [`ResponseStyle`]: Normal, concise or custom response style.

/// Model and response-style selections.
pub mod selection;

pub use selection::{ModelChoice, ResponseStyle, CONCISE_DIRECTIVE};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Error types ---

/// Top-level error type for Parley.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// An uploaded document could not be decoded.
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// An error related to session lookup or state.
    #[error("Session error: {0}")]
    Session(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A prompt template failed to load or render.
    #[error("Template error: {0}")]
    Template(String),

    /// An error from an outbound HTTP request (the model API).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The model API reported an error in the middle of a stream.
    #[error("Stream error: {0}")]
    Stream(String),

    /// An error from the HTTP/WebSocket gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Uploaded bytes were not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`ParleyError`].
pub type ParleyResult<T> = Result<T, ParleyError>;

// --- Transcript types ---

/// Label prepended to the hidden entry that carries uploaded file text.
pub const FILE_CONTEXT_LABEL: &str = "[Uploaded file context]";

/// The role of the participant that authored a [`TranscriptEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human end-user.
    User,
    /// The AI assistant.
    Assistant,
}

impl Role {
    /// Lowercase wire name, as sent to the model API.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Capitalized display label used in exported transcripts.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged turn in a conversation.
///
/// The same entry (same `id`) is shared by the visible and the full transcript
/// when it is shown to the user. Hidden entries only ever live in the full
/// transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Unique identifier for this entry.
    pub id: Uuid,
    /// The role of the entry author.
    pub role: Role,
    /// The textual content of the entry.
    pub content: String,
    /// Whether the entry is kept out of the visible transcript.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    /// UTC timestamp of when the entry was created.
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    /// Creates a visible entry with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            hidden: false,
            timestamp: Utc::now(),
        }
    }

    /// Creates a visible entry with [`Role::User`].
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a visible entry with [`Role::Assistant`].
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates the hidden user entry that carries uploaded file text.
    pub fn file_context(combined: &str) -> Self {
        let mut entry = Self::user(format!("{FILE_CONTEXT_LABEL}\n{combined}"));
        entry.hidden = true;
        entry
    }

    /// Returns true for the hidden uploaded-file-context entry.
    pub fn is_file_context(&self) -> bool {
        self.hidden && self.content.starts_with(FILE_CONTEXT_LABEL)
    }
}
