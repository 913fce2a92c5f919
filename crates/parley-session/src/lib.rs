//! Conversation state for Parley.
//!
//! A [`ChatSession`] holds the visible and full transcripts, the buffer of
//! uploaded file text, and the per-session [`ChatSettings`]. Sessions live in
//! a [`SessionStore`] keyed by id, and [`render_markdown`] produces the
//! downloadable export.

/// Markdown export.
pub mod export;
/// Session state and transcripts.
pub mod session;
/// Model and inference selections.
pub mod settings;
/// Session storage.
pub mod store;

pub use export::{export_file_name, parse_markdown, render_markdown};
pub use session::ChatSession;
pub use settings::ChatSettings;
pub use store::{InMemorySessionStore, SessionStore, SharedSession};
