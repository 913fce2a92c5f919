use crate::settings::ChatSettings;
use chrono::{DateTime, Utc};
use parley_core::TranscriptEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conversation state for one browser session.
///
/// Two transcripts are kept side by side: `visible` is what the user sees and
/// exports, `full` is what gets sent to the model. Every visible entry is also
/// in `full`, in the same relative order; `full` may additionally hold hidden
/// entries (the uploaded file context).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Session id.
    pub id: Uuid,
    visible: Vec<TranscriptEntry>,
    full: Vec<TranscriptEntry>,
    file_context: Vec<String>,
    file_injected: bool,
    /// Selections used for the next request.
    pub settings: ChatSettings,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Empty session with default settings.
    pub fn new() -> Self {
        Self::with_settings(ChatSettings::default())
    }

    /// Empty session starting from `settings`.
    pub fn with_settings(settings: ChatSettings) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            visible: Vec::new(),
            full: Vec::new(),
            file_context: Vec::new(),
            file_injected: false,
            settings,
            created_at: now,
            updated_at: now,
        }
    }

    /// "New chat": drops both transcripts, the upload buffer and the
    /// injected flag. Settings are kept.
    pub fn reset(&mut self) {
        self.visible.clear();
        self.full.clear();
        self.file_context.clear();
        self.file_injected = false;
        self.touch();
    }

    /// Appends a user turn to both transcripts.
    pub fn append_user(&mut self, text: impl Into<String>) -> &TranscriptEntry {
        self.append_shared(TranscriptEntry::user(text))
    }

    /// Appends an assistant turn to both transcripts.
    pub fn append_assistant(&mut self, text: impl Into<String>) -> &TranscriptEntry {
        self.append_shared(TranscriptEntry::assistant(text))
    }

    fn append_shared(&mut self, entry: TranscriptEntry) -> &TranscriptEntry {
        self.full.push(entry.clone());
        self.visible.push(entry);
        self.touch();
        &self.visible[self.visible.len() - 1]
    }

    /// Buffers decoded upload text. Empty text is ignored.
    pub fn buffer_file_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.is_empty() {
            return false;
        }
        self.file_context.push(text);
        self.touch();
        true
    }

    /// Appends the buffered file text to the full transcript as a single
    /// hidden user entry, once per session/clear cycle.
    ///
    /// Returns `true` when an entry was injected.
    pub fn inject_file_context(&mut self) -> bool {
        if self.file_context.is_empty() || self.file_injected {
            return false;
        }
        let combined = self.file_context.join("\n");
        self.full.push(TranscriptEntry::file_context(&combined));
        self.file_injected = true;
        self.touch();
        true
    }

    /// What the user sees and exports.
    pub fn visible(&self) -> &[TranscriptEntry] {
        &self.visible
    }

    /// What is sent to the model.
    pub fn full(&self) -> &[TranscriptEntry] {
        &self.full
    }

    /// Buffered text of uploaded files.
    pub fn file_context(&self) -> &[String] {
        &self.file_context
    }

    /// Whether the buffer has been added to `full`.
    pub fn is_file_injected(&self) -> bool {
        self.file_injected
    }

    /// Checks that `visible` is an order-preserving subsequence of `full`
    /// and that everything only present in `full` is hidden.
    pub fn is_consistent(&self) -> bool {
        let mut visible = self.visible.iter().peekable();
        for entry in &self.full {
            match visible.peek() {
                Some(v) if v.id == entry.id => {
                    visible.next();
                }
                _ if entry.hidden => {}
                _ => return false,
            }
        }
        visible.next().is_none()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use parley_core::Role;

    #[test]
    fn new_session_is_empty() {
        let session = ChatSession::new();
        assert!(session.visible().is_empty());
        assert!(session.full().is_empty());
        assert!(session.file_context().is_empty());
        assert!(!session.is_file_injected());
        assert!(session.is_consistent());
    }

    #[test]
    fn appends_share_one_entry() {
        let mut session = ChatSession::new();
        let id = session.append_user("hi").id;
        session.append_assistant("hello");

        assert_eq!(session.visible().len(), 2);
        assert_eq!(session.full().len(), 2);
        assert_eq!(session.full()[0].id, id);
        assert_eq!(session.visible()[1].role, Role::Assistant);
        assert!(session.is_consistent());
    }

    #[test]
    fn injection_is_idempotent() {
        let mut session = ChatSession::new();
        session.buffer_file_text("a");
        session.buffer_file_text("b");

        assert!(session.inject_file_context());
        assert!(!session.inject_file_context());

        let hidden: Vec<_> = session.full().iter().filter(|e| e.hidden).collect();
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden[0].content, "[Uploaded file context]\na\nb");
        assert!(session.visible().is_empty());
        assert!(session.is_consistent());
    }

    #[test]
    fn injection_requires_buffered_text() {
        let mut session = ChatSession::new();
        assert!(!session.buffer_file_text(""));
        assert!(!session.inject_file_context());
        assert!(!session.is_file_injected());
        assert!(session.full().is_empty());
    }

    #[test]
    fn files_after_injection_wait_for_reset() {
        let mut session = ChatSession::new();
        session.buffer_file_text("first");
        session.inject_file_context();
        session.buffer_file_text("second");

        assert!(!session.inject_file_context());
        assert_eq!(session.file_context().len(), 2);
        assert_eq!(session.full().len(), 1);
    }

    #[test]
    fn reset_clears_conversation_but_keeps_settings() {
        let mut session = ChatSession::new();
        session.settings.temperature = 0.9;
        session.buffer_file_text("doc");
        session.inject_file_context();
        session.append_user("q");
        session.append_assistant("a");

        session.reset();

        assert!(session.visible().is_empty());
        assert!(session.full().is_empty());
        assert!(session.file_context().is_empty());
        assert!(!session.is_file_injected());
        assert_eq!(session.settings.temperature, 0.9);

        session.buffer_file_text("again");
        assert!(session.inject_file_context());
    }

    #[test]
    fn consistency_detects_reordering() {
        let mut session = ChatSession::new();
        session.append_user("one");
        session.append_user("two");
        session.visible.swap(0, 1);
        assert!(!session.is_consistent());
    }

    #[test]
    fn consistency_detects_visible_only_entry() {
        let mut session = ChatSession::new();
        session.append_user("one");
        session.visible.push(TranscriptEntry::assistant("ghost"));
        assert!(!session.is_consistent());
    }
}
