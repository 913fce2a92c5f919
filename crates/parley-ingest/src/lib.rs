//! Turns uploaded documents into plain text for the hidden file context.
//!
//! Dispatch is by declared content type (see [`FileKind::detect`]). Decode and
//! parse failures are returned to the caller; unsupported kinds yield an empty
//! string.

/// Content-type detection.
pub mod kind;
/// PDF text extraction.
pub mod pdf;

pub use kind::{content_type_for_path, FileKind, OCTET_STREAM};

use parley_core::ParleyResult;
use std::path::Path;
use tracing::info;

/// An uploaded file: declared type, name and raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// File name as uploaded.
    pub name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Raw contents.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// File from its name, declared type and bytes.
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, declaring its type from the extension.
    pub fn from_path(path: &Path) -> ParleyResult<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, content_type_for_path(path), bytes))
    }

    /// Kind detected from the declared type.
    pub fn kind(&self) -> FileKind {
        FileKind::detect(&self.content_type, &self.name)
    }
}

/// Extracts the text of an uploaded file.
///
/// Returns an empty string for unsupported kinds.
pub fn read_file(file: &UploadedFile) -> ParleyResult<String> {
    let kind = file.kind();
    let text = match kind {
        FileKind::Pdf => pdf::extract_pdf_text(&file.bytes)?,
        FileKind::Text => String::from_utf8(file.bytes.clone())?,
        FileKind::Json => {
            let value: serde_json::Value = serde_json::from_slice(&file.bytes)?;
            serde_json::to_string(&value)?
        }
        FileKind::Unsupported => String::new(),
    };

    info!(
        file = %file.name,
        kind = ?kind,
        bytes = file.bytes.len(),
        chars = text.len(),
        "File ingested"
    );
    Ok(text)
}
