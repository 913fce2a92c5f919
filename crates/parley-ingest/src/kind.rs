use std::path::Path;

/// Declared type browsers use when they do not know better.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Document kinds the ingester knows how to turn into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// PDF, text extracted page by page.
    Pdf,
    /// Plain text or markdown, decoded as UTF-8.
    Text,
    /// JSON, re-serialized compactly.
    Json,
    /// Anything else. Silently ignored.
    Unsupported,
}

impl FileKind {
    /// Picks a kind from the declared content type, falling back to the file
    /// extension only when the declared type is the generic octet-stream.
    pub fn detect(content_type: &str, name: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "application/pdf" => FileKind::Pdf,
            "text/plain" | "text/markdown" => FileKind::Text,
            "application/json" => FileKind::Json,
            OCTET_STREAM if name.ends_with(".txt") || name.ends_with(".md") => FileKind::Text,
            _ => FileKind::Unsupported,
        }
    }
}

/// Declared content type for a file on disk, from its extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("json") => "application/json",
        _ => OCTET_STREAM,
    }
}
