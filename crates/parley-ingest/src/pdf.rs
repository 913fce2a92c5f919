use lopdf::Document;
use parley_core::{ParleyError, ParleyResult};
use tracing::debug;

/// Extracts text page by page. Each page with text contributes its text
/// followed by a newline; pages without text are skipped.
pub fn extract_pdf_text(bytes: &[u8]) -> ParleyResult<String> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| ParleyError::Ingest(format!("Failed to read PDF: {e}")))?;

    let pages = doc.get_pages();
    let mut text = String::new();
    for page_number in pages.keys() {
        let page_text = doc.extract_text(&[*page_number]).map_err(|e| {
            ParleyError::Ingest(format!("Failed to extract text from page {page_number}: {e}"))
        })?;
        if page_text.trim().is_empty() {
            continue;
        }
        text.push_str(&page_text);
        text.push('\n');
    }

    debug!(pages = pages.len(), chars = text.len(), "PDF text extracted");
    Ok(text)
}
