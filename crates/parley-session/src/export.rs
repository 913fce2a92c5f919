//! Markdown export of the visible transcript.
//!
//! Each turn is rendered as `**User**: …` or `**Assistant**: …`, and turns are
//! separated by a blank line. [`parse_markdown`] reverses the rendering; a
//! turn boundary is a role label at the very start of the document or right
//! after a blank line. A label inside an entry that would look like a turn
//! boundary is written with an extra leading backslash (`\**User**: `) and
//! unescaped on parse.

use chrono::NaiveDate;
use parley_core::{Role, TranscriptEntry};

const ROLES: [Role; 2] = [Role::User, Role::Assistant];
const TURN_SEPARATOR: &str = "\n\n";

fn marker(role: Role) -> String {
    format!("**{}**: ", role.label())
}

/// Adds (`escape == true`) or removes one backslash in front of every role
/// label that follows a blank line, counting labels already preceded by
/// backslashes so the mapping stays reversible.
fn shift_label_escapes(content: &str, escape: bool) -> String {
    let markers: Vec<String> = ROLES.iter().map(|r| marker(*r)).collect();
    let bytes = content.as_bytes();
    let mut out = String::with_capacity(content.len());
    let mut copied = 0;

    for pos in (2..=content.len()).filter(|&p| &bytes[p - 2..p] == b"\n\n") {
        let rest = &content[pos..];
        let slashes = rest.len() - rest.trim_start_matches('\\').len();
        if !markers.iter().any(|m| rest[slashes..].starts_with(m.as_str())) {
            continue;
        }
        out.push_str(&content[copied..pos]);
        copied = pos;
        if escape {
            out.push('\\');
        } else if slashes > 0 {
            copied += 1;
        }
    }
    out.push_str(&content[copied..]);
    out
}

/// Renders entries as a role-labeled markdown document.
pub fn render_markdown(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}{}", marker(e.role), shift_label_escapes(&e.content, true)))
        .collect::<Vec<_>>()
        .join(TURN_SEPARATOR)
}

/// Download name for an export made on `date`, e.g. `conversation-20250301.md`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("conversation-{}.md", date.format("%Y%m%d"))
}

/// Recovers the `(role, content)` sequence from a rendered export.
pub fn parse_markdown(text: &str) -> Vec<(Role, String)> {
    let markers: Vec<(Role, String)> = ROLES.iter().map(|r| (*r, marker(*r))).collect();
    let bytes = text.as_bytes();

    // (turn start, role, content start)
    let mut boundaries: Vec<(usize, Role, usize)> = Vec::new();
    for start in 0..=text.len() {
        let at_turn_start = start == 0 || (start >= 2 && &bytes[start - 2..start] == b"\n\n");
        if !at_turn_start {
            continue;
        }
        let rest = &text[start..];
        if let Some((role, m)) = markers.iter().find(|(_, m)| rest.starts_with(m.as_str())) {
            boundaries.push((start, *role, start + m.len()));
        }
    }

    boundaries
        .iter()
        .enumerate()
        .map(|(i, (_, role, content_start))| {
            let end = boundaries
                .get(i + 1)
                .map_or(text.len(), |(next, _, _)| next - TURN_SEPARATOR.len());
            (*role, shift_label_escapes(&text[*content_start..end], false))
        })
        .collect()
}
