//! Plain-text helpers shared by the pipeline and the semantic adapter.

use crate::extraction::Paragraph;

/// Join paragraph contents with newlines, keeping the order reported by the extractor.
pub fn flatten_paragraphs(paragraphs: &[Paragraph]) -> String {
    paragraphs
        .iter()
        .map(|paragraph| paragraph.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
