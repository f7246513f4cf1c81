//! Turns accumulated answer text into a structured [`Document`].
//!
//! Handles the subset of Markdown that models actually produce:
//! - `# Heading` through `#### Heading`
//! - `|`-delimited tables, with an optional `|---|` header divider
//! - fenced code blocks and `` `inline code` ``
//! - `**bold**` and `*italic*`
//! - `---` rules, `- item` / `1. item` lists, `> quote` runs
//! - `[text](url)` links
//!
//! Text with none of the block or emphasis markers is kept verbatim.

pub mod blocks;
pub mod inline;
pub mod render;
pub mod table;

pub use render::{render_html, render_plain};
use shared::document::{Block, Document};

/// Substrings that switch the formatter off its verbatim fast path.
const MARKERS: [&str; 5] = ["**", "`", "#", "---", "___"];

/// Format raw text into a document. Pure; see [`BlockFormatter`] for the cached form.
pub fn format_document(text: &str) -> Document {
    if text.is_empty() {
        return Document::default();
    }
    if !MARKERS.iter().any(|m| text.contains(m)) {
        return Document::new(vec![Block::Preformatted(text.to_string())]);
    }
    Document::new(blocks::parse_blocks(text))
}

/// Formatter with a single-slot cache of the last input and output.
#[derive(Debug, Default)]
pub struct BlockFormatter {
    last_input: Option<String>,
    last_output: Document,
}

impl BlockFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&mut self, text: &str) -> &Document {
        if self.last_input.as_deref() == Some(text) {
            tracing::trace!(len = text.len(), "format cache hit");
        } else {
            self.last_output = format_document(text);
            self.last_input = Some(text.to_string());
        }
        &self.last_output
    }
}
