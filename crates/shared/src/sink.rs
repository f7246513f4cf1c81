//! Output sink: three independent display channels per turn.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ErrorPanel;

pub const PREVIEW_CHARS: usize = 120;

/// Contents of the tip channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tip {
    Status(String),
    Error(ErrorPanel),
}

impl Tip {
    pub fn status(text: impl Into<String>) -> Self {
        Tip::Status(text.into())
    }
}

/// One retrieved knowledge snippet shown in the reference channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// 1-based position in the retrieval result.
    pub index: usize,
    pub preview: String,
    pub full_text: String,
    pub expanded: bool,
}

impl Reference {
    pub fn new(index: usize, full_text: impl Into<String>) -> Self {
        let full_text = full_text.into();
        Self {
            index,
            preview: truncate_preview(&full_text, PREVIEW_CHARS),
            full_text,
            expanded: false,
        }
    }

    pub fn toggle(&mut self) {
        self.expanded = !self.expanded;
    }

    pub fn display_text(&self) -> &str {
        if self.expanded {
            &self.full_text
        } else {
            &self.preview
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.preview != self.full_text
    }
}

/// Build references for a retrieval result, numbered from 1.
pub fn references_from(items: &[String]) -> Vec<Reference> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| Reference::new(i + 1, item.clone()))
        .collect()
}

/// Truncate on a char boundary, appending an ellipsis when shortened.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => format!("{}…", &text[..byte_idx]),
    }
}

/// Rendering target for a turn. Any frontend (terminal, web view, log) implements it.
pub trait OutputSink: Send + Sync {
    fn tip(&self, tip: &Tip);
    fn content(&self, document: &Document);
    fn references(&self, references: &[Reference]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_not_truncated() {
        let r = Reference::new(1, "short snippet");
        assert_eq!(r.preview, "short snippet");
        assert!(!r.is_truncated());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let text = "é".repeat(PREVIEW_CHARS + 5);
        let r = Reference::new(2, text.clone());
        assert!(r.is_truncated());
        assert_eq!(r.preview.chars().count(), PREVIEW_CHARS + 1);
        assert!(r.preview.ends_with('…'));
        assert_eq!(r.full_text, text);
    }

    #[test]
    fn test_toggle_switches_display_text() {
        let mut r = Reference::new(1, "x".repeat(300));
        assert_eq!(r.display_text(), r.preview);
        r.toggle();
        assert_eq!(r.display_text().len(), 300);
        r.toggle();
        assert!(!r.expanded);
    }

    #[test]
    fn test_references_are_numbered_in_order() {
        let refs = references_from(&["a".to_string(), "b".to_string()]);
        assert_eq!(refs[0].index, 1);
        assert_eq!(refs[1].full_text, "b");
    }
}
