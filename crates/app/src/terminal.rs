//! Terminal output sink.
//!
//! Content goes to stdout; tips and references go to stderr so piping the
//! answer elsewhere keeps only the answer.

use std::io::{self, Write};

use formatter::render_plain;
use parking_lot::Mutex;
use shared::document::Document;
use shared::error::ErrorPanel;
use shared::sink::{OutputSink, Reference, Tip};

#[derive(Default)]
pub struct TerminalSink {
    /// Plain rendering already on screen for the current turn.
    printed: Mutex<String>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close off the current answer so the next turn starts on a fresh line.
    pub fn end_turn(&self) {
        let mut printed = self.printed.lock();
        close_line(&mut printed);
        printed.clear();
    }
}

/// Terminate a partially printed answer line before anything else hits the terminal.
fn close_line(printed: &mut String) {
    if !printed.is_empty() && !printed.ends_with('\n') {
        println!();
        printed.push('\n');
    }
}

/// What to write to move the screen from `printed` to `next`.
///
/// Appending only the new suffix is the common case. When the formatter
/// rewrote earlier output (a table closed, a paragraph became a heading),
/// the whole rendering is written again on a new line.
pub fn next_write<'a>(printed: &str, next: &'a str) -> Option<std::borrow::Cow<'a, str>> {
    if next == printed {
        return None;
    }
    match next.strip_prefix(printed) {
        Some(suffix) => Some(suffix.into()),
        None => Some(format!("\n{}", next).into()),
    }
}

fn panel_lines(panel: &ErrorPanel) -> Vec<String> {
    let mut lines = vec![format!("✗ {}", panel.title), format!("  {}", panel.message)];
    lines.extend(panel.hints.iter().map(|h| format!("  - {}", h)));
    lines
}

impl OutputSink for TerminalSink {
    fn tip(&self, tip: &Tip) {
        close_line(&mut self.printed.lock());
        match tip {
            Tip::Status(text) => eprintln!("· {}", text),
            Tip::Error(panel) => {
                for line in panel_lines(panel) {
                    eprintln!("{}", line);
                }
            }
        }
    }

    fn content(&self, document: &Document) {
        let rendered = render_plain(document);
        let mut printed = self.printed.lock();
        if let Some(chunk) = next_write(&printed, &rendered) {
            let mut out = io::stdout().lock();
            if let Err(e) = out.write_all(chunk.as_bytes()).and_then(|_| out.flush()) {
                tracing::debug!(error = %e, "stdout write failed");
            }
            *printed = rendered;
        }
    }

    fn references(&self, references: &[Reference]) {
        if references.is_empty() {
            return;
        }
        self.end_turn();
        eprintln!("References:");
        for reference in references {
            eprintln!("  [{}] {}", reference.index, reference.display_text());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::document::Block;
    use shared::error::{CallError, StageError};

    #[test]
    fn test_extension_writes_suffix_only() {
        assert_eq!(next_write("Hel", "Hello").as_deref(), Some("lo"));
        assert_eq!(next_write("", "Hi").as_deref(), Some("Hi"));
        assert_eq!(next_write("same", "same"), None);
    }

    #[test]
    fn test_rewrite_starts_new_line() {
        assert_eq!(
            next_write("| a | b", "a | b\n-|-").as_deref(),
            Some("\na | b\n-|-")
        );
    }

    #[test]
    fn test_status_tip_follows_a_closed_line() {
        let sink = TerminalSink::new();
        sink.content(&Document::new(vec![Block::Preformatted("Hello".into())]));
        assert_eq!(*sink.printed.lock(), "Hello");

        sink.tip(&Tip::status("Done"));
        assert_eq!(*sink.printed.lock(), "Hello\n");

        sink.end_turn();
        assert!(sink.printed.lock().is_empty());
    }

    #[test]
    fn test_tip_before_content_prints_no_blank_line() {
        let sink = TerminalSink::new();
        sink.tip(&Tip::status("Generating answer…"));
        assert!(sink.printed.lock().is_empty());
    }

    #[test]
    fn test_error_panel_lists_hints() {
        let panel = StageError::model(CallError::HttpStatus {
            status: 401,
            message: "bad key".into(),
        })
        .panel();
        let lines = panel_lines(&panel);
        assert!(lines[0].starts_with("✗ "));
        assert!(lines[1].contains("bad key"));
        assert_eq!(lines.len(), 2 + panel.hints.len());
    }
}
