//! Inline span parsing: `**bold**`, `*italic*`, `` `code` ``, `[text](url)`, `<br>`.
//!
//! Spans are non-greedy: each opener pairs with the first matching closer.
//! An opener with no closer is kept as literal text.

use std::sync::LazyLock;

use regex::Regex;
use shared::document::Inline;

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^<br\s*/?>").expect("valid line break pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Bold,      // **
    Italic,    // *
    Code,      // `
    Link,      // [
    LineBreak, // <br>
}

impl MarkerKind {
    fn len(self) -> usize {
        match self {
            MarkerKind::Bold => 2,
            _ => 1,
        }
    }
}

/// Parse a single block's text into inline spans.
pub fn parse_inline(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut remaining = text;
    // A `[` can only open a link if some `](` follows it.
    let last_link = text.rfind("](");

    while !remaining.is_empty() {
        let offset = text.len() - remaining.len();
        let link_limit = last_link.and_then(|p| p.checked_sub(offset));
        let Some((pos, kind)) = find_next_marker(remaining, link_limit) else {
            push_text(&mut out, remaining);
            break;
        };

        push_text(&mut out, &remaining[..pos]);
        let rest = &remaining[pos..];
        match consume(rest, kind) {
            Some((inline, used)) => {
                out.push(inline);
                remaining = &rest[used..];
            }
            None => {
                // Unmatched opener: keep it literally and move past it
                push_text(&mut out, &rest[..kind.len()]);
                remaining = &rest[kind.len()..];
            }
        }
    }

    out
}

/// Flatten spans back to their visible text.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut s = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(t) | Inline::Bold(t) | Inline::Italic(t) | Inline::Code(t) => {
                s.push_str(t)
            }
            Inline::Link { text, .. } => s.push_str(text),
            Inline::LineBreak => s.push('\n'),
        }
    }
    s
}

/// `link_limit` is the byte offset of the last `](` in `text`, if any.
fn find_next_marker(text: &str, link_limit: Option<usize>) -> Option<(usize, MarkerKind)> {
    for (i, c) in text.char_indices() {
        let rest = &text[i..];
        match c {
            '*' if rest.starts_with("**") => return Some((i, MarkerKind::Bold)),
            '*' => return Some((i, MarkerKind::Italic)),
            '`' => return Some((i, MarkerKind::Code)),
            '[' if link_limit.is_some_and(|end| end > i) => return Some((i, MarkerKind::Link)),
            '<' if LINE_BREAK.is_match(rest) => return Some((i, MarkerKind::LineBreak)),
            _ => {}
        }
    }
    None
}

/// Try to read one complete span at the start of `rest`.
/// Returns the span and the number of bytes it covered.
fn consume(rest: &str, kind: MarkerKind) -> Option<(Inline, usize)> {
    match kind {
        MarkerKind::Bold => {
            let body = &rest[2..];
            let end = body.find("**")?;
            let inner = &body[..end];
            if inner.trim().is_empty() {
                return None;
            }
            Some((Inline::Bold(inner.to_string()), end + 4))
        }
        MarkerKind::Italic => {
            let body = &rest[1..];
            let end = body.find('*')?;
            let inner = &body[..end];
            // "2 * 3 * 4" is arithmetic, not emphasis
            if inner.is_empty()
                || inner.starts_with(char::is_whitespace)
                || inner.ends_with(char::is_whitespace)
            {
                return None;
            }
            Some((Inline::Italic(inner.to_string()), end + 2))
        }
        MarkerKind::Code => {
            let body = &rest[1..];
            let end = body.find('`')?;
            if end == 0 {
                return None;
            }
            Some((Inline::Code(body[..end].to_string()), end + 2))
        }
        MarkerKind::Link => {
            let body = &rest[1..];
            let close_bracket = body.find(']')?;
            let text = &body[..close_bracket];
            let after = body[close_bracket + 1..].strip_prefix('(')?;
            let close_paren = after.find(')')?;
            let url = after[..close_paren].trim();
            if text.contains(['\n', '['])
                || url.is_empty()
                || url.contains(char::is_whitespace)
            {
                return None;
            }
            let used = 1 + close_bracket + 2 + close_paren + 1;
            Some((
                Inline::Link {
                    text: text.to_string(),
                    url: url.to_string(),
                },
                used,
            ))
        }
        MarkerKind::LineBreak => {
            let m = LINE_BREAK.find(rest)?;
            Some((Inline::LineBreak, m.end()))
        }
    }
}

fn push_text(out: &mut Vec<Inline>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text(prev)) = out.last_mut() {
        prev.push_str(text);
    } else {
        out.push(Inline::Text(text.to_string()));
    }
}
