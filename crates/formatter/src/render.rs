//! Document renderers: HTML for web views, plain text for terminals.

use std::fmt::Write;

use shared::document::{Block, Document, Inline, ListMarker, Row};

use crate::inline::plain_text;

pub fn render_html(doc: &Document) -> String {
    let mut out = String::new();
    let mut open_list: Option<&'static str> = None;

    for block in &doc.blocks {
        let list_tag = match block {
            Block::ListItem { marker: ListMarker::Bullet, .. } => Some("ul"),
            Block::ListItem { marker: ListMarker::Ordered(_), .. } => Some("ol"),
            _ => None,
        };
        if open_list != list_tag {
            if let Some(tag) = open_list {
                let _ = write!(out, "</{}>", tag);
            }
            if let Some(tag) = list_tag {
                let _ = write!(out, "<{}>", tag);
            }
            open_list = list_tag;
        }

        match block {
            Block::Preformatted(text) => {
                let _ = write!(out, "<pre>{}</pre>", escape(text));
            }
            Block::Heading { level, inlines } => {
                let _ = write!(out, "<h{0}>{1}</h{0}>", level, html_inlines(inlines));
            }
            Block::Table { header, rows } => {
                out.push_str("<table>");
                if let Some(header) = header {
                    out.push_str("<thead>");
                    html_row(&mut out, header, "th");
                    out.push_str("</thead>");
                }
                out.push_str("<tbody>");
                for row in rows {
                    html_row(&mut out, row, "td");
                }
                out.push_str("</tbody></table>");
            }
            Block::Code { language, code } => match language {
                Some(lang) => {
                    let _ = write!(
                        out,
                        "<pre><code class=\"language-{}\">{}</code></pre>",
                        escape(lang),
                        escape(code)
                    );
                }
                None => {
                    let _ = write!(out, "<pre><code>{}</code></pre>", escape(code));
                }
            },
            Block::Quote(lines) => {
                let body: Vec<String> = lines.iter().map(|l| html_inlines(l)).collect();
                let _ = write!(out, "<blockquote>{}</blockquote>", body.join("<br>"));
            }
            Block::ListItem { marker, inlines } => match marker {
                ListMarker::Ordered(n) => {
                    let _ = write!(out, "<li value=\"{}\">{}</li>", n, html_inlines(inlines));
                }
                ListMarker::Bullet => {
                    let _ = write!(out, "<li>{}</li>", html_inlines(inlines));
                }
            },
            Block::Rule => out.push_str("<hr>"),
            Block::Paragraph(inlines) => {
                let _ = write!(out, "<p>{}</p>", html_inlines(inlines));
            }
        }
    }
    if let Some(tag) = open_list {
        let _ = write!(out, "</{}>", tag);
    }
    out
}

pub fn render_plain(doc: &Document) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(doc.blocks.len());
    for block in &doc.blocks {
        match block {
            Block::Preformatted(text) => lines.push(text.clone()),
            Block::Heading { inlines, .. } => lines.push(plain_text(inlines)),
            Block::Table { header, rows } => {
                if let Some(header) = header {
                    let cells = plain_row(header);
                    lines.push(cells.join(" | "));
                    lines.push(
                        cells
                            .iter()
                            .map(|c| "-".repeat(c.chars().count().max(3)))
                            .collect::<Vec<_>>()
                            .join("-|-"),
                    );
                }
                for row in rows {
                    lines.push(plain_row(row).join(" | "));
                }
            }
            Block::Code { code, .. } => lines.push(code.clone()),
            Block::Quote(quote) => {
                for l in quote {
                    lines.push(format!("> {}", plain_text(l)));
                }
            }
            Block::ListItem { marker, inlines } => match marker {
                ListMarker::Bullet => lines.push(format!("• {}", plain_text(inlines))),
                ListMarker::Ordered(n) => lines.push(format!("{}. {}", n, plain_text(inlines))),
            },
            Block::Rule => lines.push("────────".to_string()),
            Block::Paragraph(inlines) => lines.push(plain_text(inlines)),
        }
    }
    lines.join("\n")
}

fn plain_row(row: &Row) -> Vec<String> {
    row.iter()
        .map(|cell| plain_text(cell).replace('\n', " "))
        .collect()
}

fn html_row(out: &mut String, row: &Row, tag: &str) {
    out.push_str("<tr>");
    for cell in row {
        let _ = write!(out, "<{0}>{1}</{0}>", tag, html_inlines(cell));
    }
    out.push_str("</tr>");
}

fn html_inlines(inlines: &[Inline]) -> String {
    let mut s = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(t) => s.push_str(&escape(t)),
            Inline::Bold(t) => {
                let _ = write!(s, "<strong>{}</strong>", escape(t));
            }
            Inline::Italic(t) => {
                let _ = write!(s, "<em>{}</em>", escape(t));
            }
            Inline::Code(t) => {
                let _ = write!(s, "<code>{}</code>", escape(t));
            }
            Inline::Link { text, url } if is_safe_url(url) => {
                let _ = write!(
                    s,
                    "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
                    escape(url),
                    escape(text)
                );
            }
            Inline::Link { text, .. } => s.push_str(&escape(text)),
            Inline::LineBreak => s.push_str("<br>"),
        }
    }
    s
}

fn is_safe_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    match lower.split_once(':') {
        Some((scheme, _)) if !scheme.contains('/') => {
            matches!(scheme, "http" | "https" | "mailto")
        }
        _ => true,
    }
}

fn escape(text: &str) -> String {
    let mut s = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => s.push_str("&amp;"),
            '<' => s.push_str("&lt;"),
            '>' => s.push_str("&gt;"),
            '"' => s.push_str("&quot;"),
            '\'' => s.push_str("&#39;"),
            _ => s.push(c),
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_document;

    #[test]
    fn test_plain_hello() {
        assert_eq!(render_plain(&format_document("Hello")), "Hello");
    }

    #[test]
    fn test_html_escapes_preformatted() {
        let html = render_html(&format_document("a < b & c"));
        assert_eq!(html, "<pre>a &lt; b &amp; c</pre>");
    }

    #[test]
    fn test_html_table() {
        let html = render_html(&format_document("|A|B|\n|---|---|\n|1|2|"));
        assert_eq!(
            html,
            "<table><thead><tr><th>A</th><th>B</th></tr></thead>\
             <tbody><tr><td>1</td><td>2</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_html_links_open_in_new_context() {
        let html = render_html(&format_document("**see** [x](https://e.com)"));
        assert!(html.contains("target=\"_blank\""));
        assert!(html.contains("href=\"https://e.com\""));
    }

    #[test]
    fn test_html_drops_script_links() {
        let html = render_html(&format_document("**a** [x](javascript:alert(1))"));
        assert!(!html.contains("href"));
    }

    #[test]
    fn test_html_groups_list_items() {
        let html = render_html(&format_document("**L**\n- a\n- b\n1. c"));
        assert_eq!(
            html,
            "<p><strong>L</strong></p><ul><li>a</li><li>b</li></ul><ol><li value=\"1\">c</li></ol>"
        );
    }

    #[test]
    fn test_plain_table_and_heading() {
        let plain = render_plain(&format_document("## T\n|A|B|\n|---|---|\n|1|2|"));
        assert_eq!(plain, "T\nA | B\n----|----\n1 | 2");
    }
}
