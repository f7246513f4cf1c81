//! Line-oriented block grammar.
//!
//! Block kinds: code fence, table, heading, rule, quote, list item, paragraph.
//! Each line is classified once; quotes and paragraphs accumulate until a
//! different kind of line (or a blank line) closes them.

use std::sync::LazyLock;

use regex::Regex;
use shared::document::{Block, Inline, ListMarker};

use crate::inline::parse_inline;
use crate::table::{self, TableFlush, TableState};

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,4})\s+(.*)$").expect("valid heading pattern"));
static RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:-\s*){3,}|(?:\*\s*){3,}|(?:_\s*){3,})$").expect("valid rule pattern")
});
static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,9})\.\s+(.*)$").expect("valid ordered item pattern"));
static BULLET_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*+]\s+(.*)$").expect("valid bullet item pattern"));

struct CodeFence {
    language: Option<String>,
    lines: Vec<String>,
}

#[derive(Default)]
struct BlockParser {
    blocks: Vec<Block>,
    paragraph: Vec<String>,
    quote: Vec<String>,
    code: Option<CodeFence>,
    table: TableState,
}

/// Split text into blocks.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut parser = BlockParser::default();
    for line in text.lines() {
        parser.feed(line);
    }
    parser.finish()
}

impl BlockParser {
    fn feed(&mut self, line: &str) {
        if let Some(fence) = self.code.as_mut() {
            if line.trim_start().starts_with("```") {
                self.close_code();
            } else {
                fence.lines.push(line.to_string());
            }
            return;
        }

        if table::is_table_row(line) {
            self.flush_paragraph();
            self.flush_quote();
            self.table.push_row(line);
            return;
        }

        self.flush_table();
        self.feed_plain(line);
    }

    fn feed_plain(&mut self, line: &str) {
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("```") {
            self.flush_text();
            let language = rest.trim();
            self.code = Some(CodeFence {
                language: (!language.is_empty()).then(|| language.to_string()),
                lines: Vec::new(),
            });
            return;
        }

        if trimmed.is_empty() {
            self.flush_text();
            return;
        }

        if let Some(caps) = HEADING.captures(trimmed) {
            self.flush_text();
            let level = caps[1].len() as u8;
            self.blocks.push(Block::Heading {
                level,
                inlines: parse_inline(caps[2].trim_end()),
            });
            return;
        }

        if RULE.is_match(trimmed) {
            self.flush_text();
            self.blocks.push(Block::Rule);
            return;
        }

        if let Some(rest) = trimmed.strip_prefix('>') {
            self.flush_paragraph();
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            self.quote.push(rest.to_string());
            return;
        }

        if let Some((marker, rest)) = list_item(trimmed) {
            self.flush_text();
            self.blocks.push(Block::ListItem {
                marker,
                inlines: parse_inline(rest),
            });
            return;
        }

        self.flush_quote();
        self.paragraph.push(trimmed.to_string());
    }

    fn close_code(&mut self) {
        if let Some(fence) = self.code.take() {
            self.blocks.push(Block::Code {
                language: fence.language,
                code: fence.lines.join("\n"),
            });
        }
    }

    fn flush_table(&mut self) {
        match self.table.finish() {
            TableFlush::Nothing => {}
            TableFlush::Table(block) => self.blocks.push(block),
            TableFlush::Stray(lines) => {
                for line in lines {
                    self.feed_plain(&line);
                }
            }
        }
    }

    fn flush_text(&mut self) {
        self.flush_paragraph();
        self.flush_quote();
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let lines = std::mem::take(&mut self.paragraph);
        self.blocks.push(Block::Paragraph(join_lines(&lines)));
    }

    fn flush_quote(&mut self) {
        if self.quote.is_empty() {
            return;
        }
        let lines = std::mem::take(&mut self.quote);
        self.blocks
            .push(Block::Quote(lines.iter().map(|l| parse_inline(l)).collect()));
    }

    fn finish(mut self) -> Vec<Block> {
        // An unterminated fence is still streaming in; show what we have.
        self.close_code();
        self.flush_table();
        self.flush_text();
        self.blocks
    }
}

fn list_item(line: &str) -> Option<(ListMarker, &str)> {
    if let Some(caps) = ORDERED_ITEM.captures(line) {
        let n = caps[1].parse().ok()?;
        let rest = caps.get(2).map_or("", |m| m.as_str());
        return Some((ListMarker::Ordered(n), rest));
    }
    let caps = BULLET_ITEM.captures(line)?;
    let rest = caps.get(1).map_or("", |m| m.as_str());
    Some((ListMarker::Bullet, rest))
}

/// Paragraph lines are kept on separate lines within one paragraph.
fn join_lines(lines: &[String]) -> Vec<Inline> {
    let mut out = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push(Inline::LineBreak);
        }
        out.extend(parse_inline(line));
    }
    out
}
