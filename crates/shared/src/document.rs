//! Structured document produced by the block formatter.

use serde::{Deserialize, Serialize};

/// Inline span inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inline {
    Text(String),
    Bold(String),
    Italic(String),
    Code(String),
    /// Rendered so it opens in a new browsing context.
    Link { text: String, url: String },
    LineBreak,
}

/// Table cell, row, and list of rows.
pub type Cell = Vec<Inline>;
pub type Row = Vec<Cell>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListMarker {
    Bullet,
    Ordered(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    /// Text with no markup at all, kept byte for byte.
    Preformatted(String),
    Heading { level: u8, inlines: Vec<Inline> },
    Table { header: Option<Row>, rows: Vec<Row> },
    Code { language: Option<String>, code: String },
    /// One entry per quoted line.
    Quote(Vec<Vec<Inline>>),
    ListItem { marker: ListMarker, inlines: Vec<Inline> },
    Rule,
    Paragraph(Vec<Inline>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
