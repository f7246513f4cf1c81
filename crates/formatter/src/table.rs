//! Table state machine.
//!
//! A line is a table row when, trimmed, it starts and ends with `|`.
//! Two or more consecutive rows make a table; a lone row is handed back
//! to the caller as ordinary text.

use shared::document::{Block, Row};

use crate::inline::parse_inline;

pub fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.len() >= 2 && t.starts_with('|') && t.ends_with('|')
}

/// `|---|:---:|` style divider between header and body.
pub fn is_separator_row(line: &str) -> bool {
    let t = line.trim();
    t.contains('-') && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

/// Result of closing the current run of rows.
#[derive(Debug, PartialEq)]
pub enum TableFlush {
    Nothing,
    Table(Block),
    /// A single row that never became a table.
    Stray(Vec<String>),
}

#[derive(Debug, Default)]
pub struct TableState {
    in_table: bool,
    collected: Vec<String>,
}

impl TableState {
    pub fn push_row(&mut self, line: &str) {
        self.collected.push(line.trim().to_string());
        if self.collected.len() >= 2 {
            self.in_table = true;
        }
    }

    pub fn in_table(&self) -> bool {
        self.in_table
    }

    pub fn is_collecting(&self) -> bool {
        !self.collected.is_empty()
    }

    /// Close the current run and reset.
    pub fn finish(&mut self) -> TableFlush {
        let lines = std::mem::take(&mut self.collected);
        let was_table = std::mem::take(&mut self.in_table);
        if lines.is_empty() {
            TableFlush::Nothing
        } else if !was_table {
            TableFlush::Stray(lines)
        } else {
            TableFlush::Table(build_table(&lines))
        }
    }
}

fn build_table(lines: &[String]) -> Block {
    if lines.len() >= 2 && is_separator_row(&lines[1]) {
        Block::Table {
            header: Some(split_cells(&lines[0])),
            rows: lines[2..].iter().map(|l| split_cells(l)).collect(),
        }
    } else {
        Block::Table {
            header: None,
            rows: lines.iter().map(|l| split_cells(l)).collect(),
        }
    }
}

fn split_cells(line: &str) -> Row {
    let t = line.trim();
    let t = t.strip_prefix('|').unwrap_or(t);
    let t = t.strip_suffix('|').unwrap_or(t);
    t.split('|').map(|cell| parse_inline(cell.trim())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::document::Inline;

    fn cell(s: &str) -> Vec<Inline> {
        vec![Inline::Text(s.to_string())]
    }

    #[test]
    fn test_row_detection() {
        assert!(is_table_row("  |a|b|  "));
        assert!(!is_table_row("|a|b"));
        assert!(!is_table_row("|"));
        assert!(is_separator_row("| --- | :---: |"));
        assert!(!is_separator_row("|a|b|"));
        assert!(!is_separator_row("| | |"));
    }

    #[test]
    fn test_header_and_body() {
        let mut state = TableState::default();
        for l in ["|A|B|", "|---|---|", "|1|2|"] {
            state.push_row(l);
        }
        assert!(state.in_table());
        let flushed = state.finish();
        assert_eq!(
            flushed,
            TableFlush::Table(Block::Table {
                header: Some(vec![cell("A"), cell("B")]),
                rows: vec![vec![cell("1"), cell("2")]],
            })
        );
        assert!(!state.in_table());
        assert!(!state.is_collecting());
    }

    #[test]
    fn test_no_separator_means_no_header() {
        let mut state = TableState::default();
        state.push_row("|a|b|");
        state.push_row("|c|d|");
        match state.finish() {
            TableFlush::Table(Block::Table { header, rows }) => {
                assert!(header.is_none());
                assert_eq!(rows.len(), 2);
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_single_row_is_stray() {
        let mut state = TableState::default();
        state.push_row("|only|");
        assert_eq!(state.finish(), TableFlush::Stray(vec!["|only|".to_string()]));
        assert_eq!(state.finish(), TableFlush::Nothing);
    }

    #[test]
    fn test_cell_keeps_line_breaks() {
        let mut state = TableState::default();
        state.push_row("|k|v|");
        state.push_row("|x|one<br>two|");
        let TableFlush::Table(Block::Table { rows, .. }) = state.finish() else {
            panic!("expected table");
        };
        assert_eq!(
            rows[1][1],
            vec![
                Inline::Text("one".into()),
                Inline::LineBreak,
                Inline::Text("two".into())
            ]
        );
    }
}
