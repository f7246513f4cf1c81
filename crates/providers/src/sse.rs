/// Line-delimited streaming parser for chat-completion responses.
///
/// Stream format: one event per line, `data: {json}`, ending with `data: [DONE]`.
/// Blank lines and lines without the `data:` prefix are ignored.
use serde::Deserialize;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

/// Reassembles complete lines from raw byte chunks.
///
/// Bytes are buffered rather than decoded per chunk, so a multi-byte
/// character split across chunks still decodes correctly.
#[derive(Debug, Default)]
pub struct LineReassembler {
    tail: Vec<u8>,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the HTTP response. Returns every line completed by this chunk;
    /// the unterminated remainder is held for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.tail.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.tail[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.tail[start..end]));
            start = end + 1;
        }
        self.tail.drain(..start);
        lines
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.tail.len()
    }

    /// Take the unterminated remainder at end of stream.
    pub fn take_tail(&mut self) -> Option<String> {
        if self.tail.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.tail);
        Some(decode_line(&tail))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(bytes);
    let text: &str = &decoded;
    text.strip_suffix('\r').unwrap_or(text).to_string()
}

/// Meaning of one complete line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
    Ignored,
}

// Accepted payloads: `{choices:[{delta:{content}}]}` or `{content}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeltaPayload {
    Choices { choices: Vec<StreamChoice> },
    Content { content: Option<String> },
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl DeltaPayload {
    fn into_text(self) -> Option<String> {
        match self {
            DeltaPayload::Choices { choices } => choices
                .into_iter()
                .next()
                .and_then(|c| c.delta)
                .and_then(|d| d.content),
            DeltaPayload::Content { content } => content,
        }
    }
}

/// Classify a complete line. Malformed payloads are logged and skipped.
pub fn parse_line(line: &str) -> StreamEvent {
    if line.trim().is_empty() {
        return StreamEvent::Ignored;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return StreamEvent::Ignored;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim() == DONE_SENTINEL {
        return StreamEvent::Done;
    }

    match serde_json::from_str::<DeltaPayload>(payload) {
        Ok(delta) => match delta.into_text() {
            Some(text) if !text.is_empty() => StreamEvent::Delta(text),
            _ => StreamEvent::Ignored,
        },
        Err(e) => {
            tracing::warn!(error = %e, payload_len = payload.len(), "skipping malformed stream payload");
            StreamEvent::Ignored
        }
    }
}

/// Outcome of ingesting one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ingested {
    /// New text was appended.
    pub appended: bool,
    /// The stream reached its end.
    pub complete: bool,
}

/// Per-turn stream state: reassembly tail plus the accumulated answer.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    lines: LineReassembler,
    accumulated: String,
    complete: bool,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, chunk: &[u8]) -> Ingested {
        let mut appended = false;
        if !self.complete {
            for line in self.lines.feed(chunk) {
                appended |= self.apply(&line);
                if self.complete {
                    break;
                }
            }
        }
        Ingested {
            appended,
            complete: self.complete,
        }
    }

    /// Transport ended. Parses any unterminated final line and marks the stream complete.
    pub fn finish(&mut self) -> Ingested {
        let mut appended = false;
        if !self.complete {
            if let Some(line) = self.lines.take_tail() {
                appended = self.apply(&line);
            }
            self.complete = true;
        }
        Ingested {
            appended,
            complete: true,
        }
    }

    fn apply(&mut self, line: &str) -> bool {
        match parse_line(line) {
            StreamEvent::Delta(text) => {
                self.accumulated.push_str(&text);
                true
            }
            StreamEvent::Done => {
                self.complete = true;
                false
            }
            StreamEvent::Ignored => false,
        }
    }

    pub fn text(&self) -> &str {
        &self.accumulated
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn into_text(self) -> String {
        self.accumulated
    }
}
