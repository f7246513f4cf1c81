//! Trailing-edge coalescing of content renders.
//!
//! At most one render per interval. A value submitted too soon is parked as
//! the single pending value (replacing any older one) and flushed when the
//! interval expires. `finish` always renders the final text.

use std::time::Duration;

use formatter::BlockFormatter;
use shared::sink::OutputSink;
use tokio::time::Instant;

use crate::cancel::CancellationToken;

pub const RENDER_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct RenderState {
    last_rendered_text: Option<String>,
    last_update: Option<Instant>,
    /// Most recent superseded value; older ones are dropped, not queued.
    pending: Option<String>,
}

pub struct CoalescingRenderer<'a> {
    sink: &'a dyn OutputSink,
    token: CancellationToken,
    formatter: BlockFormatter,
    interval: Duration,
    state: RenderState,
    renders: usize,
}

impl<'a> CoalescingRenderer<'a> {
    pub fn new(sink: &'a dyn OutputSink, token: CancellationToken, interval: Duration) -> Self {
        Self {
            sink,
            token,
            formatter: BlockFormatter::new(),
            interval,
            state: RenderState::default(),
            renders: 0,
        }
    }

    /// Offer the latest accumulated text. Returns true if it was rendered now.
    pub fn submit(&mut self, text: &str) -> bool {
        if self.token.is_stopped() {
            return false;
        }
        if self.state.last_rendered_text.as_deref() == Some(text) {
            self.state.pending = None;
            return false;
        }
        let now = Instant::now();
        match self.state.last_update {
            Some(last) if now.duration_since(last) < self.interval => {
                self.state.pending = Some(text.to_string());
                false
            }
            _ => {
                self.state.pending = None;
                self.render(text, now);
                true
            }
        }
    }

    /// When the parked value becomes due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.state.pending.as_ref()?;
        let last = self.state.last_update?;
        Some(last + self.interval)
    }

    /// Render the parked value, if any.
    pub fn flush_pending(&mut self) -> bool {
        let Some(text) = self.state.pending.take() else {
            return false;
        };
        if self.token.is_stopped() {
            return false;
        }
        self.render(&text, Instant::now());
        true
    }

    /// Render the final text, bypassing the interval.
    pub fn finish(&mut self, text: &str) {
        self.state.pending = None;
        if self.token.is_stopped() {
            return;
        }
        self.render(text, Instant::now());
    }

    pub fn renders(&self) -> usize {
        self.renders
    }

    fn render(&mut self, text: &str, now: Instant) {
        if self.token.is_stopped() {
            return;
        }
        let doc = self.formatter.format(text);
        self.sink.content(doc);
        self.state.last_rendered_text = Some(text.to_string());
        self.state.last_update = Some(now);
        self.renders += 1;
        tracing::trace!(len = text.len(), blocks = doc.blocks.len(), "rendered content");
    }
}
