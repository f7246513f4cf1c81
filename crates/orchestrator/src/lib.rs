//! Turn orchestration: retrieval, streamed generation, coalesced rendering
//! and the bounded conversation history that ties turns together.

pub mod cancel;
pub mod history;
pub mod renderer;
pub mod session;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::CancellationToken;
pub use history::{ConversationTurn, SessionHistory, MAX_TURNS};
pub use renderer::{CoalescingRenderer, RENDER_INTERVAL};
pub use session::Session;
pub use turn::{RetrievalResult, Turn, TurnInput, TurnOutcome, TurnPhase};
