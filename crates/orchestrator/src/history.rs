//! Bounded per-session conversation history used as generation context.

use shared::agent_api::{ChatMessage, Role};

/// Three question/answer pairs.
pub const MAX_TURNS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Default, Clone)]
pub struct SessionHistory {
    turns: Vec<ConversationTurn>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a question/answer pair, dropping the oldest pairs past the cap.
    /// Returns false when the pair repeats the last one stored.
    pub fn append(&mut self, question: &str, answer: &str) -> bool {
        if self.last_pair() == Some((question, answer)) {
            tracing::debug!("skipping duplicate history pair");
            return false;
        }
        self.turns.push(ConversationTurn {
            role: Role::User,
            content: question.to_string(),
        });
        self.turns.push(ConversationTurn {
            role: Role::Assistant,
            content: answer.to_string(),
        });
        if self.turns.len() > MAX_TURNS {
            let excess = self.turns.len() - MAX_TURNS;
            self.turns.drain(..excess);
        }
        true
    }

    fn last_pair(&self) -> Option<(&str, &str)> {
        match self.turns.as_slice() {
            [.., q, a] if q.role == Role::User && a.role == Role::Assistant => {
                Some((q.content.as_str(), a.content.as_str()))
            }
            _ => None,
        }
    }

    /// Ordered turns, oldest first, as chat messages.
    pub fn to_context(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .map(|t| ChatMessage {
                role: t.role,
                content: t.content.clone(),
            })
            .collect()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
