//! Entries for the persisted conversation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed question/answer exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Turn ID
    pub id: Uuid,
    /// When the turn completed
    pub created_at: DateTime<Utc>,
    pub question: String,
    pub answer: String,
    /// Knowledge matches used for the answer (0 for direct generation)
    pub matches: usize,
    /// Dataset the turn searched, if any
    pub dataset: Option<String>,
}

impl LogEntry {
    pub fn completed(
        id: Uuid,
        question: impl Into<String>,
        answer: impl Into<String>,
        matches: usize,
        dataset: Option<String>,
    ) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            question: question.into(),
            answer: answer.into(),
            matches,
            dataset,
        }
    }
}

/// Long-lived conversation store kept outside the session.
pub trait ConversationLog: Send + Sync {
    fn append(&self, entry: LogEntry) -> anyhow::Result<()>;
}
